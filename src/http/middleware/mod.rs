//! Middleware stack shared by every route
//!
//! Outermost first:
//!
//! ```text
//! request id → trace span → propagate request id → request log → metrics
//!   → security headers → default cache-control → panic catcher → routes
//! ```
//!
//! Handler panics stop at the panic catcher and are not escalated to the
//! shutdown coordinator.

mod headers;
mod logging;
mod monitoring;

pub use headers::{SECURITY_HEADERS, no_store, with_cache_control, with_security_headers};
pub use logging::{MakeRequestUuid, REQUEST_ID_HEADER, log_requests, request_span};
pub use monitoring::{REQUEST_DURATION, REQUESTS_TOTAL, record_metrics};

use super::response::panic_response;
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Wrap `router` in the full middleware stack
pub fn apply(router: Router, cache_control: HeaderValue) -> Router {
    let router = router
        .layer(middleware::from_fn(mark_panics_handled))
        .layer(CatchPanicLayer::custom(panic_response));
    let router = with_cache_control(router, cache_control);
    let router = with_security_headers(router);

    router
        .layer(middleware::from_fn(record_metrics))
        .layer(middleware::from_fn(log_requests))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Runs the handler with its panics marked as caught by the panic catcher
async fn mark_panics_handled(request: Request, next: Next) -> Response {
    crate::lifecycle::handled(next.run(request)).await
}

//! Liveness, readiness and metrics endpoints
//!
//! | Route | Ready | Not ready |
//! |---|---|---|
//! | `GET /health` | 200 | 200 |
//! | `GET /ready` | 200 | 503 |
//! | `GET /metrics` | Prometheus text, 404 when metrics are disabled | |

use super::{ErrorResponse, middleware::no_store};
use crate::lifecycle::ReadinessProbe;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
pub struct MonitorState {
    service_name: Arc<str>,
    probe: ReadinessProbe,
    metrics: Option<PrometheusHandle>,
}

impl MonitorState {
    pub fn new(service_name: &str, probe: ReadinessProbe, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            service_name: Arc::from(service_name),
            probe,
            metrics,
        }
    }
}

pub async fn liveness(State(state): State<MonitorState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": &*state.service_name }))
}

pub async fn readiness(State(state): State<MonitorState>) -> Response {
    if state.probe.is_ready() {
        Json(json!({ "status": "ready", "service": &*state.service_name })).into_response()
    } else {
        ErrorResponse::new(StatusCode::SERVICE_UNAVAILABLE, "Service is not ready").into_response()
    }
}

pub async fn prometheus(State(state): State<MonitorState>) -> Response {
    match &state.metrics {
        Some(handle) => ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], handle.render()).into_response(),
        None => ErrorResponse::new(StatusCode::NOT_FOUND, "Metrics are disabled").into_response(),
    }
}

/// Monitoring routes, always served with `cache-control: no-store`
pub fn routes(state: MonitorState) -> Router {
    no_store(
        Router::new()
            .route("/health", get(liveness))
            .route("/ready", get(readiness))
            .route("/metrics", get(prometheus))
            .with_state(state),
    )
}

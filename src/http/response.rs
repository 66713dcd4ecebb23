use axum::{
    Json,
    body::Body,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::any::Any;

/// JSON error body used for every error the HTTP layer produces
///
/// ```json
/// { "statusCode": 503, "message": "Service is not ready", "timestamp": "2024-01-01T00:00:00Z" }
/// ```
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,

    #[serde(skip)]
    pub http_status: StatusCode,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            http_status: status,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.http_status, Json(self)).into_response()
    }
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ErrorResponse {
    ErrorResponse::new(StatusCode::NOT_FOUND, format!("Cannot resolve {}", uri.path()))
}

/// Turns a handler panic into a 500 response
pub(crate) fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = crate::lifecycle::panic_message(payload.as_ref());
    tracing::error!(panic = %detail, "Handler panicked");
    ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

use crate::http::ErrorResponse;
use crate::lifecycle::LifecycleError;
use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration for {key}: {message}")]
    Config { key: String, message: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),
}

impl Error {
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "Request failed");
        ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

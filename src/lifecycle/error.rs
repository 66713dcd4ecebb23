//! Lifecycle-specific error types

use super::Operation;
use thiserror::Error;

/// Errors that can occur during lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `start()` was called on a service that is already serving
    #[error("{service} is already started")]
    AlreadyStarted {
        /// Name of the service that rejected the call
        service: String,
    },

    /// Service start failed
    #[error("Start failed: {0}")]
    StartFailed(String),

    /// Graceful stop failed
    #[error("Stop failed: {0}")]
    StopFailed(String),

    /// Resource release failed
    #[error("Dispose failed: {0}")]
    DisposeFailed(String),

    /// A lifecycle operation panicked and the panic was caught
    #[error("{operation} panicked: {message}")]
    Panicked {
        /// The operation that panicked
        operation: Operation,
        /// Text of the panic payload
        message: String,
    },

    /// A child of a composite service failed
    #[error("{operation} failed for {service}: {source}")]
    ServiceFailed {
        /// Name of the child service that failed
        service: String,
        /// The operation that was fanned out
        operation: Operation,
        /// The child's own error
        #[source]
        source: Box<LifecycleError>,
    },

    /// OS signal handlers were already installed in this process
    #[error("OS signal handlers are already installed in this process")]
    SignalsAlreadyInstalled,

    /// Registering an OS signal handler failed
    #[error("Failed to register {signal} handler: {source}")]
    SignalRegistration {
        /// The signal that could not be registered
        signal: String,
        /// The underlying OS error
        #[source]
        source: std::io::Error,
    },
}

impl LifecycleError {
    /// Create an already-started error
    pub fn already_started(service: impl Into<String>) -> Self {
        Self::AlreadyStarted {
            service: service.into(),
        }
    }

    /// Create a start failure error
    pub fn start_failed(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a stop failure error
    pub fn stop_failed(msg: impl Into<String>) -> Self {
        Self::StopFailed(msg.into())
    }

    /// Create a dispose failure error
    pub fn dispose_failed(msg: impl Into<String>) -> Self {
        Self::DisposeFailed(msg.into())
    }

    /// Create an error for a caught panic
    pub fn panicked(operation: Operation, message: impl Into<String>) -> Self {
        Self::Panicked {
            operation,
            message: message.into(),
        }
    }

    /// Wrap a child's failure with the child's name and the fanned-out operation
    pub fn service_failed(
        service: impl Into<String>,
        operation: Operation,
        source: LifecycleError,
    ) -> Self {
        Self::ServiceFailed {
            service: service.into(),
            operation,
            source: Box::new(source),
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

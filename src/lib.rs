//! # Lifeline
//!
//! Lifecycle management and graceful shutdown for long-running Rust services.
//!
//! ## Features
//!
//! - **Lifecycle contract**: `start` / `stop` / `dispose` for every manageable service
//! - **Composite services**: run many services as one, concurrently
//! - **Graceful coordinator**: SIGINT, SIGTERM, SIGQUIT and panics drive an
//!   ordered stop → grace period → dispose → exit sequence
//! - **Readiness**: flips to not-ready the moment shutdown begins
//! - **HTTP scaffolding**: axum service with `/health`, `/ready`, `/metrics`,
//!   request ids, request logging and security headers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lifeline::Application;
//! use axum::{Router, routing::get};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Application::builder()
//!         .routes(Router::new().route("/", get(|| async { "hello" })))
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod telemetry;

pub use app::{Application, ApplicationBuilder};
pub use config::{ConfigService, ServiceConfig};
pub use error::{Error, Result};
pub use http::{ErrorResponse, HttpConfig, HttpService};
pub use lifecycle::{
    CompositeService, GracefulCoordinator, Lifecycle, LifecycleError, ReadinessProbe, combine,
};

// Re-export for use in Lifecycle impls
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// Leaves `Result` alone, so `Lifecycle` impls can spell out
/// `Result<(), LifecycleError>`.
///
/// ```rust
/// use lifeline::prelude::*;
///
/// struct Noop;
///
/// #[async_trait]
/// impl Lifecycle for Noop {
///     async fn start(&self) -> Result<(), LifecycleError> {
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "noop"
///     }
/// }
/// ```
pub mod prelude {
    pub use crate::app::Application;
    pub use crate::config::ServiceConfig;
    pub use crate::error::Error;
    pub use crate::http::{ErrorResponse, HttpService};
    pub use crate::lifecycle::{
        CompositeService, GracefulCoordinator, Lifecycle, LifecycleError, ReadinessProbe,
        combine,
    };
    pub use async_trait::async_trait;
}

//! HTTP service
//!
//! [`HttpService`] serves application routes plus the monitoring endpoints
//! behind a shared middleware stack, and plugs into the coordinator as a
//! [`Lifecycle`](crate::lifecycle::Lifecycle) implementer.

pub mod health;
pub mod middleware;
mod response;
mod server;

pub use response::{ErrorResponse, not_found};
pub use server::{HttpConfig, HttpService, HttpServiceBuilder};

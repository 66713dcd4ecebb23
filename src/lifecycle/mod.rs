//! Lifecycle Module
//!
//! This module provides the lifecycle contract every manageable service
//! implements and the coordinator that ties it to process termination.
//!
//! # Shutdown Sequence
//!
//! ```text
//! 1. GracefulCoordinator::create
//!    ↓
//! 2. factory(readiness probe)          ← service built
//!    ↓
//! 3. Trigger sources armed (SIGINT / SIGTERM / SIGQUIT / panics)
//!    ↓
//! 4. start()                           ← Lifecycle
//!    ↓
//! [Running...]
//!    ↓
//! 5. First signal or unhandled fault   → readiness flips to false
//!    ↓
//! 6. stop()                            ← Lifecycle
//!    ↓
//! 7. Grace period (signals only)
//!    ↓
//! 8. dispose()                         ← Lifecycle
//!    ↓
//! 9. exit(0)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lifeline::lifecycle::{GracefulCoordinator, Lifecycle, LifecycleError};
//! use async_trait::async_trait;
//! use std::time::Duration;
//!
//! pub struct QueueConsumer { /* ... */ }
//!
//! #[async_trait]
//! impl Lifecycle for QueueConsumer {
//!     async fn start(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Subscribing to queue");
//!         Ok(())
//!     }
//!
//!     async fn stop(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Finishing in-flight messages");
//!         Ok(())
//!     }
//! }
//!
//! let coordinator = GracefulCoordinator::create(Duration::from_secs(15), |_ready| {
//!     QueueConsumer { /* ... */ }
//! })
//! .await?;
//! coordinator.terminated().await;
//! ```

mod composite;
mod coordinator;
mod error;
mod exit;
mod panic;
mod signal;
mod status;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use composite::{CompositeService, combine};
pub use coordinator::{
    CoordinatorBuilder, DEFAULT_DEADLINE_ALLOWANCE, DEFAULT_GRACE_PERIOD, FaultReporter,
    GracefulCoordinator,
};
pub use error::{LifecycleError, Result};
pub use exit::{CapturedExit, ProcessExit, StdExit};
pub(crate) use panic::{catch_panic, handled, is_handled, panic_message};
pub use signal::{OsSignals, ShutdownTrigger, SignalKind, SignalSource, SignalTrigger, SimulatedSignals};
pub use status::{CoordinatorState, ReadinessProbe, ServiceStatus};
pub use traits::{Lifecycle, Operation};

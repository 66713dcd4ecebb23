//! Lifecycle contract
//!
//! Every manageable service implements [`Lifecycle`]. The coordinator and
//! [`CompositeService`](super::CompositeService) only ever talk to services
//! through this trait.

use super::Result;
use async_trait::async_trait;
use std::sync::Arc;
use strum_macros::Display;

/// The three lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Start,
    Stop,
    Dispose,
}

impl Operation {
    /// Invoke this operation on `service`
    pub async fn invoke(self, service: &dyn Lifecycle) -> Result<()> {
        match self {
            Operation::Start => service.start().await,
            Operation::Stop => service.stop().await,
            Operation::Dispose => service.dispose().await,
        }
    }
}

/// Start / stop / dispose capability set
///
/// - `start` begins serving. Calling it on a service that is already serving
///   is a caller error and should be rejected with
///   [`LifecycleError::AlreadyStarted`](super::LifecycleError::AlreadyStarted).
/// - `stop` stops accepting new work and drains in-flight work. It must
///   succeed when the service was never started and when called twice.
/// - `dispose` releases whatever `stop` left behind (background tasks,
///   open handles). Faults are reported through the returned `Result`.
///
/// `stop` and `dispose` default to no-ops, so a service with nothing to drain
/// or release only implements `start`.
///
/// # Example
///
/// ```rust
/// use lifeline::lifecycle::{Lifecycle, LifecycleError};
/// use async_trait::async_trait;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Ticker {
///     running: AtomicBool,
/// }
///
/// #[async_trait]
/// impl Lifecycle for Ticker {
///     async fn start(&self) -> Result<(), LifecycleError> {
///         if self.running.swap(true, Ordering::SeqCst) {
///             return Err(LifecycleError::already_started(self.name()));
///         }
///         Ok(())
///     }
///
///     async fn stop(&self) -> Result<(), LifecycleError> {
///         self.running.store(false, Ordering::SeqCst);
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "ticker"
///     }
/// }
/// ```
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Begin serving
    async fn start(&self) -> Result<()>;

    /// Stop accepting new work and drain in-flight work
    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Release remaining resources after `stop`
    async fn dispose(&self) -> Result<()> {
        Ok(())
    }

    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<T: Lifecycle + ?Sized> Lifecycle for Arc<T> {
    async fn start(&self) -> Result<()> {
        (**self).start().await
    }

    async fn stop(&self) -> Result<()> {
        (**self).stop().await
    }

    async fn dispose(&self) -> Result<()> {
        (**self).dispose().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: Lifecycle + ?Sized> Lifecycle for Box<T> {
    async fn start(&self) -> Result<()> {
        (**self).start().await
    }

    async fn stop(&self) -> Result<()> {
        (**self).stop().await
    }

    async fn dispose(&self) -> Result<()> {
        (**self).dispose().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

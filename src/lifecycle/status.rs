//! Shared service status and readiness

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strum_macros::Display;

#[derive(Debug, Default)]
struct Flags {
    shutting_down: AtomicBool,
    running: AtomicBool,
}

/// Status record owned by the coordinator
///
/// Cloning is cheap and every clone observes the same flags. Only the
/// coordinator writes them; `shutting_down` is never reset once set.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatus {
    flags: Arc<Flags>,
}

impl ServiceStatus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether a shutdown sequence has begun
    pub fn is_shutting_down(&self) -> bool {
        self.flags.shutting_down.load(Ordering::SeqCst)
    }

    /// Whether the wrapped service is marked as running
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.flags.running.store(running, Ordering::SeqCst);
    }

    /// Enter the draining phase. Readiness flips to false before this returns.
    pub(crate) fn begin_draining(&self) {
        self.flags.running.store(false, Ordering::SeqCst);
        self.flags.shutting_down.store(true, Ordering::SeqCst);
    }

    pub(crate) fn readiness(&self) -> ReadinessProbe {
        ReadinessProbe {
            status: self.clone(),
        }
    }
}

/// Readiness check handed to the wrapped service
///
/// Reflects the coordinator's own start/stop state without giving the
/// service a reference to the coordinator.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    status: ServiceStatus,
}

impl ReadinessProbe {
    /// Whether the service is currently accepting work
    pub fn is_ready(&self) -> bool {
        self.status.is_running() && !self.status.is_shutting_down()
    }

    /// A probe that is always ready, for running a service without a coordinator
    pub fn always_ready() -> Self {
        let status = ServiceStatus::new();
        status.set_running(true);
        status.readiness()
    }
}

/// Coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CoordinatorState {
    Idle,
    Running,
    Draining,
    Disposing,
    Terminated,
}

impl CoordinatorState {
    /// Whether a shutdown sequence is in progress or finished
    pub fn is_shutting_down(self) -> bool {
        matches!(
            self,
            CoordinatorState::Draining | CoordinatorState::Disposing | CoordinatorState::Terminated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_follows_status() {
        let status = ServiceStatus::new();
        let probe = status.readiness();
        assert!(!probe.is_ready());

        status.set_running(true);
        assert!(probe.is_ready());

        status.begin_draining();
        assert!(!probe.is_ready());
        assert!(status.is_shutting_down());
        assert!(!status.is_running());
    }

    #[test]
    fn test_draining_is_sticky() {
        let status = ServiceStatus::new();
        status.begin_draining();
        status.set_running(true);

        assert!(!status.readiness().is_ready());
    }

    #[test]
    fn test_always_ready() {
        assert!(ReadinessProbe::always_ready().is_ready());
    }
}

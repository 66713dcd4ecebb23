//! Process termination

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Terminates the process once a shutdown sequence completes
pub trait ProcessExit: Send + Sync + 'static {
    fn exit(&self, code: i32);
}

/// Calls [`std::process::exit`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdExit;

impl ProcessExit for StdExit {
    fn exit(&self, code: i32) {
        tracing::info!(code, "Exiting process");
        std::process::exit(code);
    }
}

const NOT_EXITED: i32 = i32::MIN;

/// Records the exit code instead of terminating
///
/// Useful in tests and when the caller wants to decide how to leave `main`.
#[derive(Debug, Clone)]
pub struct CapturedExit {
    code: Arc<AtomicI32>,
}

impl Default for CapturedExit {
    fn default() -> Self {
        Self {
            code: Arc::new(AtomicI32::new(NOT_EXITED)),
        }
    }
}

impl CapturedExit {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded exit code, if `exit` was called
    pub fn code(&self) -> Option<i32> {
        match self.code.load(Ordering::SeqCst) {
            NOT_EXITED => None,
            code => Some(code),
        }
    }
}

impl ProcessExit for CapturedExit {
    fn exit(&self, code: i32) {
        tracing::info!(code, "Exit captured");
        self.code.store(code, Ordering::SeqCst);
    }
}

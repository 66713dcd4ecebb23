//! Shutdown trigger sources
//!
//! OS signal handlers and the panic hook are process-wide resources, so the
//! coordinator never installs them directly: it consumes a [`SignalSource`].
//! [`OsSignals`] is the production source; [`SimulatedSignals`] lets tests and
//! embedders deliver triggers by hand.

use super::panic::{is_handled, panic_message};
use super::{LifecycleError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use strum_macros::Display;
use tokio::sync::mpsc;

static OS_SIGNALS_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Conventional termination signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SignalKind {
    #[strum(serialize = "SIGINT")]
    Interrupt,
    #[strum(serialize = "SIGTERM")]
    Terminate,
    #[strum(serialize = "SIGQUIT")]
    Quit,
}

/// Something that starts a shutdown sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// An OS termination signal
    Signal(SignalKind),
    /// An unhandled fault (panic or reported error), with its message
    Fault(String),
}

impl ShutdownTrigger {
    /// Whether this trigger takes the fault path (no grace period)
    pub fn is_fault(&self) -> bool {
        matches!(self, ShutdownTrigger::Fault(_))
    }
}

/// A source of shutdown triggers
#[async_trait]
pub trait SignalSource: Send + 'static {
    /// Wait for the next trigger. `None` means the source is exhausted.
    async fn recv(&mut self) -> Option<ShutdownTrigger>;
}

/// SIGINT, SIGTERM and SIGQUIT plus a panic hook
///
/// Listeners stay registered for the life of the source and every delivery
/// is reported, including repeats of a kind. The coordinator acts on each
/// kind at most once. Only one instance may be installed per process.
///
/// The panic hook reports panics that escape all handling, such as a
/// panicking spawned task. Panics caught by the HTTP layer or by lifecycle
/// fan-out are not reported.
///
/// On non-unix platforms only Ctrl-C is available and is reported as
/// [`SignalKind::Interrupt`].
pub struct OsSignals {
    listeners: Listeners,
    faults: mpsc::UnboundedReceiver<String>,
}

impl OsSignals {
    /// Register the OS signal handlers and the panic hook
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::SignalsAlreadyInstalled`] on a second call in
    /// the same process, or [`LifecycleError::SignalRegistration`] if the OS
    /// refuses a handler.
    pub fn install() -> Result<Self> {
        if OS_SIGNALS_INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::SignalsAlreadyInstalled);
        }

        let listeners = match Listeners::register() {
            Ok(listeners) => listeners,
            Err(e) => {
                OS_SIGNALS_INSTALLED.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (tx, faults) = mpsc::unbounded_channel();
        install_panic_hook(tx);

        tracing::debug!("OS signal handlers and panic hook installed");
        Ok(Self { listeners, faults })
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<ShutdownTrigger> {
        tokio::select! {
            Some(kind) = self.listeners.next() => Some(ShutdownTrigger::Signal(kind)),
            Some(message) = self.faults.recv() => Some(ShutdownTrigger::Fault(message)),
            else => None,
        }
    }
}

#[cfg(unix)]
struct Listeners {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Listeners {
    fn register() -> Result<Self> {
        use tokio::signal::unix::{SignalKind as UnixSignal, signal};

        let listen = |kind: UnixSignal, name: SignalKind| {
            signal(kind).map_err(|source| LifecycleError::SignalRegistration {
                signal: name.to_string(),
                source,
            })
        };

        Ok(Self {
            interrupt: listen(UnixSignal::interrupt(), SignalKind::Interrupt)?,
            terminate: listen(UnixSignal::terminate(), SignalKind::Terminate)?,
            quit: listen(UnixSignal::quit(), SignalKind::Quit)?,
        })
    }

    async fn next(&mut self) -> Option<SignalKind> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(SignalKind::Interrupt),
            Some(()) = self.terminate.recv() => Some(SignalKind::Terminate),
            Some(()) = self.quit.recv() => Some(SignalKind::Quit),
            else => None,
        }
    }
}

#[cfg(not(unix))]
struct Listeners;

#[cfg(not(unix))]
impl Listeners {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> Option<SignalKind> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|()| SignalKind::Interrupt)
    }
}

fn install_panic_hook(faults: mpsc::UnboundedSender<String>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        if is_handled() {
            return;
        }
        let message = match info.location() {
            Some(location) => format!("{} at {}", panic_message(info.payload()), location),
            None => panic_message(info.payload()),
        };
        let _ = faults.send(message);
    }));
}

/// Trigger source driven by hand
///
/// # Example
///
/// ```rust
/// use lifeline::lifecycle::{SignalKind, SignalSource, SimulatedSignals, ShutdownTrigger};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (mut signals, trigger) = SimulatedSignals::new();
/// trigger.signal(SignalKind::Terminate);
///
/// assert_eq!(
///     signals.recv().await,
///     Some(ShutdownTrigger::Signal(SignalKind::Terminate))
/// );
/// # }
/// ```
pub struct SimulatedSignals {
    rx: mpsc::UnboundedReceiver<ShutdownTrigger>,
}

impl SimulatedSignals {
    /// Create a source and the handle that feeds it
    pub fn new() -> (Self, SignalTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, SignalTrigger { tx })
    }
}

#[async_trait]
impl SignalSource for SimulatedSignals {
    async fn recv(&mut self) -> Option<ShutdownTrigger> {
        self.rx.recv().await
    }
}

/// Delivers triggers to a [`SimulatedSignals`] source
#[derive(Debug, Clone)]
pub struct SignalTrigger {
    tx: mpsc::UnboundedSender<ShutdownTrigger>,
}

impl SignalTrigger {
    /// Deliver an OS-style signal. Returns false if the source is gone.
    pub fn signal(&self, kind: SignalKind) -> bool {
        self.tx.send(ShutdownTrigger::Signal(kind)).is_ok()
    }

    /// Deliver an unhandled fault. Returns false if the source is gone.
    pub fn fault(&self, message: impl Into<String>) -> bool {
        self.tx.send(ShutdownTrigger::Fault(message.into())).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_signals_deliver_in_order() {
        let (mut signals, trigger) = SimulatedSignals::new();
        assert!(trigger.signal(SignalKind::Quit));
        assert!(trigger.fault("boom"));
        drop(trigger);

        assert_eq!(
            signals.recv().await,
            Some(ShutdownTrigger::Signal(SignalKind::Quit))
        );
        assert_eq!(
            signals.recv().await,
            Some(ShutdownTrigger::Fault("boom".to_string()))
        );
        assert_eq!(signals.recv().await, None);
    }

    #[tokio::test]
    async fn test_os_signals_install_once_per_process() {
        let first = OsSignals::install();
        assert!(first.is_ok());

        let second = OsSignals::install();
        assert!(matches!(second, Err(LifecycleError::SignalsAlreadyInstalled)));
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(SignalKind::Interrupt.to_string(), "SIGINT");
        assert_eq!(SignalKind::Terminate.to_string(), "SIGTERM");
        assert_eq!(SignalKind::Quit.to_string(), "SIGQUIT");
    }
}

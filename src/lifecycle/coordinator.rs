//! Graceful Shutdown Coordinator
//!
//! Binds a service's lifecycle to termination signals and unhandled faults.
//!
//! ```text
//!  Idle ──start() ok──▶ Running ──signal / fault──▶ Draining
//!                                                      │ stop() settled
//!                                                      ▼
//!  Terminated ◀──dispose() settled── Disposing ◀───────┘
//!      │                      (signal path waits the grace period first)
//!      ▼
//!  exit(0)
//! ```

use super::exit::{ProcessExit, StdExit};
use super::panic::catch_panic;
use super::signal::{OsSignals, ShutdownTrigger, SignalKind, SignalSource};
use super::{CoordinatorState, Lifecycle, Operation, ReadinessProbe, Result, ServiceStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

/// Grace period used when none is configured
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(15);

/// Added to the grace period to form the default shutdown deadline
pub const DEFAULT_DEADLINE_ALLOWANCE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
enum Deadline {
    AfterGrace,
    Fixed(Duration),
    Disabled,
}

/// Builder for [`GracefulCoordinator`]
///
/// Defaults: 15 s grace period, OS signals, real process exit, a shutdown
/// deadline of grace period + 30 s, and later signals ignored while draining.
pub struct CoordinatorBuilder {
    grace_period: Duration,
    deadline: Deadline,
    hasten_on_second_signal: bool,
    signals: Option<Box<dyn SignalSource>>,
    exit: Option<Arc<dyn ProcessExit>>,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            deadline: Deadline::AfterGrace,
            hasten_on_second_signal: false,
            signals: None,
            exit: None,
        }
    }

    /// Fixed delay between `stop()` settling and `dispose()` starting
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Upper bound on the whole shutdown sequence, measured from the first trigger
    pub fn shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Deadline::Fixed(deadline);
        self
    }

    /// Let a hung `stop()` or `dispose()` hold the process open indefinitely
    pub fn without_deadline(mut self) -> Self {
        self.deadline = Deadline::Disabled;
        self
    }

    /// Exit immediately when another OS signal arrives during shutdown
    pub fn hasten_on_second_signal(mut self, enabled: bool) -> Self {
        self.hasten_on_second_signal = enabled;
        self
    }

    /// Use `signals` instead of installing [`OsSignals`]
    pub fn signals<S: SignalSource>(mut self, signals: S) -> Self {
        self.signals = Some(Box::new(signals));
        self
    }

    /// Use `exit` instead of [`StdExit`]
    pub fn exit<E: ProcessExit>(mut self, exit: E) -> Self {
        self.exit = Some(Arc::new(exit));
        self
    }

    fn resolved_deadline(&self) -> Option<Duration> {
        match self.deadline {
            Deadline::AfterGrace => Some(self.grace_period + DEFAULT_DEADLINE_ALLOWANCE),
            Deadline::Fixed(deadline) => Some(deadline),
            Deadline::Disabled => None,
        }
    }

    /// Build the service, arm the trigger sources and start the service
    ///
    /// `factory` receives the readiness probe the service may expose. The
    /// returned `Result` is the outcome of `start()`. When `start()` fails the
    /// trigger sources stay armed: a later signal still runs the shutdown
    /// sequence and exits the process.
    pub async fn create<F, S>(self, factory: F) -> Result<GracefulCoordinator>
    where
        F: FnOnce(ReadinessProbe) -> S,
        S: Lifecycle + 'static,
    {
        let deadline = self.resolved_deadline();
        let status = ServiceStatus::new();
        let service: Arc<dyn Lifecycle> = Arc::new(factory(status.readiness()));
        let name = service.name().to_string();

        let signals = match self.signals {
            Some(signals) => signals,
            None => Box::new(OsSignals::install()?),
        };
        let exit = self.exit.unwrap_or_else(|| Arc::new(StdExit));

        let (state_tx, state_rx) = watch::channel(CoordinatorState::Idle);
        let state_tx = Arc::new(state_tx);
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();

        let supervisor = Supervisor {
            service: Arc::clone(&service),
            status: status.clone(),
            state: Arc::clone(&state_tx),
            grace_period: self.grace_period,
            deadline,
            hasten_on_second_signal: self.hasten_on_second_signal,
            exit,
        };
        let triggers = Triggers::new(signals, fault_rx);
        tokio::spawn(
            supervisor
                .run(triggers)
                .instrument(tracing::info_span!("shutdown", service = %name)),
        );

        status.set_running(true);
        tracing::info!(service = %name, "Starting service");

        if let Err(e) = service.start().await {
            status.set_running(false);
            tracing::error!(service = %name, error = %e, "Service failed to start");
            return Err(e);
        }

        // a trigger may already have moved us past Idle
        state_tx.send_if_modified(|state| {
            if *state == CoordinatorState::Idle {
                *state = CoordinatorState::Running;
                true
            } else {
                false
            }
        });
        tracing::info!(service = %name, "Service started");

        Ok(GracefulCoordinator {
            status,
            state: state_rx,
            faults: FaultReporter { tx: fault_tx },
        })
    }
}

/// Drives one service through stop, grace period, dispose and process exit
///
/// At most one coordinator should exist per process: OS signal handlers are
/// a process-wide resource.
///
/// # Example
///
/// ```rust,ignore
/// use lifeline::lifecycle::GracefulCoordinator;
/// use std::time::Duration;
///
/// let coordinator = GracefulCoordinator::create(Duration::from_secs(15), |ready| {
///     HttpService::new(config, routes, ready)
/// })
/// .await?;
///
/// coordinator.terminated().await;
/// ```
pub struct GracefulCoordinator {
    status: ServiceStatus,
    state: watch::Receiver<CoordinatorState>,
    faults: FaultReporter,
}

impl GracefulCoordinator {
    /// Create a builder
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Create a coordinator with OS signals and the given grace period
    pub async fn create<F, S>(grace_period: Duration, factory: F) -> Result<Self>
    where
        F: FnOnce(ReadinessProbe) -> S,
        S: Lifecycle + 'static,
    {
        Self::builder().grace_period(grace_period).create(factory).await
    }

    /// Shared status record
    pub fn status(&self) -> &ServiceStatus {
        &self.status
    }

    /// A readiness probe equal to the one given to the service
    pub fn readiness(&self) -> ReadinessProbe {
        self.status.readiness()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Current state
    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.clone()
    }

    /// Handle for escalating unhandled errors into the fault path
    pub fn fault_reporter(&self) -> FaultReporter {
        self.faults.clone()
    }

    /// Resolves once the shutdown sequence has finished
    ///
    /// Also resolves if supervision ended because every trigger source closed.
    pub async fn terminated(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|state| *state == CoordinatorState::Terminated)
            .await;
    }
}

/// Escalates an unhandled error into an immediate shutdown (no grace period)
#[derive(Debug, Clone)]
pub struct FaultReporter {
    tx: mpsc::UnboundedSender<String>,
}

impl FaultReporter {
    /// Report a fault. Returns false if supervision has already ended.
    pub fn report(&self, fault: impl std::fmt::Display) -> bool {
        self.tx.send(fault.to_string()).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TriggerKey {
    Signal(SignalKind),
    Fault,
}

impl TriggerKey {
    fn of(trigger: &ShutdownTrigger) -> Self {
        match trigger {
            ShutdownTrigger::Signal(kind) => TriggerKey::Signal(*kind),
            ShutdownTrigger::Fault(_) => TriggerKey::Fault,
        }
    }
}

/// Merges the signal source with reported faults and tracks which kinds fired
struct Triggers {
    signals: Box<dyn SignalSource>,
    signals_open: bool,
    faults: mpsc::UnboundedReceiver<String>,
    fired: HashSet<TriggerKey>,
}

impl Triggers {
    fn new(signals: Box<dyn SignalSource>, faults: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            signals,
            signals_open: true,
            faults,
            fired: HashSet::new(),
        }
    }

    /// Next trigger, flagged `true` when its kind has fired before
    async fn next(&mut self) -> Option<(ShutdownTrigger, bool)> {
        loop {
            let trigger = tokio::select! {
                received = self.signals.recv(), if self.signals_open => match received {
                    Some(trigger) => trigger,
                    None => {
                        self.signals_open = false;
                        continue;
                    }
                },
                Some(message) = self.faults.recv() => ShutdownTrigger::Fault(message),
                else => return None,
            };

            let repeated = !self.fired.insert(TriggerKey::of(&trigger));
            return Some((trigger, repeated));
        }
    }
}

struct Supervisor {
    service: Arc<dyn Lifecycle>,
    status: ServiceStatus,
    state: Arc<watch::Sender<CoordinatorState>>,
    grace_period: Duration,
    deadline: Option<Duration>,
    hasten_on_second_signal: bool,
    exit: Arc<dyn ProcessExit>,
}

impl Supervisor {
    async fn run(self, mut triggers: Triggers) {
        let Some((first, _)) = triggers.next().await else {
            tracing::debug!("All trigger sources closed, nothing left to supervise");
            return;
        };

        match &first {
            ShutdownTrigger::Signal(kind) => {
                tracing::info!(signal = %kind, "Received termination signal, starting graceful shutdown");
            }
            ShutdownTrigger::Fault(fault) => {
                tracing::error!(%fault, "Unhandled fault, shutting down without grace period");
            }
        }

        // readiness must flip before stop() is even called
        self.status.begin_draining();
        self.state.send_replace(CoordinatorState::Draining);

        let grace_period = (!first.is_fault()).then_some(self.grace_period);
        let sequence = self.drain_and_dispose(grace_period);
        tokio::pin!(sequence);

        let deadline = self.deadline;
        let watchdog = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(watchdog);

        loop {
            tokio::select! {
                biased;

                () = &mut sequence => {
                    tracing::info!("Graceful shutdown complete");
                    break;
                }

                () = &mut watchdog => {
                    tracing::error!(
                        deadline_ms = deadline.map(|d| d.as_millis() as u64),
                        "Shutdown deadline elapsed before the sequence finished, forcing exit"
                    );
                    break;
                }

                Some((trigger, repeated)) = triggers.next() => {
                    match trigger {
                        ShutdownTrigger::Signal(kind) if self.hasten_on_second_signal => {
                            tracing::warn!(signal = %kind, "Another signal received during shutdown, forcing exit");
                            break;
                        }
                        ShutdownTrigger::Signal(kind) if repeated => {
                            tracing::debug!(signal = %kind, "Signal already handled, ignoring");
                        }
                        ShutdownTrigger::Signal(kind) => {
                            tracing::warn!(signal = %kind, "Shutdown already in progress, ignoring signal");
                        }
                        ShutdownTrigger::Fault(fault) => {
                            tracing::error!(%fault, repeated, "Fault during shutdown, continuing sequence");
                        }
                    }
                }
            }
        }

        self.state.send_replace(CoordinatorState::Terminated);
        self.exit.exit(0);
    }

    async fn drain_and_dispose(&self, grace_period: Option<Duration>) {
        settle(self.service.as_ref(), Operation::Stop).await;
        self.state.send_replace(CoordinatorState::Disposing);

        if let Some(grace_period) = grace_period.filter(|g| !g.is_zero()) {
            tracing::info!(
                grace_period_ms = grace_period.as_millis() as u64,
                "Service stopped, waiting for grace period before disposing"
            );
            tokio::time::sleep(grace_period).await;
        }

        settle(self.service.as_ref(), Operation::Dispose).await;
    }
}

/// Run one lifecycle step, logging any error or panic instead of propagating it
async fn settle(service: &dyn Lifecycle, operation: Operation) {
    let name = service.name();
    tracing::debug!(service = name, %operation, "Running lifecycle step");

    match catch_panic(operation.invoke(service)).await {
        Ok(Ok(())) => {
            tracing::info!(service = name, %operation, "Lifecycle step complete");
        }
        Ok(Err(e)) => {
            tracing::error!(service = name, %operation, error = %e, "Lifecycle step failed, continuing shutdown");
        }
        Err(panic) => {
            tracing::error!(
                service = name,
                %operation,
                %panic,
                "Lifecycle step panicked, continuing shutdown"
            );
        }
    }
}

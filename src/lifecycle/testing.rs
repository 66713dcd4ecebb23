//! Scripted lifecycle implementer shared by the lifecycle tests.

use super::{Lifecycle, LifecycleError, Operation, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Began,
    Finished,
}

#[derive(Debug, Clone)]
pub(crate) struct Event {
    pub service: String,
    pub operation: Operation,
    pub step: Step,
    pub at: Instant,
}

#[derive(Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn push(&self, service: &str, operation: Operation, step: Step) {
        self.0.lock().unwrap().push(Event {
            service: service.to_string(),
            operation,
            step,
            at: Instant::now(),
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn find(&self, service: &str, operation: Operation, step: Step) -> Option<Event> {
        self.events()
            .into_iter()
            .find(|e| e.service == service && e.operation == operation && e.step == step)
    }

    pub fn count(&self, operation: Operation, step: Step) -> usize {
        self.events()
            .iter()
            .filter(|e| e.operation == operation && e.step == step)
            .count()
    }
}

/// A service whose latency and failures are scripted per operation.
pub(crate) struct ScriptedService {
    name: String,
    log: EventLog,
    delays: Vec<(Operation, Duration)>,
    fail_on: Vec<Operation>,
    panic_on: Vec<Operation>,
    hang_on: Vec<Operation>,
    gate: Option<(Operation, Arc<Notify>)>,
}

impl ScriptedService {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            delays: Vec::new(),
            fail_on: Vec::new(),
            panic_on: Vec::new(),
            hang_on: Vec::new(),
            gate: None,
        }
    }

    pub fn delay(mut self, operation: Operation, delay: Duration) -> Self {
        self.delays.push((operation, delay));
        self
    }

    pub fn fail_on(mut self, operation: Operation) -> Self {
        self.fail_on.push(operation);
        self
    }

    pub fn panic_on(mut self, operation: Operation) -> Self {
        self.panic_on.push(operation);
        self
    }

    pub fn hang_on(mut self, operation: Operation) -> Self {
        self.hang_on.push(operation);
        self
    }

    /// Block `operation` until the returned handle is notified.
    pub fn gate(mut self, operation: Operation) -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        self.gate = Some((operation, Arc::clone(&notify)));
        (self, notify)
    }

    async fn run(&self, operation: Operation) -> Result<()> {
        self.log.push(&self.name, operation, Step::Began);

        if let Some((_, delay)) = self.delays.iter().find(|(op, _)| *op == operation) {
            tokio::time::sleep(*delay).await;
        }
        if let Some((op, notify)) = &self.gate {
            if *op == operation {
                notify.notified().await;
            }
        }
        if self.hang_on.contains(&operation) {
            std::future::pending::<()>().await;
        }
        if self.panic_on.contains(&operation) {
            panic!("{} panicked during {}", self.name, operation);
        }

        self.log.push(&self.name, operation, Step::Finished);

        if self.fail_on.contains(&operation) {
            let message = format!("{} refused to {}", self.name, operation);
            return Err(match operation {
                Operation::Start => LifecycleError::start_failed(message),
                Operation::Stop => LifecycleError::stop_failed(message),
                Operation::Dispose => LifecycleError::dispose_failed(message),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Lifecycle for ScriptedService {
    async fn start(&self) -> Result<()> {
        self.run(Operation::Start).await
    }

    async fn stop(&self) -> Result<()> {
        self.run(Operation::Stop).await
    }

    async fn dispose(&self) -> Result<()> {
        self.run(Operation::Dispose).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

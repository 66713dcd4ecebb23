//! Composite Service
//!
//! Manages several lifecycle implementers as one.

use super::{Lifecycle, LifecycleError, Operation, Result, catch_panic};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Aggregates several services behind one [`Lifecycle`] implementation
///
/// Each operation is fanned out to every child concurrently, one task per
/// child, and resolves only once all of them have settled:
/// - A failing or panicking child never prevents the others from receiving the call
/// - A panic is reported as [`LifecycleError::Panicked`]
/// - Every child failure is logged
/// - The first failure in registration order is returned to the caller
///
/// # Example
///
/// ```rust,ignore
/// use lifeline::lifecycle::CompositeService;
///
/// let services = CompositeService::new()
///     .with(http_service)
///     .with(outbox_relay);
///
/// services.start().await?;
/// ```
#[derive(Clone, Default)]
pub struct CompositeService {
    name: Option<String>,
    children: Vec<Arc<dyn Lifecycle>>,
}

impl CompositeService {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty composite reported under `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            children: Vec::new(),
        }
    }

    /// Append a child service
    pub fn with<S>(mut self, service: S) -> Self
    where
        S: Lifecycle + 'static,
    {
        self.children.push(Arc::new(service));
        self
    }

    /// Append an already shared child service
    pub fn with_shared(mut self, service: Arc<dyn Lifecycle>) -> Self {
        self.children.push(service);
        self
    }

    /// Number of registered children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether no children are registered
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    async fn fan_out(&self, operation: Operation) -> Result<()> {
        tracing::debug!(
            %operation,
            children = self.children.len(),
            "Fanning out lifecycle operation"
        );

        let mut tasks = JoinSet::new();
        for (index, child) in self.children.iter().enumerate() {
            let child = Arc::clone(child);
            tasks.spawn(async move {
                let outcome = match catch_panic(operation.invoke(child.as_ref())).await {
                    Ok(outcome) => outcome,
                    Err(panic) => Err(LifecycleError::panicked(operation, panic)),
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<Result<()>>> =
            std::iter::repeat_with(|| None).take(self.children.len()).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::error!(%operation, error = %e, "Child task did not complete"),
            }
        }

        let mut first_failure = None;
        for (child, outcome) in self.children.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| Err(not_completed(operation)));
            if let Err(e) = outcome {
                let service = child.name();
                tracing::error!(%operation, service, error = %e, "Child service failed");
                if first_failure.is_none() {
                    first_failure = Some(LifecycleError::service_failed(service, operation, e));
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn not_completed(operation: Operation) -> LifecycleError {
    let message = "child task was cancelled";
    match operation {
        Operation::Start => LifecycleError::start_failed(message),
        Operation::Stop => LifecycleError::stop_failed(message),
        Operation::Dispose => LifecycleError::dispose_failed(message),
    }
}

/// Combine services into one [`CompositeService`]
pub fn combine<I>(services: I) -> CompositeService
where
    I: IntoIterator<Item = Arc<dyn Lifecycle>>,
{
    CompositeService {
        name: None,
        children: services.into_iter().collect(),
    }
}

#[async_trait]
impl Lifecycle for CompositeService {
    async fn start(&self) -> Result<()> {
        self.fan_out(Operation::Start).await
    }

    async fn stop(&self) -> Result<()> {
        self.fan_out(Operation::Stop).await
    }

    async fn dispose(&self) -> Result<()> {
        self.fan_out(Operation::Dispose).await
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("composite")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{EventLog, ScriptedService, Step};
    use std::time::Duration;
    use tokio::time::Instant;

    fn shared(service: ScriptedService) -> Arc<dyn Lifecycle> {
        Arc::new(service)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_waits_for_slowest_child() {
        let log = EventLog::default();
        let composite = combine([
            shared(ScriptedService::new("fast", &log).delay(Operation::Start, Duration::from_millis(10))),
            shared(ScriptedService::new("slow", &log).delay(Operation::Start, Duration::from_millis(250))),
            shared(ScriptedService::new("instant", &log)),
        ]);

        let began = Instant::now();
        composite.start().await.unwrap();

        assert!(began.elapsed() >= Duration::from_millis(250));
        assert_eq!(log.count(Operation::Start, Step::Finished), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_children_run_concurrently() {
        let log = EventLog::default();
        let composite = CompositeService::new()
            .with(ScriptedService::new("a", &log).delay(Operation::Stop, Duration::from_millis(100)))
            .with(ScriptedService::new("b", &log).delay(Operation::Stop, Duration::from_millis(100)));

        let began = Instant::now();
        composite.stop().await.unwrap();

        // Sequential execution would take 200ms
        assert!(began.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_failing_child_does_not_prevent_siblings() {
        let log = EventLog::default();
        let composite = CompositeService::new()
            .with(ScriptedService::new("a", &log))
            .with(ScriptedService::new("b", &log).fail_on(Operation::Start));

        let err = composite.start().await.unwrap_err();

        assert!(log.find("a", Operation::Start, Step::Finished).is_some());
        match err {
            LifecycleError::ServiceFailed {
                service, operation, ..
            } => {
                assert_eq!(service, "b");
                assert_eq!(operation, Operation::Start);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_first_failure_in_registration_order_is_reported() {
        let log = EventLog::default();
        let composite = CompositeService::new()
            .with(ScriptedService::new("first", &log).fail_on(Operation::Dispose))
            .with(ScriptedService::new("second", &log).fail_on(Operation::Dispose));

        let err = composite.dispose().await.unwrap_err();

        assert!(matches!(err, LifecycleError::ServiceFailed { ref service, .. } if service == "first"));
        assert_eq!(log.count(Operation::Dispose, Step::Finished), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_child_does_not_cut_off_slow_sibling() {
        let log = EventLog::default();
        let composite = CompositeService::new()
            .with(ScriptedService::new("slow", &log).delay(Operation::Stop, Duration::from_millis(50)))
            .with(ScriptedService::new("panicky", &log).panic_on(Operation::Stop));

        let err = composite.stop().await.unwrap_err();

        assert!(log.find("slow", Operation::Stop, Step::Finished).is_some());
        match err {
            LifecycleError::ServiceFailed {
                service, source, ..
            } => {
                assert_eq!(service, "panicky");
                assert!(matches!(
                    *source,
                    LifecycleError::Panicked { operation: Operation::Stop, ref message }
                        if message.contains("panicky panicked during stop")
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_composite_resolves() {
        let composite = combine(Vec::<Arc<dyn Lifecycle>>::new());

        assert!(composite.is_empty());
        composite.start().await.unwrap();
        composite.stop().await.unwrap();
        composite.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_twice_calls_each_child_twice() {
        let log = EventLog::default();
        let composite = CompositeService::new()
            .with(ScriptedService::new("a", &log))
            .with(ScriptedService::new("b", &log));

        composite.stop().await.unwrap();
        composite.stop().await.unwrap();

        assert_eq!(composite.len(), 2);
        assert_eq!(log.count(Operation::Stop, Step::Finished), 4);
    }
}

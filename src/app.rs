//! Application Bootstrap
//!
//! Wires configuration, logging, metrics, the HTTP service and any extra
//! services under one [`GracefulCoordinator`].

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::http::HttpService;
use crate::lifecycle::{
    CompositeService, CoordinatorBuilder, GracefulCoordinator, Lifecycle, LifecycleError,
    Operation, ProcessExit, SignalSource,
};
use crate::telemetry;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

/// A running application
///
/// # Example
///
/// ```rust,ignore
/// use lifeline::Application;
/// use axum::{Router, routing::get};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     Application::builder()
///         .routes(Router::new().route("/", get(|| async { "hello" })))
///         .service(outbox_relay)
///         .run()
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Application {
    config: ServiceConfig,
    coordinator: GracefulCoordinator,
    http: Arc<HttpService>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &GracefulCoordinator {
        &self.coordinator
    }

    /// Address the HTTP service is bound to while serving
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.http.local_addr().await
    }

    /// Wait for the shutdown sequence to finish
    pub async fn terminated(&self) {
        self.coordinator.terminated().await;
    }
}

/// Builder for [`Application`]
pub struct ApplicationBuilder {
    config: Option<ServiceConfig>,
    routes: Router,
    services: Vec<Arc<dyn Lifecycle>>,
    init_logging: bool,
    coordinator: CoordinatorBuilder,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            routes: Router::new(),
            services: Vec::new(),
            init_logging: true,
            coordinator: CoordinatorBuilder::new(),
        }
    }

    /// Use `config` instead of reading the environment
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Application routes served next to `/health`, `/ready` and `/metrics`
    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = routes;
        self
    }

    /// Run `service` alongside the HTTP service
    pub fn service<S>(self, service: S) -> Self
    where
        S: Lifecycle + 'static,
    {
        self.shared_service(Arc::new(service))
    }

    pub fn shared_service(mut self, service: Arc<dyn Lifecycle>) -> Self {
        self.services.push(service);
        self
    }

    /// Install the global `tracing` subscriber on start (default: true)
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    /// Use `signals` instead of OS signals
    pub fn signals<S: SignalSource>(mut self, signals: S) -> Self {
        self.coordinator = self.coordinator.signals(signals);
        self
    }

    /// Use `exit` instead of terminating the process
    pub fn exit<E: ProcessExit>(mut self, exit: E) -> Self {
        self.coordinator = self.coordinator.exit(exit);
        self
    }

    /// Start every service and arm the shutdown triggers
    pub async fn start(self) -> Result<Application> {
        let config = match self.config {
            Some(config) => config,
            None => ServiceConfig::from_env()?,
        };

        if self.init_logging {
            telemetry::init_logging(&config.log_level)?;
        }

        let metrics = if config.metrics_enabled {
            Some(telemetry::install_metrics()?)
        } else {
            None
        };

        let coordinator = self
            .coordinator
            .grace_period(config.grace_period)
            .hasten_on_second_signal(config.hasten_on_second_signal);
        let coordinator = match config.shutdown_deadline {
            Some(deadline) => coordinator.shutdown_deadline(deadline),
            None => coordinator.without_deadline(),
        };

        tracing::info!(
            service = %config.service_name,
            address = %config.addr(),
            extra_services = self.services.len(),
            "Bootstrapping application"
        );

        let routes = self.routes;
        let services = self.services;
        let http_config = config.http();
        let mut http = None;
        let mut composite = None;

        let created = coordinator
            .create(|ready| {
                let service = Arc::new(
                    HttpService::builder(http_config)
                        .routes(routes)
                        .metrics(metrics)
                        .build(ready),
                );
                http = Some(Arc::clone(&service));

                let all = Arc::new(services.into_iter().fold(
                    CompositeService::named(&config.service_name).with_shared(service),
                    CompositeService::with_shared,
                ));
                composite = Some(Arc::clone(&all));
                all
            })
            .await;

        let coordinator = match created {
            Ok(coordinator) => coordinator,
            Err(e) => {
                if let Some(composite) = composite {
                    roll_back(composite.as_ref()).await;
                }
                return Err(e.into());
            }
        };

        let http = http.ok_or_else(|| {
            Error::Lifecycle(LifecycleError::start_failed("HTTP service was not built"))
        })?;

        Ok(Application {
            config,
            coordinator,
            http,
        })
    }

    /// Start, then wait for the shutdown sequence to finish
    pub async fn run(self) -> Result<()> {
        let app = self.start().await?;
        app.terminated().await;
        Ok(())
    }
}

/// Stop and dispose whatever did start when start-up failed part way
async fn roll_back(services: &CompositeService) {
    tracing::warn!(service = services.name(), "Start-up failed, releasing started services");
    for operation in [Operation::Stop, Operation::Dispose] {
        if let Err(e) = operation.invoke(services).await {
            tracing::warn!(%operation, error = %e, "Roll back step failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{EventLog, ScriptedService, Step};
    use crate::lifecycle::{CapturedExit, CoordinatorState, SignalKind, SimulatedSignals};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn local_config() -> ServiceConfig {
        ServiceConfig {
            service_name: "orders".to_string(),
            host: [127, 0, 0, 1].into(),
            port: 0,
            grace_period: Duration::from_millis(10),
            shutdown_deadline: Some(Duration::from_secs(5)),
            ..ServiceConfig::default()
        }
    }

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_until_signalled_then_exits() {
        let log = EventLog::default();
        let (signals, trigger) = SimulatedSignals::new();
        let exit = CapturedExit::new();

        let app = Application::builder()
            .config(local_config())
            .init_logging(false)
            .service(ScriptedService::new("relay", &log))
            .signals(signals)
            .exit(exit.clone())
            .start()
            .await
            .unwrap();

        assert!(app.coordinator().is_ready());
        assert_eq!(app.coordinator().state(), CoordinatorState::Running);
        assert!(log.find("relay", Operation::Start, Step::Finished).is_some());

        let addr = app.local_addr().await.unwrap();
        let response = raw_get(addr, "/ready").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");

        assert!(trigger.signal(SignalKind::Terminate));
        app.terminated().await;

        assert_eq!(exit.code(), Some(0));
        assert!(log.find("relay", Operation::Stop, Step::Finished).is_some());
        assert!(log.find("relay", Operation::Dispose, Step::Finished).is_some());
        assert!(app.local_addr().await.is_none());
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_extra_service_fails_start() {
        let log = EventLog::default();
        let (signals, _trigger) = SimulatedSignals::new();

        let free = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = free.local_addr().unwrap();
        drop(free);

        let result = Application::builder()
            .config(ServiceConfig {
                port: addr.port(),
                ..local_config()
            })
            .init_logging(false)
            .service(ScriptedService::new("relay", &log).fail_on(Operation::Start))
            .signals(signals)
            .exit(CapturedExit::new())
            .start()
            .await;

        match result {
            Err(Error::Lifecycle(LifecycleError::ServiceFailed { service, .. })) => {
                assert_eq!(service, "relay");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("start should fail"),
        }

        assert!(log.find("relay", Operation::Stop, Step::Finished).is_some());
        assert!(log.find("relay", Operation::Dispose, Step::Finished).is_some());
        assert!(TcpStream::connect(addr).await.is_err());
        assert!(std::net::TcpListener::bind(addr).is_ok());
    }
}

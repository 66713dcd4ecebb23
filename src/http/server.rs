use super::{health, middleware, not_found};
use crate::lifecycle::{Lifecycle, LifecycleError, ReadinessProbe, Result};
use async_trait::async_trait;
use axum::{Router, http::HeaderValue};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Settings for [`HttpService`]
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub addr: SocketAddr,
    pub service_name: String,
    /// Default `cache-control` for responses that set none
    pub cache_control: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            service_name: "lifeline".to_string(),
            cache_control: "no-cache".to_string(),
        }
    }
}

struct Serving {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// HTTP server managed through [`Lifecycle`]
///
/// - `start` binds the listener and begins serving
/// - `stop` stops accepting, drains in-flight requests and waits for the server task
/// - `dispose` aborts background tasks and anything still serving
///
/// `stop` on a service that is not serving is a no-op, so it is safe to call twice.
pub struct HttpService {
    name: String,
    addr: SocketAddr,
    router: Router,
    serving: Mutex<Option<Serving>>,
    background: std::sync::Mutex<JoinSet<()>>,
}

impl HttpService {
    pub fn new(config: HttpConfig, routes: Router, probe: ReadinessProbe) -> Self {
        Self::builder(config).routes(routes).build(probe)
    }

    pub fn builder(config: HttpConfig) -> HttpServiceBuilder {
        HttpServiceBuilder {
            config,
            routes: Router::new(),
            metrics: None,
        }
    }

    /// Fully layered router, for driving requests without a listener
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Address actually bound, once started
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.serving.lock().await.as_ref().map(|serving| serving.local_addr)
    }

    /// Run a task owned by this service. It is aborted on `dispose`.
    pub fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .spawn(task);
    }

    fn take_background(&self) -> JoinSet<()> {
        std::mem::take(
            &mut *self
                .background
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

/// Builder for [`HttpService`]
pub struct HttpServiceBuilder {
    config: HttpConfig,
    routes: Router,
    metrics: Option<PrometheusHandle>,
}

impl HttpServiceBuilder {
    /// Application routes, merged with the monitoring routes
    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = routes;
        self
    }

    /// Serve `/metrics` from this recorder handle
    pub fn metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    pub fn build(self, probe: ReadinessProbe) -> HttpService {
        let cache_control = HeaderValue::from_str(&self.config.cache_control).unwrap_or_else(|_| {
            warn!(value = %self.config.cache_control, "Invalid cache-control value, using no-cache");
            HeaderValue::from_static("no-cache")
        });

        let monitor = health::MonitorState::new(&self.config.service_name, probe, self.metrics);
        let routes = self
            .routes
            .merge(health::routes(monitor))
            .fallback(not_found);

        HttpService {
            name: self.config.service_name,
            addr: self.config.addr,
            router: middleware::apply(routes, cache_control),
            serving: Mutex::new(None),
            background: std::sync::Mutex::new(JoinSet::new()),
        }
    }
}

#[async_trait]
impl Lifecycle for HttpService {
    async fn start(&self) -> Result<()> {
        let mut serving = self.serving.lock().await;
        if serving.is_some() {
            return Err(LifecycleError::already_started(&self.name));
        }

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| LifecycleError::start_failed(format!("failed to bind {}: {e}", self.addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| LifecycleError::start_failed(format!("failed to read bound address: {e}")))?;

        let (shutdown, stopped) = oneshot::channel::<()>();
        let router = self.router.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stopped.await;
                })
                .await
        });

        info!(service = %self.name, address = %local_addr, "HTTP service listening");
        *serving = Some(Serving {
            local_addr,
            shutdown,
            task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(serving) = self.serving.lock().await.take() else {
            debug!(service = %self.name, "HTTP service not serving, nothing to stop");
            return Ok(());
        };

        info!(service = %self.name, "Draining HTTP connections");
        let _ = serving.shutdown.send(());

        match serving.task.await {
            Ok(Ok(())) => {
                info!(service = %self.name, "HTTP service stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(LifecycleError::stop_failed(format!("server error: {e}"))),
            Err(e) => Err(LifecycleError::stop_failed(format!("server task failed: {e}"))),
        }
    }

    async fn dispose(&self) -> Result<()> {
        if let Some(serving) = self.serving.lock().await.take() {
            warn!(service = %self.name, "HTTP service still serving at dispose, aborting");
            serving.task.abort();
        }

        let mut background = self.take_background();
        if !background.is_empty() {
            debug!(service = %self.name, tasks = background.len(), "Aborting background tasks");
        }
        background.shutdown().await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

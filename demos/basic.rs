//! Minimal service: one route, one background worker, graceful shutdown.
//!
//! ```text
//! PORT=8080 GRACE_PERIOD_MS=2000 cargo run --example basic
//! curl localhost:8080/ready
//! kill -TERM <pid>
//! ```

use axum::{Json, Router, routing::get};
use lifeline::prelude::*;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Counts ticks until asked to stop
#[derive(Default)]
struct Ticker {
    ticks: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Lifecycle for Ticker {
    async fn start(&self) -> Result<(), LifecycleError> {
        let ticks = Arc::clone(&self.ticks);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::Relaxed);
            }
        });

        let mut slot = self
            .task
            .lock()
            .map_err(|_| LifecycleError::start_failed("ticker state poisoned"))?;
        if slot.is_some() {
            task.abort();
            return Err(LifecycleError::already_started(self.name()));
        }
        *slot = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<(), LifecycleError> {
        let task = self
            .task
            .lock()
            .map_err(|_| LifecycleError::stop_failed("ticker state poisoned"))?
            .take();
        if let Some(task) = task {
            task.abort();
            tracing::info!(ticks = self.ticks.load(Ordering::Relaxed), "Ticker stopped");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ticker"
    }
}

async fn hello() -> Json<Value> {
    Json(json!({ "message": "hello" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let routes = Router::new().route("/", get(hello));

    Application::builder()
        .routes(routes)
        .service(Ticker::default())
        .run()
        .await?;

    Ok(())
}

//! Logging and metrics setup
//!
//! Logging goes through `tracing`; the subscriber honours `RUST_LOG` and falls
//! back to the configured filter. Metrics use the `metrics` facade with a
//! Prometheus recorder rendered by the `/metrics` endpoint.

use crate::error::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` wins over `default_filter`. Returns `Ok(false)` when a
/// subscriber was already installed, which is not an error.
pub fn init_logging(default_filter: &str) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| Error::Telemetry(format!("invalid log filter {default_filter:?}: {e}")))?,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = default_filter, "Logging initialized");
    }
    Ok(installed)
}

/// Install the global Prometheus recorder
///
/// Fails if another `metrics` recorder is already installed.
pub fn install_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Telemetry(format!("failed to install metrics recorder: {e}")))
}

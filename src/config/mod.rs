//! Configuration
//!
//! [`ConfigService`] snapshots key/value pairs (the process environment by
//! default); [`ServiceConfig`] parses the typed settings out of it.

use crate::error::{Error, Result};
use crate::http::HttpConfig;
use crate::lifecycle::{DEFAULT_DEADLINE_ALLOWANCE, DEFAULT_GRACE_PERIOD};
use dashmap::DashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Key/value configuration store
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Snapshot the process environment
    pub fn new() -> Self {
        Self::from_pairs(env::vars())
    }

    /// Build from explicit pairs, ignoring the environment
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let service = Self::default();
        for (key, value) in pairs {
            service.config.insert(key.into(), value.into());
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parse `key`, falling back to `default` when unset or blank
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| Error::config(key, format!("{raw:?}: {e}"))),
            _ => Ok(default),
        }
    }

    /// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`)
    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Error::config(key, format!("{raw:?} is not a boolean"))),
        }
    }
}

/// Typed service settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub service_name: String,
    pub host: IpAddr,
    pub port: u16,
    pub grace_period: Duration,
    /// `None` disables the shutdown deadline
    pub shutdown_deadline: Option<Duration>,
    pub hasten_on_second_signal: bool,
    pub log_level: String,
    pub metrics_enabled: bool,
    pub cache_control: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "lifeline".to_string(),
            host: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            grace_period: DEFAULT_GRACE_PERIOD,
            shutdown_deadline: Some(DEFAULT_GRACE_PERIOD + DEFAULT_DEADLINE_ALLOWANCE),
            hasten_on_second_signal: false,
            log_level: "info".to_string(),
            metrics_enabled: false,
            cache_control: "no-cache".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_config(&ConfigService::new())
    }

    /// Load from a [`ConfigService`]
    ///
    /// | Key | Default |
    /// |---|---|
    /// | `SERVICE_NAME` | `lifeline` |
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `GRACE_PERIOD_MS` | `15000` |
    /// | `SHUTDOWN_DEADLINE_MS` | grace period + 30000, `0` disables |
    /// | `HASTEN_ON_SECOND_SIGNAL` | `false` |
    /// | `LOG_LEVEL` | `info` |
    /// | `METRICS_ENABLED` | `false` |
    /// | `CACHE_CONTROL` | `no-cache` |
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();

        let grace_period = Duration::from_millis(
            config.parse_or("GRACE_PERIOD_MS", defaults.grace_period.as_millis() as u64)?,
        );
        let shutdown_deadline = match config.get("SHUTDOWN_DEADLINE_MS") {
            Some(raw) if !raw.trim().is_empty() => match config.parse_or("SHUTDOWN_DEADLINE_MS", 0u64)? {
                0 => None,
                millis => Some(Duration::from_millis(millis)),
            },
            _ => Some(grace_period + DEFAULT_DEADLINE_ALLOWANCE),
        };

        let service_name = config
            .get("SERVICE_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.service_name);

        Ok(Self {
            service_name,
            host: config.parse_or("HOST", defaults.host)?,
            port: config.parse_or("PORT", defaults.port)?,
            grace_period,
            shutdown_deadline,
            hasten_on_second_signal: config
                .flag_or("HASTEN_ON_SECOND_SIGNAL", defaults.hasten_on_second_signal)?,
            log_level: config.parse_or("LOG_LEVEL", defaults.log_level)?,
            metrics_enabled: config.flag_or("METRICS_ENABLED", defaults.metrics_enabled)?,
            cache_control: config.parse_or("CACHE_CONTROL", defaults.cache_control)?,
        })
    }

    /// Address the HTTP service binds to
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Settings for [`HttpService`](crate::http::HttpService)
    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            addr: self.addr(),
            service_name: self.service_name.clone(),
            cache_control: self.cache_control.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ServiceConfig::from_config(&ConfigService::from_pairs(Vec::<(String, String)>::new())).unwrap();

        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.addr(), "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.shutdown_deadline, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_parses_every_key() {
        let source = ConfigService::from_pairs([
            ("SERVICE_NAME", "orders"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("GRACE_PERIOD_MS", "2500"),
            ("SHUTDOWN_DEADLINE_MS", "10000"),
            ("HASTEN_ON_SECOND_SIGNAL", "yes"),
            ("LOG_LEVEL", "lifeline=debug"),
            ("METRICS_ENABLED", "1"),
            ("CACHE_CONTROL", "private, max-age=60"),
        ]);

        let config = ServiceConfig::from_config(&source).unwrap();

        assert_eq!(config.service_name, "orders");
        assert_eq!(config.addr(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.grace_period, Duration::from_millis(2500));
        assert_eq!(config.shutdown_deadline, Some(Duration::from_secs(10)));
        assert!(config.hasten_on_second_signal);
        assert_eq!(config.log_level, "lifeline=debug");
        assert!(config.metrics_enabled);
        assert_eq!(config.http().cache_control, "private, max-age=60");
    }

    #[test]
    fn test_deadline_follows_grace_period_and_zero_disables() {
        let source = ConfigService::from_pairs([("GRACE_PERIOD_MS", "0")]);
        let config = ServiceConfig::from_config(&source).unwrap();
        assert_eq!(config.grace_period, Duration::ZERO);
        assert_eq!(config.shutdown_deadline, Some(DEFAULT_DEADLINE_ALLOWANCE));

        source.set("SHUTDOWN_DEADLINE_MS", "0");
        let config = ServiceConfig::from_config(&source).unwrap();
        assert_eq!(config.shutdown_deadline, None);
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let source = ConfigService::from_pairs([("PORT", "http")]);
        let err = ServiceConfig::from_config(&source).unwrap_err();
        assert!(matches!(err, Error::Config { ref key, .. } if key == "PORT"));

        let source = ConfigService::from_pairs([("METRICS_ENABLED", "maybe")]);
        let err = ServiceConfig::from_config(&source).unwrap_err();
        assert!(matches!(err, Error::Config { ref key, .. } if key == "METRICS_ENABLED"));
    }
}

//! Configuration types

use crate::{ConfigError, FinanError, FinanResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// How a failed mutation puts the cache back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Restore the pre-mutation snapshot wholesale, whatever happened since.
    Unconditional,
    /// Restore the snapshot only if nobody else wrote the entry since the
    /// optimistic install; otherwise undo just the touched record.
    #[default]
    Versioned,
}

impl FromStr for RollbackPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unconditional" => Ok(RollbackPolicy::Unconditional),
            "versioned" => Ok(RollbackPolicy::Versioned),
            other => Err(ConfigError::InvalidValue {
                field: "rollback_policy".to_string(),
                value: other.to_string(),
                reason: "expected unconditional or versioned".to_string(),
            }),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ConfigError::InvalidValue {
                field: "log_format".to_string(),
                value: other.to_string(),
                reason: "expected json or pretty".to_string(),
            }),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// How long a successful fetch counts as fresh.
    pub stale_time: Duration,
    /// Idle time after which an entry may be evicted.
    pub retention: Duration,
    /// Capacity of the cache change-event channel.
    pub event_capacity: usize,
    pub rollback_policy: RollbackPolicy,
    /// Await the reconciliation refetch before a mutation returns.
    pub await_reconciliation: bool,
    pub log_format: LogFormat,
    pub log_filter: String,
    /// Simulated latency for the in-memory store.
    pub store_latency: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            retention: Duration::from_secs(300),
            event_capacity: 256,
            rollback_policy: RollbackPolicy::default(),
            await_reconciliation: true,
            log_format: LogFormat::default(),
            log_filter: "finanboard=debug,info".to_string(),
            store_latency: Duration::ZERO,
        }
    }
}

fn millis(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from `FINANBOARD_*` environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults; call
    /// [`AppConfig::validate`] on the result.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let stale_time = millis(lookup("FINANBOARD_STALE_TIME_MS"), defaults.stale_time);
        let retention = millis(lookup("FINANBOARD_RETENTION_MS"), defaults.retention);
        let store_latency = millis(lookup("FINANBOARD_STORE_LATENCY_MS"), defaults.store_latency);

        let event_capacity = lookup("FINANBOARD_EVENT_CAPACITY")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.event_capacity);

        let rollback_policy = lookup("FINANBOARD_ROLLBACK_POLICY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.rollback_policy);

        let await_reconciliation = lookup("FINANBOARD_AWAIT_RECONCILIATION")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.await_reconciliation);

        let log_format = lookup("FINANBOARD_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.log_format);

        let log_filter = lookup("FINANBOARD_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        Self {
            stale_time,
            retention,
            event_capacity,
            rollback_policy,
            await_reconciliation,
            log_format,
            log_filter,
            store_latency,
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - retention is positive and not shorter than stale_time
    /// - event_capacity > 0
    /// - log_filter is non-empty
    pub fn validate(&self) -> FinanResult<()> {
        if self.retention.is_zero() {
            return Err(FinanError::Config(ConfigError::InvalidValue {
                field: "retention".to_string(),
                value: format!("{:?}", self.retention),
                reason: "retention must be positive".to_string(),
            }));
        }

        if self.retention < self.stale_time {
            return Err(FinanError::Config(ConfigError::InvalidValue {
                field: "retention".to_string(),
                value: format!("{:?}", self.retention),
                reason: format!(
                    "retention must not be shorter than stale_time ({:?})",
                    self.stale_time
                ),
            }));
        }

        if self.event_capacity == 0 {
            return Err(FinanError::Config(ConfigError::InvalidValue {
                field: "event_capacity".to_string(),
                value: self.event_capacity.to_string(),
                reason: "event_capacity must be greater than 0".to_string(),
            }));
        }

        if self.log_filter.trim().is_empty() {
            return Err(FinanError::Config(ConfigError::InvalidValue {
                field: "log_filter".to_string(),
                value: self.log_filter.clone(),
                reason: "log_filter must not be empty".to_string(),
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rollback_policy, RollbackPolicy::Versioned);
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FINANBOARD_STALE_TIME_MS", "1500"),
            ("FINANBOARD_RETENTION_MS", "60000"),
            ("FINANBOARD_EVENT_CAPACITY", "16"),
            ("FINANBOARD_ROLLBACK_POLICY", "Unconditional"),
            ("FINANBOARD_AWAIT_RECONCILIATION", "false"),
            ("FINANBOARD_LOG_FORMAT", "json"),
            ("FINANBOARD_LOG", "finanboard=trace"),
        ]));
        assert_eq!(config.stale_time, Duration::from_millis(1500));
        assert_eq!(config.retention, Duration::from_secs(60));
        assert_eq!(config.event_capacity, 16);
        assert_eq!(config.rollback_policy, RollbackPolicy::Unconditional);
        assert!(!config.await_reconciliation);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_filter, "finanboard=trace");
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FINANBOARD_STALE_TIME_MS", "soon"),
            ("FINANBOARD_ROLLBACK_POLICY", "sometimes"),
        ]));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = AppConfig {
            event_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            FinanError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "event_capacity"
        ));
    }

    #[test]
    fn test_validate_rejects_retention_below_stale_time() {
        let config = AppConfig {
            stale_time: Duration::from_secs(10),
            retention: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rollback_policy_parse_error() {
        let err = "maybe".parse::<RollbackPolicy>().unwrap_err();
        assert!(err.to_string().contains("rollback_policy"));
    }
}

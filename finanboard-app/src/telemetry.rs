//! Tracing subscriber setup.

use finanboard_core::{AppConfig, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Install the global subscriber. Call once at startup.
///
/// `RUST_LOG` wins over the configured filter when set.
pub fn init_tracing(config: &AppConfig) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| AppError::Telemetry {
            reason: format!("invalid log filter {:?}: {}", config.log_filter, e),
        })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
    };
    installed.map_err(|e| AppError::Telemetry {
        reason: format!("failed to install subscriber: {}", e),
    })?;

    tracing::info!(
        log_format = ?config.log_format,
        filter = %config.log_filter,
        rollback_policy = ?config.rollback_policy,
        "Telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_reported() {
        let config = AppConfig {
            log_filter: "finanboard=loud".to_string(),
            ..AppConfig::default()
        };
        // A process-wide RUST_LOG would bypass the configured filter.
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(
                init_tracing(&config),
                Err(AppError::Telemetry { .. })
            ));
        }
    }
}

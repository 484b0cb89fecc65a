//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.
//! `RUST_LOG`, when set, takes precedence over the configured log level.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Create a tracing span for a backend operation.
///
/// ```rust,ignore
/// let span = backend_span!("role_write", "host/db1");
/// let span = backend_span!("creds_issue", "creds/db1", role = "db1");
/// ```
#[macro_export]
macro_rules! backend_span {
    ($operation:expr, $path:expr) => {
        tracing::info_span!(
            "backend_operation",
            operation = %$operation,
            path = %$path,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "backend_operation",
            operation = %$operation,
            path = %$path,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for lease callbacks.
#[macro_export]
macro_rules! lease_span {
    ($action:expr, $lease_id:expr) => {
        tracing::info_span!(
            "lease_operation",
            action = %$action,
            lease_id = %$lease_id
        )
    };
}

/// Build the env filter from `RUST_LOG`, falling back to the configured level.
pub fn build_env_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::settings(format!("invalid log level '{}': {}", config.log_level, e))
        }),
    }
}

/// Install the global fmt subscriber, writing to stderr.
///
/// Fails if a global subscriber has already been set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if config.json_logging {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::settings(format!("failed to install log subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json = config.json_logging,
        "Logging initialized"
    );
    Ok(())
}

/// Log the effective settings at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        password_length = config.backend.password_length,
        credentials_path = %config.upstream.credentials_path,
        "Credential backend configuration"
    );
}

//! # Configuration Settings
//!
//! Process-level settings for the credential backend. These are distinct from the
//! backend's *stored* configuration (the upstream username/password/URL), which
//! lives in the host's storage and is managed through the `config` path.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    /// Credential issuance settings
    #[validate(nested)]
    pub backend: BackendSettings,

    /// Upstream HTTP client settings
    #[validate(nested)]
    pub upstream: UpstreamSettings,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if self.upstream.credentials_path.trim_matches('/').is_empty() {
            return Err(Error::settings("upstream credentials path cannot be empty"));
        }

        if tracing_subscriber::EnvFilter::try_new(&self.observability.log_level).is_err() {
            return Err(Error::settings(format!(
                "invalid log level directive '{}'",
                self.observability.log_level
            )));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name attached to log output
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: crate::APP_NAME.to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

/// Credential issuance settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BackendSettings {
    /// Length of passwords produced without a named policy
    #[validate(range(
        min = 16,
        max = 128,
        message = "Password length must be between 16 and 128 characters"
    ))]
    pub password_length: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self { password_length: 36 }
    }
}

/// Upstream HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Path below the configured URL where credentials are created and revoked
    #[validate(length(min = 1, message = "Credentials path cannot be empty"))]
    pub credentials_path: String,

    /// User agent sent with every upstream request
    #[validate(length(min = 1, message = "User agent cannot be empty"))]
    pub user_agent: String,

    /// Per-request timeout in seconds. Unset leaves cancellation to the caller.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Request timeout must be between 1 and 300 seconds"
    ))]
    pub request_timeout_secs: Option<u64>,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            credentials_path: "credentials".to_string(),
            user_agent: format!("{}/{}", crate::APP_NAME, crate::VERSION),
            request_timeout_secs: None,
        }
    }
}

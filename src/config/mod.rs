//! # Configuration Management
//!
//! Loads [`AppConfig`] from defaults, an optional file and `DYNCRED_*`
//! environment variables, in that order of precedence (later wins).
//! Nested keys use a double underscore: `DYNCRED_BACKEND__PASSWORD_LENGTH=48`.

pub mod settings;

pub use settings::{AppConfig, BackendSettings, ObservabilityConfig, UpstreamSettings};

use crate::Result;
use std::path::Path;

/// Environment variable prefix for settings
pub const ENV_PREFIX: &str = "DYNCRED";

impl AppConfig {
    /// Load settings from the environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load settings from an optional file overlaid with the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder.build()?.try_deserialize()?;
        app_config.validate()?;

        tracing::debug!(
            password_length = app_config.backend.password_length,
            credentials_path = %app_config.upstream.credentials_path,
            "Loaded application settings"
        );

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    // Serializes tests that touch process environment
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_without_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::remove_var("DYNCRED_BACKEND__PASSWORD_LENGTH");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.backend.password_length, 36);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("DYNCRED_BACKEND__PASSWORD_LENGTH", "48");

        let config = AppConfig::from_env();

        env::remove_var("DYNCRED_BACKEND__PASSWORD_LENGTH");
        assert_eq!(config.unwrap().backend.password_length, 48);
    }

    #[test]
    fn test_invalid_environment_value_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("DYNCRED_BACKEND__PASSWORD_LENGTH", "4");

        let result = AppConfig::from_env();

        env::remove_var("DYNCRED_BACKEND__PASSWORD_LENGTH");
        assert!(result.is_err());
    }

    #[test]
    fn test_file_source() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[upstream]\ncredentials_path = \"v2/accounts\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.upstream.credentials_path, "v2/accounts");
        assert_eq!(config.backend.password_length, 36);
    }
}

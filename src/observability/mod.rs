//! # Observability
//!
//! Structured logging for the credential backend.

pub mod logging;

pub use logging::{build_env_filter, init_logging, log_config_info};

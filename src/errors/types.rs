//! # Error Types
//!
//! Error taxonomy for the credential backend using `thiserror`.
//!
//! Validation problems (`InvalidArgument`), missing resources (`NotFound`) and
//! host contract violations (`FailedPrecondition`) are kept apart so callers can
//! tell "bad request" from "doesn't exist" from "the host handed us a broken lease".
//! Storage failures are carried through untouched.

use crate::storage::StorageError;

/// Custom result type for backend operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the credential backend
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or missing caller input
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The referenced role, config or lease target does not exist
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The host violated the lease contract (e.g. internal data missing)
    #[error("failed precondition: {message}")]
    FailedPrecondition { message: String },

    /// Upstream client could not be constructed from the stored configuration
    #[error("invalid client configuration: {message}")]
    InvalidConfig { message: String },

    /// A call against the upstream system failed
    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Storage collaborator errors, propagated unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A persisted record could not be encoded or decoded
    #[error("serialization error: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Process settings could not be loaded or failed validation
    #[error("settings error: {message}")]
    Settings {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Create a failed precondition error
    pub fn failed_precondition<S: Into<String>>(message: S) -> Self {
        Self::FailedPrecondition { message: message.into() }
    }

    /// Create an invalid client configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Wrap any error raised while talking to the upstream system
    pub fn upstream<S, E>(context: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Upstream { context: context.into(), source: source.into() }
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(context: S, source: serde_json::Error) -> Self {
        Self::Serialization { context: context.into(), source }
    }

    /// Create a settings error without an underlying cause
    pub fn settings<S: Into<String>>(message: S) -> Self {
        Self::Settings { message: message.into(), source: None }
    }

    /// HTTP-equivalent status class for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidArgument { .. } => 400,
            Error::NotFound { .. } => 404,
            Error::FailedPrecondition { .. } => 412,
            Error::InvalidConfig { .. } => 400,
            Error::Upstream { .. } => 502,
            Error::Storage(_) => 500,
            Error::Serialization { .. } => 500,
            Error::Settings { .. } => 500,
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    ///
    /// The backend itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Upstream { .. } | Error::Storage(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::Settings {
            message: "settings loading failed".to_string(),
            source: Some(Box::new(error)),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Display walks nested structs, field_errors() would only see the top level.
        Self::settings(format!("validation failed: {}", errors))
    }
}

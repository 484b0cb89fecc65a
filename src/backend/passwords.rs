//! Password generation for issued accounts.

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::secrets::SecretString;

/// Length of passwords produced without a named policy
pub const DEFAULT_PASSWORD_LENGTH: usize = 36;

/// Host-provided generator for named password policies.
#[async_trait]
pub trait PasswordPolicySource: Send + Sync + std::fmt::Debug {
    async fn generate(&self, policy: &str) -> Result<SecretString>;
}

/// Produces a fresh password on every call.
#[derive(Debug, Clone)]
pub struct PasswordGenerator {
    length: usize,
    policies: Option<Arc<dyn PasswordPolicySource>>,
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD_LENGTH)
    }
}

impl PasswordGenerator {
    pub fn new(length: usize) -> Self {
        Self { length, policies: None }
    }

    pub fn with_policy_source(mut self, source: Arc<dyn PasswordPolicySource>) -> Self {
        self.policies = Some(source);
        self
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a password, delegating to the named policy when one is given.
    pub async fn generate(&self, policy: &str) -> Result<SecretString> {
        if policy.is_empty() {
            return Ok(self.random());
        }

        let source = self.policies.as_ref().ok_or_else(|| {
            Error::failed_precondition(format!(
                "password policy '{}' requested but no policy generator is available",
                policy
            ))
        })?;

        debug!(policy = %policy, "Generating password from policy");
        source.generate(policy).await
    }

    /// Random alphanumeric password from the OS RNG.
    pub fn random(&self) -> SecretString {
        let password: String =
            OsRng.sample_iter(&Alphanumeric).take(self.length).map(char::from).collect();
        SecretString::new(password)
    }
}

//! Upstream client seam and the lazily built, invalidatable client cache.
//!
//! The backend holds at most one upstream client at a time. It is built on first
//! use from whatever configuration is stored at that moment and thrown away
//! whenever the configuration changes, so the next caller rebuilds it from
//! current settings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::config_store::{get_config, BackendConfig};
use crate::errors::{Error, Result};
use crate::secrets::{exposed, SecretString};
use crate::storage::Storage;

/// What the backend asks the upstream for when issuing credentials.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    /// Role the credentials are scoped to
    pub role: String,
    /// Endpoint the role authorizes access to
    pub host: String,
}

/// Username/password pair produced by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(with = "exposed")]
    pub password: SecretString,
}

/// The external system that actually owns the accounts.
#[async_trait]
pub trait UpstreamClient: Send + Sync + std::fmt::Debug {
    /// Create a credential pair for the given request.
    async fn issue_credentials(&self, request: &CredentialRequest) -> Result<Credentials>;

    /// Revoke a previously issued username. An empty username must be accepted.
    async fn revoke_credentials(&self, username: &str) -> Result<()>;
}

/// Builds an upstream client from stored configuration.
///
/// The cache validates the required fields before calling [`ClientFactory::build`],
/// so implementations only deal with their own construction concerns.
pub trait ClientFactory: Send + Sync + std::fmt::Debug {
    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn UpstreamClient>>;
}

/// Reject configurations that cannot reach the upstream.
pub fn validate_client_config(config: &BackendConfig) -> Result<()> {
    if config.username.is_empty() {
        return Err(Error::invalid_config("client username was not defined"));
    }
    if config.password.is_empty() {
        return Err(Error::invalid_config("client password was not defined"));
    }
    if config.url.is_empty() {
        return Err(Error::invalid_config("client URL was not defined"));
    }
    Ok(())
}

/// Single-slot cache for the upstream client.
///
/// Readers share the lock on the fast path. On a miss the writer lock is taken,
/// the slot is re-checked, and only then is a client built, so concurrent
/// callers never observe a half-built client and at most one is built per
/// configuration epoch.
#[derive(Debug)]
pub struct ClientCache {
    client: RwLock<Option<Arc<dyn UpstreamClient>>>,
    factory: Arc<dyn ClientFactory>,
    constructions: AtomicU64,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { client: RwLock::new(None), factory, constructions: AtomicU64::new(0) }
    }

    /// Return the cached client, building it from stored configuration on a miss.
    ///
    /// Missing configuration is treated as an empty one, which fails the
    /// required-field check with [`Error::InvalidConfig`]. Failures are not cached.
    pub async fn get_client(&self, storage: &dyn Storage) -> Result<Arc<dyn UpstreamClient>> {
        {
            let slot = self.client.read().await;
            if let Some(client) = slot.as_ref() {
                return Ok(Arc::clone(client));
            }
        }

        let mut slot = self.client.write().await;
        if let Some(client) = slot.as_ref() {
            debug!("Upstream client built by a concurrent caller");
            return Ok(Arc::clone(client));
        }

        let config = get_config(storage).await?.unwrap_or_default();
        validate_client_config(&config)?;

        let client = self.factory.build(&config)?;
        self.constructions.fetch_add(1, Ordering::SeqCst);
        info!(url = %config.url, username = %config.username, "Built upstream client");

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the cached client. Idempotent.
    pub async fn reset(&self) {
        let mut slot = self.client.write().await;
        if slot.take().is_some() {
            debug!("Discarded cached upstream client");
        }
    }

    /// Whether a client is currently cached
    pub async fn is_cached(&self) -> bool {
        self.client.read().await.is_some()
    }

    /// Number of clients successfully built over the cache's lifetime
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::SeqCst)
    }
}

//! # Credential Backend
//!
//! Issues short-lived upstream credentials for named roles and handles the
//! renew/revoke callbacks for the leases it hands out.
//!
//! - [`config_store`]: how to reach the upstream
//! - [`client`]: the upstream client seam and its lazily built cache
//! - [`roles`]: role definitions and their TTL rules
//! - [`creds`]: issuance
//! - [`lease`]: renew and revoke
//! - [`paths`]: typed request surface
//!
//! All persistent state lives in the host-provided [`Storage`]. The only
//! in-process shared state is the cached upstream client.

pub mod client;
pub mod config_store;
pub mod creds;
pub mod lease;
pub mod passwords;
pub mod paths;
pub mod roles;
pub mod upstream;

pub use client::{ClientCache, ClientFactory, CredentialRequest, Credentials, UpstreamClient};
pub use config_store::{BackendConfig, ConfigWriteRequest, CONFIG_STORAGE_PATH};
pub use lease::{Lease, LeaseAction, CRED_LEASE_KIND};
pub use passwords::{PasswordGenerator, PasswordPolicySource, DEFAULT_PASSWORD_LENGTH};
pub use paths::{Operation, Request, RequestBody, Response, Route, RouteHelp, WriteMode};
pub use roles::{RoleEntry, RoleWriteRequest};
pub use upstream::{
    HttpClientFactory, HttpUpstreamClient, PlaceholderClient, PlaceholderClientFactory,
};

use std::sync::Arc;
use tracing::{debug, Instrument};

use crate::config::AppConfig;
use crate::errors::{Error, Result};
use crate::secrets::SecretString;
use crate::storage::Storage;

/// Help text shown by hosts that surface backend documentation
pub const BACKEND_HELP: &str = "\
The dyncred backend issues short-lived credentials for an upstream system.

Configure how to reach the upstream at `config`, define roles under
`host/<name>`, then read `creds/<name>` to obtain a username and password
bound to a lease. Renewing the lease reapplies the role's current TTLs;
revoking it removes the username upstream.";

/// One backend instance: its storage, its client cache and its password source.
///
/// Instances are independent. Each owns its own client slot, so several can
/// coexist in one process without sharing upstream state.
#[derive(Debug)]
pub struct Backend {
    storage: Arc<dyn Storage>,
    clients: ClientCache,
    passwords: PasswordGenerator,
}

impl Backend {
    pub fn new(storage: Arc<dyn Storage>, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            storage,
            clients: ClientCache::new(factory),
            passwords: PasswordGenerator::default(),
        }
    }

    /// Backend talking HTTP to the upstream, sized by process settings.
    pub fn from_settings(storage: Arc<dyn Storage>, config: &AppConfig) -> Self {
        Self::from_settings_with_policies(storage, config, None)
    }

    /// Like [`Backend::from_settings`], with a host generator for named
    /// password policies. The HTTP client and [`Backend::generate_password`]
    /// share it.
    pub fn from_settings_with_policies(
        storage: Arc<dyn Storage>,
        config: &AppConfig,
        policies: Option<Arc<dyn PasswordPolicySource>>,
    ) -> Self {
        let mut passwords = PasswordGenerator::new(config.backend.password_length);
        if let Some(source) = policies {
            passwords = passwords.with_policy_source(source);
        }

        let factory = HttpClientFactory::new(config.upstream.clone())
            .with_password_generator(passwords.clone());
        Self::new(storage, Arc::new(factory)).with_password_generator(passwords)
    }

    pub fn with_password_generator(mut self, passwords: PasswordGenerator) -> Self {
        self.passwords = passwords;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn client_cache(&self) -> &ClientCache {
        &self.clients
    }

    /// Cached upstream client, built from stored configuration on first use.
    pub async fn get_client(&self) -> Result<Arc<dyn UpstreamClient>> {
        self.clients.get_client(self.storage.as_ref()).await
    }

    /// Discard the cached upstream client.
    pub async fn reset(&self) {
        self.clients.reset().await;
    }

    /// Storage change notification from the host. Only the config key matters.
    pub async fn invalidate(&self, key: &str) {
        if key == CONFIG_STORAGE_PATH {
            debug!(key = %key, "Configuration changed, resetting upstream client");
            self.reset().await;
        }
    }

    /// Fresh password using the configured policy, or random when none is set.
    ///
    /// For flows that need a password of their own. Issuance does not call it.
    pub async fn generate_password(&self) -> Result<SecretString> {
        let policy =
            self.read_config().await?.map(|c| c.password_policy).unwrap_or_default();
        self.passwords.generate(&policy).await
    }

    /// Existence check the host uses to choose between create and update.
    pub async fn exists(&self, route: &Route) -> Result<bool> {
        match route {
            Route::Config => self.config_exists().await,
            Route::Role(name) => self.role_exists(name).await,
            Route::RoleList | Route::Creds(_) => Ok(false),
        }
    }

    /// Route a request to the matching operation.
    ///
    /// `Ok(None)` means success with nothing to return: a write, a delete, or a
    /// read of a record that does not exist.
    pub async fn handle(&self, request: Request) -> Result<Option<Response>> {
        let span = crate::backend_span!(request.operation, request.route);
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: Request) -> Result<Option<Response>> {
        let Request { operation, route, body } = request;

        match (route, operation) {
            (Route::Config, Operation::Read) => {
                let config = self.read_config().await?;
                Ok(config.map(|c| Response::with_data(c.to_response_data())))
            }
            (Route::Config, Operation::Create | Operation::Update) => {
                let mode = write_mode(operation)?;
                self.write_config(mode, config_body(body)?).await?;
                Ok(None)
            }
            (Route::Config, Operation::Delete) => {
                self.delete_config().await?;
                Ok(None)
            }
            (Route::Role(name), Operation::Read) => {
                let role = self.get_role(&name).await?;
                Ok(role.map(|r| Response::with_data(r.to_response_data())))
            }
            (Route::Role(name), Operation::Create | Operation::Update) => {
                let mode = write_mode(operation)?;
                self.write_role(&name, mode, role_body(body)?).await?;
                Ok(None)
            }
            (Route::Role(name), Operation::Delete) => {
                self.delete_role(&name).await?;
                Ok(None)
            }
            (Route::RoleList, Operation::List) => {
                Ok(Some(Response::list(self.list_roles().await?)))
            }
            (Route::Creds(name), Operation::Read | Operation::Update) => {
                self.read_credentials(&name).await.map(Some)
            }
            (route, operation) => Err(Error::invalid_argument(format!(
                "unsupported operation '{}' on path '{}'",
                operation, route
            ))),
        }
    }
}

fn write_mode(operation: Operation) -> Result<WriteMode> {
    operation
        .write_mode()
        .ok_or_else(|| Error::invalid_argument(format!("'{}' is not a write", operation)))
}

fn config_body(body: RequestBody) -> Result<ConfigWriteRequest> {
    match body {
        RequestBody::Config(request) => Ok(request),
        RequestBody::Empty => Ok(ConfigWriteRequest::default()),
        RequestBody::Role(_) => Err(Error::invalid_argument("role fields sent to config path")),
    }
}

fn role_body(body: RequestBody) -> Result<RoleWriteRequest> {
    match body {
        RequestBody::Role(request) => Ok(request),
        RequestBody::Empty => Ok(RoleWriteRequest::default()),
        RequestBody::Config(_) => Err(Error::invalid_argument("config fields sent to role path")),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::placeholder_backend;
    use super::*;
    use std::time::Duration;

    fn config_request() -> Request {
        Request::new(Operation::Create, Route::Config).with_body(RequestBody::Config(
            ConfigWriteRequest {
                username: Some("svc".to_string()),
                url: Some("https://api.example".to_string()),
                password: Some(SecretString::new("p")),
                ..Default::default()
            },
        ))
    }

    fn role_request(operation: Operation, name: &str, ttl: u64, max_ttl: u64) -> Request {
        Request::new(operation, Route::Role(name.to_string())).with_body(RequestBody::Role(
            RoleWriteRequest {
                host: Some("db.internal".to_string()),
                ttl: Some(Duration::from_secs(ttl)),
                max_ttl: Some(Duration::from_secs(max_ttl)),
            },
        ))
    }

    #[tokio::test]
    async fn test_invalidate_only_reacts_to_config_key() {
        let (backend, _storage) = placeholder_backend();
        backend.handle(config_request()).await.unwrap();
        backend.get_client().await.unwrap();

        backend.invalidate("host/db1").await;
        assert!(backend.client_cache().is_cached().await);

        backend.invalidate(CONFIG_STORAGE_PATH).await;
        assert!(!backend.client_cache().is_cached().await);
    }

    #[tokio::test]
    async fn test_exists_drives_write_mode() {
        let (backend, _storage) = placeholder_backend();
        let route = Route::Role("db1".to_string());
        let exists = backend.exists(&route).await.unwrap();
        assert_eq!(WriteMode::from_exists(exists), WriteMode::Create);

        backend.handle(role_request(Operation::Create, "db1", 5, 10)).await.unwrap();
        let exists = backend.exists(&route).await.unwrap();
        assert_eq!(WriteMode::from_exists(exists), WriteMode::Update);
        assert!(!backend.exists(&Route::Config).await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_full_flow() {
        let (backend, _storage) = placeholder_backend();
        backend.handle(config_request()).await.unwrap();
        backend.handle(role_request(Operation::Create, "db1", 5, 10)).await.unwrap();

        let read = backend
            .handle(Request::new(Operation::Read, Route::Role("db1".to_string())))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.data.len(), 1);
        assert_eq!(read.data["name"], "db1");

        let list = backend.handle(Request::new(Operation::List, Route::RoleList)).await.unwrap();
        assert_eq!(list.unwrap().data["keys"], serde_json::json!(["db1"]));

        let creds = backend
            .handle(Request::new(Operation::Read, Route::Creds("db1".to_string())))
            .await
            .unwrap()
            .unwrap();
        let lease = creds.secret.unwrap();
        assert_eq!(lease.ttl, Duration::from_secs(5));
        assert_eq!(lease.max_ttl, Duration::from_secs(10));

        let config = backend.handle(Request::new(Operation::Read, Route::Config)).await.unwrap();
        assert!(!config.unwrap().data.contains_key("password"));
    }

    #[tokio::test]
    async fn test_read_missing_returns_none() {
        let (backend, _storage) = placeholder_backend();
        let role = backend.handle(Request::new(Operation::Read, Route::Role("x".to_string())));
        assert!(role.await.unwrap().is_none());
        let config = backend.handle(Request::new(Operation::Read, Route::Config));
        assert!(config.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_combinations() {
        let (backend, _storage) = placeholder_backend();
        for request in [
            Request::new(Operation::List, Route::Config),
            Request::new(Operation::Delete, Route::Creds("db1".to_string())),
            Request::new(Operation::Read, Route::RoleList),
        ] {
            let err = backend.handle(request).await.unwrap_err();
            assert!(matches!(err, Error::InvalidArgument { .. }));
        }
    }

    #[tokio::test]
    async fn test_mismatched_body_rejected() {
        let (backend, storage) = placeholder_backend();
        let request = Request::new(Operation::Create, Route::Config)
            .with_body(RequestBody::Role(RoleWriteRequest::default()));
        assert!(backend.handle(request).await.is_err());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_generate_password_uses_settings_length() {
        let (backend, _storage) = placeholder_backend();
        let backend = backend.with_password_generator(PasswordGenerator::new(48));
        assert_eq!(backend.generate_password().await.unwrap().len(), 48);
    }

    #[tokio::test]
    async fn test_generate_password_with_unserved_policy() {
        let (backend, _storage) = placeholder_backend();
        let body = ConfigWriteRequest {
            password_policy: Some("strict".to_string()),
            ..Default::default()
        };
        let request =
            Request::new(Operation::Create, Route::Config).with_body(RequestBody::Config(body));
        backend.handle(request).await.unwrap();

        let err = backend.generate_password().await.unwrap_err();
        assert!(matches!(err, Error::FailedPrecondition { .. }));
    }

    #[test]
    fn test_from_settings_builds() {
        let storage = Arc::new(crate::storage::InMemoryStorage::new());
        let backend = Backend::from_settings(storage, &AppConfig::default());
        assert_eq!(backend.client_cache().constructions(), 0);
    }
}

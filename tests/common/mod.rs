//! Common test utilities for all integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dyncred::backend::{
    Backend, BackendConfig, ClientFactory, ConfigWriteRequest, Operation, PlaceholderClient,
    Request, RequestBody, RoleWriteRequest, Route, UpstreamClient, WriteMode,
};
use dyncred::secrets::SecretString;
use dyncred::storage::InMemoryStorage;
use dyncred::Result;

/// Placeholder factory that counts how often it is asked to build.
#[derive(Debug, Default)]
pub struct CountingFactory {
    builds: AtomicUsize,
    delay: Duration,
}

impl CountingFactory {
    /// Factory whose builds take `delay`, widening race windows.
    pub fn slow(delay: Duration) -> Self {
        Self { builds: AtomicUsize::new(0), delay }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ClientFactory for CountingFactory {
    fn build(&self, _config: &BackendConfig) -> Result<Arc<dyn UpstreamClient>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(Arc::new(PlaceholderClient))
    }
}

pub fn backend_with(factory: Arc<dyn ClientFactory>) -> (Backend, InMemoryStorage) {
    let storage = InMemoryStorage::new();
    (Backend::new(Arc::new(storage.clone()), factory), storage)
}

pub fn config_body(username: &str, password: &str, url: &str) -> RequestBody {
    RequestBody::Config(ConfigWriteRequest {
        username: Some(username.to_string()),
        password: Some(SecretString::new(password)),
        url: Some(url.to_string()),
        password_policy: None,
    })
}

/// Config body naming a password policy.
pub fn config_body_with_policy(url: &str, policy: &str) -> RequestBody {
    RequestBody::Config(ConfigWriteRequest {
        username: Some("svc".to_string()),
        password: Some(SecretString::new("p")),
        url: Some(url.to_string()),
        password_policy: Some(policy.to_string()),
    })
}

pub fn role_body(host: &str, ttl: Option<u64>, max_ttl: Option<u64>) -> RequestBody {
    RequestBody::Role(RoleWriteRequest {
        host: Some(host.to_string()),
        ttl: ttl.map(Duration::from_secs),
        max_ttl: max_ttl.map(Duration::from_secs),
    })
}

/// Write through `handle`, choosing create or update the way a host router does.
pub async fn write(backend: &Backend, path: &str, body: RequestBody) -> Result<()> {
    let route = Route::parse(path)?;
    let mode = WriteMode::from_exists(backend.exists(&route).await?);
    backend.handle(Request::new(Operation::from(mode), route).with_body(body)).await?;
    Ok(())
}

pub async fn configure(backend: &Backend) {
    write(backend, "config", config_body("svc", "p", "https://api.example"))
        .await
        .expect("config write");
}

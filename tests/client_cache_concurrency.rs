//! Concurrency tests for the cached upstream client

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{backend_with, configure, CountingFactory};
use dyncred::backend::{Backend, UpstreamClient, CONFIG_STORAGE_PATH};
use dyncred::Error;

const CALLERS: usize = 16;

type ClientResult = dyncred::Result<Arc<dyn UpstreamClient>>;

async fn concurrent_get_client(backend: Arc<Backend>) -> Vec<ClientResult> {
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { backend.get_client().await })
        })
        .collect();

    let mut results = Vec::with_capacity(CALLERS);
    for handle in handles {
        results.push(handle.await.expect("task panicked"));
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_client() {
    let factory = Arc::new(CountingFactory::slow(Duration::from_millis(20)));
    let (backend, _storage) = backend_with(factory.clone());
    configure(&backend).await;
    let backend = Arc::new(backend);

    let clients: Vec<_> = concurrent_get_client(Arc::clone(&backend))
        .await
        .into_iter()
        .map(|r| r.expect("client"))
        .collect();

    assert_eq!(factory.builds(), 1);
    assert_eq!(backend.client_cache().constructions(), 1);
    for client in &clients[1..] {
        assert!(Arc::ptr_eq(&clients[0], client));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_against_unconfigured_cache() {
    let factory = Arc::new(CountingFactory::default());
    let (backend, _storage) = backend_with(factory.clone());
    let backend = Arc::new(backend);

    for result in concurrent_get_client(Arc::clone(&backend)).await {
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }
    assert_eq!(factory.builds(), 0);
    assert!(!backend.client_cache().is_cached().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resets_interleaved_with_readers() {
    let factory = Arc::new(CountingFactory::default());
    let (backend, _storage) = backend_with(factory.clone());
    configure(&backend).await;
    let backend = Arc::new(backend);

    let mut handles = Vec::new();
    for i in 0..CALLERS {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            if i % 4 == 0 {
                backend.invalidate(CONFIG_STORAGE_PATH).await;
                None
            } else {
                Some(backend.get_client().await.map(|_| ()))
            }
        }));
    }

    for handle in handles {
        if let Some(result) = handle.await.expect("task panicked") {
            assert!(result.is_ok());
        }
    }

    // Every build is counted and at most one client is cached afterwards.
    assert_eq!(backend.client_cache().constructions() as usize, factory.builds());
    backend.reset().await;
    backend.reset().await;
    assert!(!backend.client_cache().is_cached().await);
}

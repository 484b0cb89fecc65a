//! # dyncred
//!
//! A dynamic-credential backend. Given a configured upstream system and a set
//! of named roles, it issues short-lived username/password pairs on demand and
//! renews or revokes them through lease callbacks driven by a host.
//!
//! ## Architecture
//!
//! ```text
//! host request -> Route/Operation -> Backend
//!                                     |- config store  -> Storage
//!                                     |- role store    -> Storage
//!                                     |- issuer        -> ClientCache -> UpstreamClient
//!                                     '- lease handler -> role store / ClientCache
//! ```
//!
//! The host owns persistence, routing and lease expiry. The backend keeps a
//! single cached upstream client per instance, rebuilt whenever the stored
//! configuration changes.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dyncred::backend::{Backend, Operation, Request, Route, PlaceholderClientFactory};
//! use dyncred::storage::InMemoryStorage;
//!
//! # async fn run() -> dyncred::Result<()> {
//! let storage = Arc::new(InMemoryStorage::new());
//! let backend = Backend::new(storage, Arc::new(PlaceholderClientFactory));
//! let roles = backend.handle(Request::new(Operation::List, Route::RoleList)).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod storage;
pub mod utils;

// Re-export commonly used types and traits
pub use backend::Backend;
pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

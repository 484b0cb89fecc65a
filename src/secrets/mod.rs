//! Handling of credential material.
//!
//! Passwords never appear in logs or in default serialization; see [`SecretString`].

pub mod types;

pub use types::{exposed, SecretString};

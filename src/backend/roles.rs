//! Role entries stored under `host/<name>`.
//!
//! A role names the endpoint credentials are issued for and the lease TTLs to
//! request. A zero TTL or MaxTTL means "use the host's default".

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::info;

use super::paths::{WriteMode, ROLE_PATH_PREFIX};
use super::Backend;
use crate::errors::{Error, Result};
use crate::secrets::{exposed, SecretString};
use crate::storage::StorageEntry;
use crate::utils::duration_nanos;

/// Persisted role definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub name: String,
    pub host: String,
    /// Static username bound to the role. No write path sets it today.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Static password bound to the role. No write path sets it today.
    #[serde(default, with = "exposed", skip_serializing_if = "SecretString::is_empty")]
    pub password: SecretString,
    #[serde(with = "duration_nanos")]
    pub ttl: Duration,
    #[serde(with = "duration_nanos")]
    pub max_ttl: Duration,
}

impl RoleEntry {
    /// Caller-visible fields: the name, plus the username when one is bound.
    pub fn to_response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("name".to_string(), json!(self.name));
        if !self.username.is_empty() {
            data.insert("username".to_string(), json!(self.username));
        }
        data
    }

    /// `max_ttl` of zero is unbounded; otherwise `ttl` may not exceed it.
    pub fn validate_ttls(&self) -> Result<()> {
        if !self.max_ttl.is_zero() && self.ttl > self.max_ttl {
            return Err(Error::invalid_argument("ttl cannot be greater than max_ttl"));
        }
        Ok(())
    }
}

/// Fields supplied on a role write.
///
/// `None` means "not supplied": creation applies the default, an update keeps
/// the stored value.
#[derive(Debug, Clone, Default)]
pub struct RoleWriteRequest {
    pub host: Option<String>,
    pub ttl: Option<Duration>,
    pub max_ttl: Option<Duration>,
}

fn role_storage_key(name: &str) -> String {
    format!("{}{}", ROLE_PATH_PREFIX, name)
}

fn merge_field<T: Default>(slot: &mut T, supplied: Option<T>, mode: WriteMode) {
    match (supplied, mode) {
        (Some(value), _) => *slot = value,
        (None, WriteMode::Create) => *slot = T::default(),
        (None, WriteMode::Update) => {}
    }
}

impl Backend {
    /// Fetch a role by name, `None` if it does not exist.
    pub async fn get_role(&self, name: &str) -> Result<Option<RoleEntry>> {
        if name.is_empty() {
            return Err(Error::invalid_argument("missing role name"));
        }

        let Some(entry) = self.storage.get(&role_storage_key(name)).await? else {
            return Ok(None);
        };
        entry.decode_json().map(Some)
    }

    /// Whether a role record exists, used to pick create vs update.
    pub async fn role_exists(&self, name: &str) -> Result<bool> {
        Ok(self.storage.get(&role_storage_key(name)).await?.is_some())
    }

    /// Create or update a role.
    ///
    /// TTLs are validated after merging and before anything is persisted, so a
    /// rejected write leaves the stored role untouched.
    pub async fn write_role(
        &self,
        name: &str,
        mode: WriteMode,
        request: RoleWriteRequest,
    ) -> Result<RoleEntry> {
        let mut role = self.get_role(name).await?.unwrap_or_default();
        role.name = name.to_string();

        merge_field(&mut role.host, request.host, mode);
        merge_field(&mut role.ttl, request.ttl, mode);
        merge_field(&mut role.max_ttl, request.max_ttl, mode);

        role.validate_ttls()?;

        let entry = StorageEntry::json(role_storage_key(name), &role)?;
        self.storage.put(entry).await?;

        info!(
            role = %role.name,
            host = %role.host,
            ttl_secs = role.ttl.as_secs(),
            max_ttl_secs = role.max_ttl.as_secs(),
            "Stored role"
        );
        Ok(role)
    }

    /// Delete a role. Deleting a missing role is not an error.
    pub async fn delete_role(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_argument("missing role name"));
        }
        self.storage.delete(&role_storage_key(name)).await?;
        info!(role = %name, "Deleted role");
        Ok(())
    }

    /// Role names in storage order.
    pub async fn list_roles(&self) -> Result<Vec<String>> {
        Ok(self.storage.list(ROLE_PATH_PREFIX).await?)
    }
}

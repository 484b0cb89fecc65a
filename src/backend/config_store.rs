//! Stored upstream configuration.
//!
//! A singleton record at [`CONFIG_STORAGE_PATH`] holding how to reach the
//! upstream system. The password is write-only: it is persisted but never
//! returned by a read.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::paths::WriteMode;
use super::Backend;
use crate::errors::{Error, Result};
use crate::secrets::{exposed, SecretString};
use crate::storage::{Storage, StorageEntry};

/// Storage key of the configuration record
pub const CONFIG_STORAGE_PATH: &str = "config";

/// Persisted upstream configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default, with = "exposed")]
    pub password: SecretString,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_policy: String,
}

impl BackendConfig {
    /// Caller-visible fields. The password is never included.
    pub fn to_response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("username".to_string(), json!(self.username));
        data.insert("url".to_string(), json!(self.url));
        data.insert("password_policy".to_string(), json!(self.password_policy));
        data
    }

    fn apply(&mut self, request: ConfigWriteRequest) {
        if let Some(username) = request.username {
            self.username = username;
        }
        if let Some(url) = request.url {
            self.url = url;
        }
        if let Some(policy) = request.password_policy {
            self.password_policy = policy;
        }
        if let Some(password) = request.password {
            self.password = password;
        }
    }
}

/// Fields supplied on a configuration write. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigWriteRequest {
    pub username: Option<String>,
    pub url: Option<String>,
    pub password_policy: Option<String>,
    pub password: Option<SecretString>,
}

/// Load the configuration record, `None` when nothing is configured.
pub async fn get_config(storage: &dyn Storage) -> Result<Option<BackendConfig>> {
    let Some(entry) = storage.get(CONFIG_STORAGE_PATH).await? else {
        return Ok(None);
    };
    let config = entry.decode_json::<BackendConfig>().map_err(|e| match e {
        Error::Serialization { source, .. } => {
            Error::serialization("error reading root configuration", source)
        }
        other => other,
    })?;
    Ok(Some(config))
}

impl Backend {
    /// Read the stored configuration.
    pub async fn read_config(&self) -> Result<Option<BackendConfig>> {
        get_config(self.storage.as_ref()).await
    }

    /// Whether a configuration record exists, used to pick create vs update.
    pub async fn config_exists(&self) -> Result<bool> {
        Ok(self.storage.get(CONFIG_STORAGE_PATH).await?.is_some())
    }

    /// Merge the supplied fields into the stored configuration and persist it.
    ///
    /// An update against a missing record fails with [`Error::NotFound`]. On
    /// success the cached upstream client is discarded.
    pub async fn write_config(
        &self,
        mode: WriteMode,
        request: ConfigWriteRequest,
    ) -> Result<BackendConfig> {
        let mut config = match self.read_config().await? {
            Some(existing) => existing,
            None if mode == WriteMode::Update => {
                return Err(Error::not_found("config not found during update operation"));
            }
            None => BackendConfig::default(),
        };

        config.apply(request);

        let entry = StorageEntry::json(CONFIG_STORAGE_PATH, &config)?;
        self.storage.put(entry).await?;

        self.reset().await;
        info!(url = %config.url, username = %config.username, "Stored backend configuration");
        Ok(config)
    }

    /// Remove the configuration. Deleting a missing record is not an error.
    pub async fn delete_config(&self) -> Result<()> {
        self.storage.delete(CONFIG_STORAGE_PATH).await?;
        self.reset().await;
        info!("Deleted backend configuration");
        Ok(())
    }
}

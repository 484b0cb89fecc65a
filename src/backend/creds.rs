//! Credential issuance for `creds/<name>`.

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::client::CredentialRequest;
use super::lease::{Lease, CRED_LEASE_KIND, ROLE_KEY, USERNAME_KEY};
use super::paths::Response;
use super::roles::RoleEntry;
use super::Backend;
use crate::errors::{Error, Result};

impl Backend {
    /// Resolve the role, then issue credentials against it.
    pub async fn read_credentials(&self, name: &str) -> Result<Response> {
        let role = self
            .get_role(name)
            .await?
            .ok_or_else(|| Error::not_found("error retrieving role: role is nil"))?;

        self.issue_for(&role).await
    }

    /// Issue a credential pair scoped to `role`.
    ///
    /// The caller sees the username and password. The lease keeps the role
    /// name and username in its internal data for later renew and revoke, and
    /// carries the role's TTLs when they are set.
    pub async fn issue_for(&self, role: &RoleEntry) -> Result<Response> {
        let client = self.get_client().await?;

        let request = CredentialRequest { role: role.name.clone(), host: role.host.clone() };
        let credentials = client
            .issue_credentials(&request)
            .await
            .map_err(|e| Error::upstream("error getting credentials", e))?;

        let mut data = Map::new();
        data.insert("username".to_string(), json!(credentials.username));
        data.insert("password".to_string(), json!(credentials.password.expose_secret()));

        let mut internal = Map::new();
        internal.insert(ROLE_KEY.to_string(), Value::String(role.name.clone()));
        internal.insert(USERNAME_KEY.to_string(), Value::String(credentials.username.clone()));

        let mut lease = Lease::new(CRED_LEASE_KIND, internal);
        if !role.ttl.is_zero() {
            lease.ttl = role.ttl;
        }
        if !role.max_ttl.is_zero() {
            lease.max_ttl = role.max_ttl;
        }

        debug!(role = %role.name, host = %role.host, lease_id = %lease.id, "Generated lease");
        info!(
            role = %role.name,
            username = %credentials.username,
            ttl_secs = lease.ttl.as_secs(),
            max_ttl_secs = lease.max_ttl.as_secs(),
            "Issued credentials"
        );

        Ok(Response { data, secret: Some(lease) })
    }
}

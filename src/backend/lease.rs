//! Lease renew and revoke.
//!
//! A lease is created at issuance and carries private data the caller never
//! sees: the role it was issued against and the upstream username. The host
//! hands the same lease back on renew and revoke, which is all the context
//! either callback gets.
//!
//! ```text
//! Issued -> (Renewed)* -> Revoked | Expired (host)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{info, Instrument};

use super::Backend;
use crate::errors::{Error, Result};
use crate::utils::{duration_nanos, generate_id};

/// Kind tag for leases produced by credential issuance
pub const CRED_LEASE_KIND: &str = "cred_object";

/// Internal-data key holding the role name
pub const ROLE_KEY: &str = "role";
/// Internal-data key holding the issued username
pub const USERNAME_KEY: &str = "username";

/// An issued lease as the host tracks it.
///
/// A zero `ttl` or `max_ttl` leaves the choice to the host's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: String,
    pub kind: String,
    pub issued_at: DateTime<Utc>,
    #[serde(with = "duration_nanos")]
    pub ttl: Duration,
    #[serde(with = "duration_nanos")]
    pub max_ttl: Duration,
    #[serde(default)]
    pub internal_data: Map<String, Value>,
}

impl Lease {
    pub fn new(kind: impl Into<String>, internal_data: Map<String, Value>) -> Self {
        Self {
            id: generate_id(),
            kind: kind.into(),
            issued_at: Utc::now(),
            ttl: Duration::ZERO,
            max_ttl: Duration::ZERO,
            internal_data,
        }
    }

    /// Read a string field from the internal data.
    ///
    /// `Ok(None)` when the key is absent; a non-string value is an invalid argument.
    pub fn internal_str(&self, key: &str) -> Result<Option<&str>> {
        match self.internal_data.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(_) => Err(Error::invalid_argument(format!(
                "secret {} internal data is not a string",
                key
            ))),
        }
    }
}

/// Lease callback requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseAction {
    Renew,
    Revoke,
}

impl LeaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseAction::Renew => "renew",
            LeaseAction::Revoke => "revoke",
        }
    }
}

impl fmt::Display for LeaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Backend {
    /// Dispatch a lease callback after checking the kind tag.
    ///
    /// Renew returns the updated lease, revoke returns `None`.
    pub async fn handle_lease(&self, action: LeaseAction, lease: Lease) -> Result<Option<Lease>> {
        if lease.kind != CRED_LEASE_KIND {
            return Err(Error::invalid_argument(format!("unknown lease kind '{}'", lease.kind)));
        }

        let span = crate::lease_span!(action, lease.id);
        async move {
            match action {
                LeaseAction::Renew => self.renew(lease).await.map(Some),
                LeaseAction::Revoke => self.revoke(&lease).await.map(|_| None),
            }
        }
        .instrument(span)
        .await
    }

    /// Reapply the current role's TTLs to an existing lease.
    ///
    /// Values come from the role as stored now, not as it was at issuance.
    /// Credentials are untouched.
    pub async fn renew(&self, mut lease: Lease) -> Result<Lease> {
        let role_name = lease
            .internal_str(ROLE_KEY)?
            .ok_or_else(|| Error::failed_precondition("secret is missing role internal data"))?
            .to_string();

        let role = self
            .get_role(&role_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("role '{}' not found", role_name)))?;

        if !role.ttl.is_zero() {
            lease.ttl = role.ttl;
        }
        if !role.max_ttl.is_zero() {
            lease.max_ttl = role.max_ttl;
        }

        info!(
            lease_id = %lease.id,
            role = %role_name,
            ttl_secs = lease.ttl.as_secs(),
            max_ttl_secs = lease.max_ttl.as_secs(),
            "Renewed lease"
        );
        Ok(lease)
    }

    /// Revoke the username bound to a lease.
    ///
    /// A lease without a username still reaches the upstream, with an empty name.
    pub async fn revoke(&self, lease: &Lease) -> Result<()> {
        let client =
            self.get_client().await.map_err(|e| Error::upstream("error getting client", e))?;

        let username = lease.internal_str(USERNAME_KEY)?.unwrap_or_default();

        client
            .revoke_credentials(username)
            .await
            .map_err(|e| Error::upstream("error revoking username", e))?;

        info!(lease_id = %lease.id, username = %username, "Revoked lease");
        Ok(())
    }
}

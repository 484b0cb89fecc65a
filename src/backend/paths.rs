//! Request surface: routes, operations and typed request bodies.
//!
//! | Path          | Operations                    |
//! |---------------|-------------------------------|
//! | `config`      | create, update, read, delete  |
//! | `host/<name>` | create, update, read, delete  |
//! | `host/`       | list                          |
//! | `creds/<name>`| read, update                  |
//!
//! The host decodes fields before calling in; nothing here sees untyped input.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use super::config_store::ConfigWriteRequest;
use super::lease::Lease;
use super::roles::RoleWriteRequest;
use crate::errors::{Error, Result};
use crate::utils::is_valid_name;

pub const CONFIG_PATH: &str = "config";
pub const ROLE_PATH_PREFIX: &str = "host/";
pub const CREDS_PATH_PREFIX: &str = "creds/";

/// Operation requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    /// Write semantics for create/update, `None` for everything else.
    pub fn write_mode(self) -> Option<WriteMode> {
        match self {
            Operation::Create => Some(WriteMode::Create),
            Operation::Update => Some(WriteMode::Update),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a write creates a record or updates an existing one.
///
/// Creation applies schema defaults to omitted fields; updates leave them untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

impl WriteMode {
    /// Pick the mode from an existence check result
    pub fn from_exists(exists: bool) -> Self {
        if exists {
            WriteMode::Update
        } else {
            WriteMode::Create
        }
    }
}

impl From<WriteMode> for Operation {
    fn from(mode: WriteMode) -> Self {
        match mode {
            WriteMode::Create => Operation::Create,
            WriteMode::Update => Operation::Update,
        }
    }
}

/// A resolved request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Config,
    Role(String),
    RoleList,
    Creds(String),
}

impl Route {
    /// Resolve a request path. Role names are lowercased.
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.trim_start_matches('/');

        if path == CONFIG_PATH {
            return Ok(Route::Config);
        }
        if path == ROLE_PATH_PREFIX || path == ROLE_PATH_PREFIX.trim_end_matches('/') {
            return Ok(Route::RoleList);
        }
        if let Some(name) = path.strip_prefix(ROLE_PATH_PREFIX) {
            return Ok(Route::Role(Self::name(name, path)?));
        }
        if let Some(name) = path.strip_prefix(CREDS_PATH_PREFIX) {
            return Ok(Route::Creds(Self::name(name, path)?));
        }

        Err(Error::invalid_argument(format!("unsupported path '{}'", path)))
    }

    fn name(raw: &str, path: &str) -> Result<String> {
        if !is_valid_name(raw) {
            return Err(Error::invalid_argument(format!("invalid name in path '{}'", path)));
        }
        Ok(raw.to_lowercase())
    }
}

/// Help text a host shows for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteHelp {
    pub synopsis: &'static str,
    pub description: &'static str,
}

impl Route {
    pub fn help(&self) -> RouteHelp {
        match self {
            Route::Config => RouteHelp {
                synopsis: "Configure how the backend reaches the upstream system.",
                description: "Stores the username, password and URL used to reach the upstream, \
                              plus an optional password policy name. The password is never \
                              returned on read. Any change discards the cached upstream client.",
            },
            Route::Role(_) => RouteHelp {
                synopsis: "Manage a role used to issue credentials.",
                description: "A role names the host credentials are scoped to and the lease \
                              TTL and max TTL to request. The TTL may not exceed the max TTL.",
            },
            Route::RoleList => RouteHelp {
                synopsis: "List the configured roles.",
                description: "Role names are returned under `keys`, in storage order.",
            },
            Route::Creds(_) => RouteHelp {
                synopsis: "Issue credentials for a role.",
                description: "Returns a username and password from the upstream, bound to a \
                              lease that carries the role's TTLs. Renewing the lease reapplies \
                              the role's current TTLs and revoking it removes the username.",
            },
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Config => f.write_str(CONFIG_PATH),
            Route::Role(name) => write!(f, "{}{}", ROLE_PATH_PREFIX, name),
            Route::RoleList => f.write_str(ROLE_PATH_PREFIX),
            Route::Creds(name) => write!(f, "{}{}", CREDS_PATH_PREFIX, name),
        }
    }
}

/// Decoded request fields
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Config(ConfigWriteRequest),
    Role(RoleWriteRequest),
}

/// A request routed to the backend
#[derive(Debug, Clone)]
pub struct Request {
    pub operation: Operation,
    pub route: Route,
    pub body: RequestBody,
}

impl Request {
    pub fn new(operation: Operation, route: Route) -> Self {
        Self { operation, route, body: RequestBody::Empty }
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

/// Backend reply: caller-visible data plus an optional lease.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<Lease>,
}

impl Response {
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self { data, secret: None }
    }

    /// Listing response in the `{"keys": [...]}` shape
    pub fn list(keys: Vec<String>) -> Self {
        let mut data = Map::new();
        data.insert("keys".to_string(), json!(keys));
        Self::with_data(data)
    }
}

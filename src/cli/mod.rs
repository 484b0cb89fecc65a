//! # Command Line Interface
//!
//! Operator tooling that drives a [`Backend`] over a [`FileStorage`] document.
//! Writes pick create or update from an existence check, the same way a host
//! router would.

pub mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    Backend, ConfigWriteRequest, Lease, LeaseAction, Operation, PasswordPolicySource, Request,
    RequestBody, RoleWriteRequest, Route, WriteMode,
};
use crate::config::AppConfig;
use crate::secrets::SecretString;
use crate::storage::FileStorage;
use output::{print_json, print_status};

#[derive(Parser, Debug)]
#[command(name = "dyncred")]
#[command(about = "Dynamic credential backend tooling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Storage document holding configuration and roles
    #[arg(long, global = true, env = "DYNCRED_STORAGE_PATH", default_value = "dyncred.json")]
    pub storage: PathBuf,

    /// Settings file overlaid with DYNCRED_* environment variables
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upstream connection configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Role management
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Issue credentials for a role
    Creds {
        /// Role name
        name: String,

        /// Also write the lease to this file for later renew/revoke
        #[arg(long)]
        lease_out: Option<PathBuf>,
    },

    /// Lease callbacks
    Lease {
        #[command(subcommand)]
        command: LeaseCommands,
    },

    /// Show what a backend path does
    Describe {
        /// Path such as `config`, `host/<name>` or `creds/<name>`
        path: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Create or update the configuration
    Write(ConfigWriteArgs),
    /// Show the configuration (never the password)
    Read,
    /// Remove the configuration
    Delete,
}

#[derive(Args, Debug, Default)]
pub struct ConfigWriteArgs {
    #[arg(long)]
    pub username: Option<String>,

    #[arg(long, env = "DYNCRED_UPSTREAM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub password_policy: Option<String>,
}

impl From<ConfigWriteArgs> for ConfigWriteRequest {
    fn from(args: ConfigWriteArgs) -> Self {
        Self {
            username: args.username,
            url: args.url,
            password_policy: args.password_policy,
            password: args.password.map(SecretString::from),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum RoleCommands {
    /// Create or update a role
    Write(RoleWriteArgs),
    /// Show a role
    Read { name: String },
    /// Remove a role
    Delete { name: String },
    /// List role names
    List,
}

#[derive(Args, Debug)]
pub struct RoleWriteArgs {
    /// Role name
    pub name: String,

    /// Endpoint the role grants access to
    #[arg(long)]
    pub host: Option<String>,

    /// Requested lease TTL in seconds (0 = host default)
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Requested lease max TTL in seconds (0 = host default)
    #[arg(long)]
    pub max_ttl: Option<u64>,
}

impl From<&RoleWriteArgs> for RoleWriteRequest {
    fn from(args: &RoleWriteArgs) -> Self {
        Self {
            host: args.host.clone(),
            ttl: args.ttl.map(Duration::from_secs),
            max_ttl: args.max_ttl.map(Duration::from_secs),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum LeaseCommands {
    /// Reapply the role's current TTLs to a lease
    Renew { lease: PathBuf },
    /// Revoke the credentials bound to a lease
    Revoke { lease: PathBuf },
}

/// Run a parsed command line against settings already loaded.
pub async fn run_cli(cli: Cli, config: &AppConfig) -> Result<()> {
    run_cli_with_policies(cli, config, None).await
}

/// Like [`run_cli`], with a host generator for named password policies.
pub async fn run_cli_with_policies(
    cli: Cli,
    config: &AppConfig,
    policies: Option<Arc<dyn PasswordPolicySource>>,
) -> Result<()> {
    let storage = Arc::new(FileStorage::new(&cli.storage));
    let backend = Backend::from_settings_with_policies(storage, config, policies);

    match cli.command {
        Commands::Config { command } => handle_config_command(&backend, command).await,
        Commands::Role { command } => handle_role_command(&backend, command).await,
        Commands::Creds { name, lease_out } => {
            handle_creds_command(&backend, &name, lease_out.as_deref()).await
        }
        Commands::Lease { command } => handle_lease_command(&backend, command).await,
        Commands::Describe { path } => print_json(&Route::parse(&path)?.help()),
    }
}

async fn write_request(backend: &Backend, route: Route, body: RequestBody) -> Result<Request> {
    let mode = WriteMode::from_exists(backend.exists(&route).await?);
    Ok(Request::new(Operation::from(mode), route).with_body(body))
}

async fn print_read(backend: &Backend, route: Route) -> Result<()> {
    let path = route.to_string();
    match backend.handle(Request::new(Operation::Read, route)).await? {
        Some(response) => print_json(&response.data),
        None => anyhow::bail!("nothing stored at '{}'", path),
    }
}

async fn handle_config_command(backend: &Backend, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Write(args) => {
            let body = RequestBody::Config(args.into());
            let request = write_request(backend, Route::Config, body).await?;
            backend.handle(request).await?;
            print_status("config", "written")
        }
        ConfigCommands::Read => print_read(backend, Route::Config).await,
        ConfigCommands::Delete => {
            backend.handle(Request::new(Operation::Delete, Route::Config)).await?;
            print_status("config", "deleted")
        }
    }
}

async fn handle_role_command(backend: &Backend, command: RoleCommands) -> Result<()> {
    match command {
        RoleCommands::Write(args) => {
            let route = role_route(&args.name)?;
            let path = route.to_string();
            let body = RequestBody::Role(RoleWriteRequest::from(&args));
            let request = write_request(backend, route, body).await?;
            backend.handle(request).await?;
            print_status(&path, "written")
        }
        RoleCommands::Read { name } => print_read(backend, role_route(&name)?).await,
        RoleCommands::Delete { name } => {
            let route = role_route(&name)?;
            let path = route.to_string();
            backend.handle(Request::new(Operation::Delete, route)).await?;
            print_status(&path, "deleted")
        }
        RoleCommands::List => {
            let response = backend.handle(Request::new(Operation::List, Route::RoleList)).await?;
            print_json(&response.map(|r| r.data).unwrap_or_default())
        }
    }
}

fn role_route(name: &str) -> Result<Route> {
    Ok(Route::parse(&format!("host/{}", name))?)
}

async fn handle_creds_command(
    backend: &Backend,
    name: &str,
    lease_out: Option<&Path>,
) -> Result<()> {
    let route = Route::parse(&format!("creds/{}", name))?;
    let response = backend
        .handle(Request::new(Operation::Read, route))
        .await?
        .context("credential issuance returned no response")?;

    if let (Some(path), Some(lease)) = (lease_out, response.secret.as_ref()) {
        let json = serde_json::to_string_pretty(lease).context("Failed to serialize lease")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write lease to {}", path.display()))?;
    }

    print_json(&response)
}

async fn read_lease(path: &Path) -> Result<Lease> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read lease from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid lease in {}", path.display()))
}

async fn handle_lease_command(backend: &Backend, command: LeaseCommands) -> Result<()> {
    match command {
        LeaseCommands::Renew { lease } => {
            let current = read_lease(&lease).await?;
            match backend.handle_lease(LeaseAction::Renew, current).await? {
                Some(renewed) => print_json(&renewed),
                None => anyhow::bail!("renew returned no lease"),
            }
        }
        LeaseCommands::Revoke { lease } => {
            let current = read_lease(&lease).await?;
            let id = current.id.clone();
            backend.handle_lease(LeaseAction::Revoke, current).await?;
            print_json(&serde_json::json!({ "lease_id": id, "status": "revoked" }))
        }
    }
}

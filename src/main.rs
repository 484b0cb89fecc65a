use clap::Parser;
use dyncred::cli::{run_cli, Cli};
use dyncred::config::AppConfig;
use dyncred::observability::{init_logging, log_config_info};
use dyncred::{APP_NAME, VERSION};
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists; must happen before settings are read
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.settings.as_deref())?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }

    init_logging(&config.observability)?;
    debug!(app_name = APP_NAME, version = VERSION, storage = %cli.storage.display(), "Starting");
    log_config_info(&config);

    run_cli(cli, &config).await
}

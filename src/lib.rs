mod archive;
pub mod app;
pub mod cli;
pub mod config;
mod error;
pub mod gateway;
pub mod github;
pub mod paths;
pub mod process;
pub mod registry;
pub mod repository;
pub mod route;
pub mod status;
pub mod supervisor;
pub mod sync;

use clap::Parser as _;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::load_config;
pub use error::{AppError, ErrorKind, Result};
use sync::SyncService;

/// Entry point of the `app-sync` binary.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(paths::default_config_path);
    let config = load_config(&config_path)?;
    init_logging(&config.log_level);
    log::info!("Using config {:?}", config_path);

    let service = SyncService::from_config(config)?;
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => service.serve().await,
        Command::Status { id } => {
            let reports = service.report(id.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
        Command::Deploy { id } => {
            let result = service.deploy(&id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
/// Records emitted through the `log` facade are forwarded to it.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        log::debug!("Logging already initialized");
    }
}

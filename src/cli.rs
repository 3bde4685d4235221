use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "app-sync", version, about = "Fetch, run and report apps from GitHub repositories")]
pub struct Cli {
    /// Configuration file (defaults to `<config dir>/app-sync/config.toml`)
    #[arg(long, short, env = "APP_SYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Deploy and run all apps and serve their status (default)
    Serve,
    /// Print local and remote versions as JSON
    Status {
        /// Only this app
        id: Option<String>,
    },
    /// Download and install one app
    Deploy { id: String },
}

//! seqcache CLI - Command-line interface
//!
//! Maintenance tooling for the seqcache disk tier and configuration file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod error;

use commands::config::ConfigCommands;
use commands::disk::DiskAction;
use error::CliError;

#[derive(Parser)]
#[command(name = "seqcache")]
#[command(version = seqcache::VERSION)]
#[command(about = "Inspect and maintain the sequencer frame cache", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.seqcache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Disk cache maintenance
    Disk {
        #[command(subcommand)]
        action: DiskAction,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Disk { action } => {
            let config = commands::common::load_config(config_path)?;
            commands::disk::run(action, &config)
        }
        Commands::Config { command } => commands::config::run(command, config_path),
    }
}

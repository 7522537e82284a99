//! tvsync CLI - keep this device's viewing data in sync from the terminal
//!
//! The terminal plays the role of the UI: it shows the user id, triggers
//! uploads and downloads, and prints the coordinator's notices.

mod cli;
mod commands;
mod error;
mod notifier;


use clap::Parser;
use tvsync_core::sync::SyncDirection;

use crate::cli::{Cli, Commands};
use crate::commands::common::CliContext;
use crate::commands::id::run_id;
use crate::commands::status::{run_force_remote, run_status};
use crate::commands::sync::{run_auto, run_once};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "tvsync=info"
        .parse()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = CliContext::open(cli.data_file, cli.endpoint)?;

    match cli.command {
        Commands::Id { command } => {
            let id = run_id(context.coordinator.identity(), command)?;
            println!("{id}");
        }
        Commands::Upload => {
            run_once(&context.coordinator, SyncDirection::Upload, cli.silent).await?;
        }
        Commands::Download => {
            run_once(&context.coordinator, SyncDirection::Download, cli.silent).await?;
        }
        Commands::Auto => run_auto(context.coordinator).await?,
        Commands::Status { json } => run_status(&context, json)?,
        Commands::ForceRemote { state } => {
            run_force_remote(&context.coordinator, state.enabled())?;
        }
    }

    Ok(())
}

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tvsync")]
#[command(about = "Sync viewing history and preferences with a tvsync store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the device data file
    #[arg(long, global = true, value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// Remote store base URL (overrides TVSYNC_ENDPOINT)
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Suppress notifications; results are still reported
    #[arg(long, global = true)]
    pub silent: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or change the 6-digit user id
    Id {
        #[command(subcommand)]
        command: Option<IdCommands>,
    },
    /// Upload local data to the remote store
    #[command(alias = "push")]
    Upload,
    /// Replace local data with the remote copy
    #[command(alias = "pull")]
    Download,
    /// Keep syncing in the background until interrupted
    Auto,
    /// Show sync status for this device
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Force remote sync on or off regardless of the endpoint host
    ForceRemote {
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(Subcommand)]
pub enum IdCommands {
    /// Print the current id, generating one if needed
    Show,
    /// Use an existing id, e.g. one shown on another device
    Set {
        /// Six digits
        id: String,
    },
    /// Replace the id with a new random one
    Reset,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub const fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tvsync_core::{
    FileStore, RemoteStoreClient, SharedStore, SyncConfig, SyncCoordinator, SyncEvent,
};

use crate::error::CliError;
use crate::notifier::ConsoleNotifier;

const DATA_FILE_NAME: &str = "device.json";

/// Everything a command needs: the device store and a coordinator over it.
pub struct CliContext {
    pub coordinator: SyncCoordinator<RemoteStoreClient>,
    pub data_file: PathBuf,
}

impl CliContext {
    pub fn open(data_file: Option<PathBuf>, endpoint: Option<String>) -> Result<Self, CliError> {
        let data_file = resolve_data_file(data_file)?;
        let config = load_config(endpoint)?;
        let store: SharedStore = Arc::new(FileStore::open(&data_file)?);
        Self::new(config, store, data_file)
    }

    pub fn new(config: SyncConfig, store: SharedStore, data_file: PathBuf) -> Result<Self, CliError> {
        let client = RemoteStoreClient::new(&config)?;
        let coordinator = SyncCoordinator::builder(config, client, store)
            .notifier(Arc::new(ConsoleNotifier))
            .build();
        Ok(Self {
            coordinator,
            data_file,
        })
    }
}

pub fn default_data_file() -> Result<PathBuf, CliError> {
    let base = dirs::data_dir().ok_or_else(|| {
        CliError::Config("could not resolve a data directory; pass --data-file".to_string())
    })?;
    Ok(base.join("tvsync").join(DATA_FILE_NAME))
}

pub fn resolve_data_file(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path),
        None => default_data_file(),
    }
}

pub fn load_config(endpoint: Option<String>) -> Result<SyncConfig, CliError> {
    let config = SyncConfig::from_env()?;
    match tvsync_core::util::normalize_text_option(endpoint) {
        Some(endpoint) => Ok(config.with_endpoint(endpoint)?),
        None => Ok(config),
    }
}

/// Drain events until the coordinator releases its lock.
pub async fn wait_for_idle(
    events: &mut broadcast::Receiver<SyncEvent>,
) -> Result<Vec<SyncEvent>, CliError> {
    let mut seen = Vec::new();
    loop {
        match events.recv().await {
            Ok(SyncEvent::Idle) => {
                seen.push(SyncEvent::Idle);
                return Ok(seen);
            }
            Ok(event) => seen.push(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Missed sync events");
            }
            Err(RecvError::Closed) => {
                return Err(CliError::Interrupted(
                    "coordinator stopped before finishing".to_string(),
                ))
            }
        }
    }
}

pub fn format_sync_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || format!("{millis} (invalid timestamp)"),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

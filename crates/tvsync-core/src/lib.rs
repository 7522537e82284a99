//! tvsync-core - Core library for tvsync
//!
//! Keeps a device's viewing history and preferences in sync with a
//! single-key remote store addressed by a 6-digit user id. Contains the
//! payload model, device-local storage, the remote store client and the
//! sync coordinator shared by the CLI and the API server.

pub mod cache;
pub mod config;
pub mod device_state;
pub mod error;
pub mod identity;
pub mod payload;
pub mod storage;
pub mod sync;
pub mod util;

pub use cache::LocalCache;
pub use config::SyncConfig;
pub use device_state::DeviceState;
pub use error::{Error, Result};
pub use identity::{is_valid_user_id, Identity, UserId};
pub use payload::SyncPayload;
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use sync::{
    AutoSync, Envelope, FailureKind, NoticeLevel, Notifier, RemoteStore, RemoteStoreClient,
    SyncCoordinator, SyncEvent, SyncOrigin, SyncOutcome, Visibility,
};

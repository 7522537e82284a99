//! tvsync-api - remote store endpoint for tvsync
//!
//! Serves the `/user-sync` resource: one JSON document per 6-digit user id,
//! overwritten on every upload, on top of a pluggable key/value backend.

pub mod config;
pub mod error;
pub mod routes;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::AppError;
pub use routes::{app_router, AppState};
pub use store::{FileKvStore, KvStore, MemoryKvStore, StoreError};

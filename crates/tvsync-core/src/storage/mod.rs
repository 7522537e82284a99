//! Device-local key/value storage.
//!
//! The store is string-keyed and string-valued, the same shape as browser
//! local storage. Everything the device persists goes through it: the
//! identifier, the individual preference keys and the sync fallback copy.

mod file;
mod memory;

use std::sync::Arc;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::Result;

/// Synchronous key/value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Store handle shared between the cache, device state and identity.
pub type SharedStore = Arc<dyn KeyValueStore>;

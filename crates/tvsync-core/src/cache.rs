//! Local fallback copy of the synchronized document.

use crate::identity::UserId;
use crate::payload::SyncPayload;
use crate::storage::SharedStore;
use crate::{Error, Result};

/// Keeps the last payload that could not reach the remote store.
///
/// The entry lives under `<prefix>_<userId>`, disjoint from the identifier
/// slot, and is overwritten on every write. It never expires.
#[derive(Clone)]
pub struct LocalCache {
    store: SharedStore,
    prefix: String,
}

impl LocalCache {
    pub fn new(store: SharedStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn fallback_key(&self, id: &UserId) -> String {
        format!("{}_{}", self.prefix, id)
    }

    pub fn read_fallback(&self, id: &UserId) -> Result<Option<SyncPayload>> {
        let key = self.fallback_key(id);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|error| Error::Storage(format!("fallback entry {key} is corrupt: {error}")))?;
        Ok(Some(SyncPayload::from_value(value)))
    }

    pub fn write_fallback(&self, id: &UserId, payload: &SyncPayload) -> Result<()> {
        let serialized = serde_json::to_string(payload)?;
        self.store.set(&self.fallback_key(id), &serialized)
    }
}

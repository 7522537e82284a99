//! Application state as persisted on the device, one key per preference.
//!
//! Lists are stored as JSON text and flags as `"true"`/`"false"`, the layout a
//! browser front-end keeps in local storage. `snapshot` gathers them into a
//! [`SyncPayload`]; `apply` writes a received payload back over them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::parse_flag;
use crate::payload::SyncPayload;
use crate::storage::SharedStore;
use crate::Result;

pub const VIEWING_HISTORY_KEY: &str = "viewingHistory";
pub const SELECTED_APIS_KEY: &str = "selectedAPIs";
pub const CUSTOM_APIS_KEY: &str = "customAPIs";
pub const YELLOW_FILTER_KEY: &str = "yellowFilterEnabled";
pub const AD_FILTER_KEY: &str = "adFilterEnabled";
pub const DOUBAN_KEY: &str = "doubanEnabled";
pub const SEARCH_HISTORY_KEY: &str = "searchHistory";
/// Older clients kept the search list under this key.
pub const LEGACY_SEARCH_HISTORY_KEY: &str = "videoSearchHistory";
pub const LAST_SYNC_TIME_KEY: &str = "lastSyncTime";
pub const FORCE_REMOTE_KEY: &str = "forceRemoteSync";

#[derive(Clone)]
pub struct DeviceState {
    store: SharedStore,
    force_remote_default: bool,
}

impl DeviceState {
    pub fn new(store: SharedStore, force_remote_default: bool) -> Self {
        Self {
            store,
            force_remote_default,
        }
    }

    /// Collect the synchronized fields from their individual keys.
    pub fn snapshot(&self) -> Result<SyncPayload> {
        let mut search_history: Vec<String> = self.read_list(SEARCH_HISTORY_KEY)?;
        if search_history.is_empty() {
            search_history = self.read_list(LEGACY_SEARCH_HISTORY_KEY)?;
        }

        Ok(SyncPayload {
            viewing_history: self.read_list(VIEWING_HISTORY_KEY)?,
            selected_apis: self.read_list(SELECTED_APIS_KEY)?,
            custom_apis: self.read_list(CUSTOM_APIS_KEY)?,
            yellow_filter_enabled: self.read_flag(YELLOW_FILTER_KEY)?.unwrap_or(false),
            // Ad filtering stays on unless explicitly disabled.
            ad_filter_enabled: self.read_flag(AD_FILTER_KEY)?.unwrap_or(true),
            douban_enabled: self.read_flag(DOUBAN_KEY)?.unwrap_or(false),
            search_history,
            last_sync_time: self.last_sync_time()?.unwrap_or(0),
        })
    }

    /// Overwrite every synchronized key with the payload's values.
    pub fn apply(&self, payload: &SyncPayload) -> Result<()> {
        self.write_json(VIEWING_HISTORY_KEY, &payload.viewing_history)?;
        self.write_json(SELECTED_APIS_KEY, &payload.selected_apis)?;
        self.write_json(CUSTOM_APIS_KEY, &payload.custom_apis)?;
        self.write_flag(YELLOW_FILTER_KEY, payload.yellow_filter_enabled)?;
        self.write_flag(AD_FILTER_KEY, payload.ad_filter_enabled)?;
        self.write_flag(DOUBAN_KEY, payload.douban_enabled)?;
        self.write_json(SEARCH_HISTORY_KEY, &payload.search_history)?;
        if payload.last_sync_time > 0 {
            self.record_last_sync_time(payload.last_sync_time)?;
        }
        Ok(())
    }

    pub fn last_sync_time(&self) -> Result<Option<i64>> {
        Ok(self
            .store
            .get(LAST_SYNC_TIME_KEY)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|millis| *millis > 0))
    }

    pub fn record_last_sync_time(&self, millis: i64) -> Result<()> {
        self.store.set(LAST_SYNC_TIME_KEY, &millis.to_string())
    }

    /// Whether remote sync is forced on regardless of the deployment host.
    pub fn force_remote(&self) -> Result<bool> {
        Ok(self
            .read_flag(FORCE_REMOTE_KEY)?
            .unwrap_or(self.force_remote_default))
    }

    pub fn set_force_remote(&self, force: bool) -> Result<()> {
        self.write_flag(FORCE_REMOTE_KEY, force)
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => Ok(items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect()),
            Ok(_) => Ok(Vec::new()),
            Err(error) => {
                tracing::debug!(key, %error, "Treating unparsable list as empty");
                Ok(Vec::new())
            }
        }
    }

    fn read_flag(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.store.get(key)?.as_deref().and_then(parse_flag))
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.store.set(key, &serde_json::to_string(value)?)
    }

    fn write_flag(&self, key: &str, flag: bool) -> Result<()> {
        self.store.set(key, if flag { "true" } else { "false" })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};

    fn device() -> (Arc<MemoryStore>, DeviceState) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), DeviceState::new(store, true))
    }

    #[test]
    fn empty_device_snapshots_defaults() {
        let (_, state) = device();
        assert_eq!(state.snapshot().unwrap(), SyncPayload::default());
    }

    #[test]
    fn snapshot_reads_individual_keys() {
        let (store, state) = device();
        store
            .set(
                VIEWING_HISTORY_KEY,
                r#"[{"title":"Show","episodeIndex":2},"junk"]"#,
            )
            .unwrap();
        store.set(SELECTED_APIS_KEY, r#"["heimuer","dbzy"]"#).unwrap();
        store.set(CUSTOM_APIS_KEY, "not json").unwrap();
        store.set(AD_FILTER_KEY, "false").unwrap();
        store.set(DOUBAN_KEY, "true").unwrap();
        store.set(SEARCH_HISTORY_KEY, r#"["a","b"]"#).unwrap();
        store.set(LAST_SYNC_TIME_KEY, "1700000000000").unwrap();

        let payload = state.snapshot().unwrap();
        assert_eq!(payload.viewing_history.len(), 1);
        assert_eq!(payload.viewing_history[0]["title"], json!("Show"));
        assert_eq!(payload.selected_apis, vec!["heimuer", "dbzy"]);
        assert!(payload.custom_apis.is_empty());
        assert!(!payload.ad_filter_enabled);
        assert!(payload.douban_enabled);
        assert!(!payload.yellow_filter_enabled);
        assert_eq!(payload.search_history, vec!["a", "b"]);
        assert_eq!(payload.last_sync_time, 1_700_000_000_000);
    }

    #[test]
    fn legacy_search_history_is_used_when_primary_is_empty() {
        let (store, state) = device();
        store.set(SEARCH_HISTORY_KEY, "[]").unwrap();
        store
            .set(LEGACY_SEARCH_HISTORY_KEY, r#"["old query"]"#)
            .unwrap();
        assert_eq!(state.snapshot().unwrap().search_history, vec!["old query"]);
    }

    #[test]
    fn apply_then_snapshot_round_trips() {
        let (_, state) = device();
        let payload = SyncPayload::from_value(json!({
            "viewingHistory": [{"title": "Film", "timestamp": 12}],
            "selectedAPIs": ["heimuer"],
            "customAPIs": [{"name": "mine", "url": "https://api.example"}],
            "yellowFilterEnabled": true,
            "adFilterEnabled": false,
            "doubanEnabled": true,
            "searchHistory": ["x"],
            "lastSyncTime": 55
        }));

        state.apply(&payload).unwrap();
        assert_eq!(state.snapshot().unwrap(), payload);
    }

    #[test]
    fn force_remote_falls_back_to_default() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let forced = DeviceState::new(store.clone(), true);
        let unforced = DeviceState::new(store, false);
        assert!(forced.force_remote().unwrap());
        assert!(!unforced.force_remote().unwrap());

        unforced.set_force_remote(true).unwrap();
        assert!(unforced.force_remote().unwrap());
        assert!(forced.force_remote().unwrap());
    }
}

//! The synchronized document.
//!
//! A `SyncPayload` is always exchanged as a whole. Decoding is lenient: a
//! missing, `null` or mistyped list becomes an empty list and list elements of
//! the wrong type are dropped, so a partially corrupted document never fails
//! to load.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Opaque JSON object (a watch-progress entry or a custom source).
pub type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub viewing_history: Vec<JsonObject>,
    #[serde(
        rename = "selectedAPIs",
        alias = "selectedApis",
        default,
        deserialize_with = "lenient_vec"
    )]
    pub selected_apis: Vec<String>,
    #[serde(
        rename = "customAPIs",
        alias = "customApis",
        default,
        deserialize_with = "lenient_vec"
    )]
    pub custom_apis: Vec<JsonObject>,
    #[serde(default, deserialize_with = "flag_default_off")]
    pub yellow_filter_enabled: bool,
    #[serde(default = "default_on", deserialize_with = "flag_default_on")]
    pub ad_filter_enabled: bool,
    #[serde(default, deserialize_with = "flag_default_off")]
    pub douban_enabled: bool,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub search_history: Vec<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub last_sync_time: i64,
}

impl Default for SyncPayload {
    fn default() -> Self {
        Self {
            viewing_history: Vec::new(),
            selected_apis: Vec::new(),
            custom_apis: Vec::new(),
            yellow_filter_enabled: false,
            ad_filter_enabled: true,
            douban_enabled: false,
            search_history: Vec::new(),
            last_sync_time: 0,
        }
    }
}

impl SyncPayload {
    /// Decode from an arbitrary JSON value. Non-objects decode to the default.
    pub fn from_value(value: Value) -> Self {
        if value.is_object() {
            serde_json::from_value(value).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    #[must_use]
    pub fn stamped(mut self, now_millis: i64) -> Self {
        self.last_sync_time = now_millis;
        self
    }
}

const fn default_on() -> bool {
    true
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn flag_default_on<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(lenient_flag(Value::deserialize(deserializer)?).unwrap_or(true))
}

fn flag_default_off<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(lenient_flag(Value::deserialize(deserializer)?).unwrap_or(false))
}

fn lenient_flag(value: Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(flag),
        Value::String(raw) => match raw.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis as i64))
            .unwrap_or_default(),
        Value::String(raw) => raw.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_with_wire_names() {
        let payload = SyncPayload {
            selected_apis: vec!["heimuer".to_string()],
            last_sync_time: 42,
            ..SyncPayload::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "viewingHistory": [],
                "selectedAPIs": ["heimuer"],
                "customAPIs": [],
                "yellowFilterEnabled": false,
                "adFilterEnabled": true,
                "doubanEnabled": false,
                "searchHistory": [],
                "lastSyncTime": 42
            })
        );
    }

    #[test]
    fn malformed_lists_become_empty() {
        let payload = SyncPayload::from_value(json!({
            "viewingHistory": null,
            "selectedAPIs": "heimuer",
            "customAPIs": {"name": "x"},
            "searchHistory": ["a", 3, "b", null]
        }));
        assert!(payload.viewing_history.is_empty());
        assert!(payload.selected_apis.is_empty());
        assert!(payload.custom_apis.is_empty());
        assert_eq!(payload.search_history, vec!["a", "b"]);
    }

    #[test]
    fn wrong_element_types_are_dropped() {
        let payload = SyncPayload::from_value(json!({
            "viewingHistory": [{"title": "Show", "episodeIndex": 3}, "junk", 7],
            "customApis": [{"name": "mine", "url": "https://x"}, []]
        }));
        assert_eq!(payload.viewing_history.len(), 1);
        assert_eq!(payload.viewing_history[0]["title"], json!("Show"));
        assert_eq!(payload.custom_apis.len(), 1);
    }

    #[test]
    fn flags_default_and_tolerate_strings() {
        let empty = SyncPayload::from_value(json!({}));
        assert!(empty.ad_filter_enabled);
        assert!(!empty.yellow_filter_enabled);
        assert!(!empty.douban_enabled);

        let stringly = SyncPayload::from_value(json!({
            "adFilterEnabled": "false",
            "doubanEnabled": "true",
            "yellowFilterEnabled": null
        }));
        assert!(!stringly.ad_filter_enabled);
        assert!(stringly.douban_enabled);
        assert!(!stringly.yellow_filter_enabled);
    }

    #[test]
    fn last_sync_time_accepts_numbers_only_leniently() {
        assert_eq!(
            SyncPayload::from_value(json!({"lastSyncTime": 1_700_000_000_000_i64})).last_sync_time,
            1_700_000_000_000
        );
        assert_eq!(
            SyncPayload::from_value(json!({"lastSyncTime": "oops"})).last_sync_time,
            0
        );
    }

    #[test]
    fn non_object_decodes_to_default() {
        assert_eq!(SyncPayload::from_value(json!([1, 2])), SyncPayload::default());
        assert_eq!(SyncPayload::from_value(Value::Null), SyncPayload::default());
    }

    #[test]
    fn stamped_overwrites_time() {
        let payload = SyncPayload::default().stamped(99);
        assert_eq!(payload.last_sync_time, 99);
    }
}

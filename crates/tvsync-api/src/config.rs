use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tvsync_core::util::normalize_text_option;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Route serving the sync resource.
    pub sync_path: String,
    /// Stored documents live under `<key_prefix>_<userId>`.
    pub key_prefix: String,
    /// File-per-key directory; the in-memory store is used when unset.
    pub store_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            sync_path: "/user-sync".to_string(),
            key_prefix: "tvsyncData".to_string(),
            store_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = value_or_default(&lookup, "TVSYNC_API_BIND_ADDR", &defaults.bind_addr);
        if bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(
                "TVSYNC_API_BIND_ADDR must be a socket address such as 127.0.0.1:8787".to_string(),
            ));
        }

        let raw_path = value_or_default(&lookup, "TVSYNC_SYNC_PATH", &defaults.sync_path);
        let sync_path = raw_path.trim_end_matches('/').to_string();
        if !sync_path.starts_with('/') || sync_path.len() < 2 {
            return Err(ConfigError::Invalid(
                "TVSYNC_SYNC_PATH must start with / and name a route".to_string(),
            ));
        }

        let key_prefix = value_or_default(&lookup, "TVSYNC_KEY_PREFIX", &defaults.key_prefix);
        if !key_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid(
                "TVSYNC_KEY_PREFIX may only contain letters, digits, '_' and '-'".to_string(),
            ));
        }

        let store_dir = normalize_text_option(lookup("TVSYNC_STORE_DIR")).map(PathBuf::from);

        Ok(Self {
            bind_addr,
            sync_path,
            key_prefix,
            store_dir,
        })
    }

    pub fn storage_key(&self, user_id: &str) -> String {
        format!("{}_{}", self.key_prefix, user_id)
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    normalize_text_option(lookup(name)).unwrap_or_else(|| default.to_string())
}

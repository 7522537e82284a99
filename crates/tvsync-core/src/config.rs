//! Sync client configuration.
//!
//! `SyncConfig` carries every tunable of the coordinator and the remote store
//! client. Defaults match the hosted deployment; `from_env` lets operators
//! override any of them through `TVSYNC_*` variables.

use std::collections::HashMap;
use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::{Error, Result};
use url::Url;

use crate::util::normalize_text_option;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787";
pub const DEFAULT_SYNC_PATH: &str = "/user-sync";
pub const DEFAULT_FALLBACK_PREFIX: &str = "tvsyncData";
pub const DEFAULT_IDENTIFIER_KEY: &str = "tvsyncUserId";

/// Host suffixes that identify a hosted deployment with a live sync endpoint.
const HOSTED_SUFFIXES: [&str; 2] = [".pages.dev", ".workers.dev"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL of the remote store, without trailing slash.
    pub endpoint: String,
    pub sync_path: String,
    /// Prefix of the local fallback key (`<prefix>_<userId>`).
    pub fallback_prefix: String,
    pub identifier_key: String,
    pub min_sync_interval: Duration,
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub request_timeout: Duration,
    pub unlock_grace: Duration,
    pub auto_sync_interval: Duration,
    pub resume_threshold: Duration,
    /// Default for the device-level force flag when the device never set it.
    pub force_remote: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sync_path: DEFAULT_SYNC_PATH.to_string(),
            fallback_prefix: DEFAULT_FALLBACK_PREFIX.to_string(),
            identifier_key: DEFAULT_IDENTIFIER_KEY.to_string(),
            min_sync_interval: Duration::from_secs(30),
            max_retries: 2,
            initial_retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
            unlock_grace: Duration::from_secs(1),
            auto_sync_interval: Duration::from_secs(180),
            resume_threshold: Duration::from_secs(60),
            force_remote: true,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let endpoint = normalize_endpoint(&value_or_default(
            &lookup,
            "TVSYNC_ENDPOINT",
            &defaults.endpoint,
        ))?;
        let sync_path = normalize_path(&value_or_default(
            &lookup,
            "TVSYNC_SYNC_PATH",
            &defaults.sync_path,
        ));
        let fallback_prefix =
            value_or_default(&lookup, "TVSYNC_FALLBACK_PREFIX", &defaults.fallback_prefix);

        let min_sync_interval = Duration::from_secs(parse_in_range(
            &lookup,
            "TVSYNC_MIN_SYNC_INTERVAL_SECS",
            30,
            0..=3_600,
        )?);
        let max_retries = u32::try_from(parse_in_range(&lookup, "TVSYNC_MAX_RETRIES", 2, 0..=10)?)
            .map_err(|_| Error::Config("TVSYNC_MAX_RETRIES is out of range".to_string()))?;
        let initial_retry_delay = Duration::from_millis(parse_in_range(
            &lookup,
            "TVSYNC_RETRY_DELAY_MS",
            1_000,
            0..=60_000,
        )?);
        let request_timeout = Duration::from_secs(parse_in_range(
            &lookup,
            "TVSYNC_REQUEST_TIMEOUT_SECS",
            10,
            1..=300,
        )?);
        let unlock_grace = Duration::from_millis(parse_in_range(
            &lookup,
            "TVSYNC_UNLOCK_GRACE_MS",
            1_000,
            0..=60_000,
        )?);
        let auto_sync_interval = Duration::from_secs(parse_in_range(
            &lookup,
            "TVSYNC_AUTO_SYNC_INTERVAL_SECS",
            180,
            10..=86_400,
        )?);
        let resume_threshold = Duration::from_secs(parse_in_range(
            &lookup,
            "TVSYNC_RESUME_THRESHOLD_SECS",
            60,
            0..=86_400,
        )?);

        let force_remote = match optional_trimmed(&lookup, "TVSYNC_FORCE_REMOTE") {
            None => defaults.force_remote,
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                Error::Config("TVSYNC_FORCE_REMOTE must be true or false".to_string())
            })?,
        };

        Ok(Self {
            endpoint,
            sync_path,
            fallback_prefix,
            identifier_key: defaults.identifier_key,
            min_sync_interval,
            max_retries,
            initial_retry_delay,
            request_timeout,
            unlock_grace,
            auto_sync_interval,
            resume_threshold,
            force_remote,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self> {
        self.endpoint = normalize_endpoint(&endpoint.into())?;
        Ok(self)
    }

    #[must_use]
    pub const fn with_min_sync_interval(mut self, interval: Duration) -> Self {
        self.min_sync_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub const fn with_initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_unlock_grace(mut self, grace: Duration) -> Self {
        self.unlock_grace = grace;
        self
    }

    #[must_use]
    pub const fn with_auto_sync_interval(mut self, interval: Duration) -> Self {
        self.auto_sync_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_resume_threshold(mut self, threshold: Duration) -> Self {
        self.resume_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_force_remote(mut self, force: bool) -> Self {
        self.force_remote = force;
        self
    }

    /// Full URL of the sync resource, e.g. `https://tv.pages.dev/user-sync`.
    pub fn sync_url(&self) -> String {
        format!("{}{}", self.endpoint, self.sync_path)
    }

    /// Whether the endpoint host belongs to a hosted deployment.
    pub fn is_hosted_endpoint(&self) -> bool {
        let Ok(url) = Url::parse(&self.endpoint) else {
            return false;
        };
        url.host_str().is_some_and(|host| {
            HOSTED_SUFFIXES
                .iter()
                .any(|suffix| host.ends_with(suffix))
        })
    }
}

/// Accepts the spellings a browser-side flag or an env var would use.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Validate a base URL and strip its trailing slash.
///
/// The sync path is appended verbatim, so a query or fragment would end up
/// in front of it and is rejected.
pub(crate) fn normalize_endpoint(raw: &str) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::Config("endpoint must not be empty".to_string()))?;
    let url = Url::parse(&endpoint)
        .map_err(|error| Error::Config(format!("endpoint {endpoint:?} is not a URL: {error}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(
            "endpoint must include http:// or https://".to_string(),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::Config("endpoint must name a host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::Config(
            "endpoint must not carry a query string or fragment".to_string(),
        ));
    }
    Ok(endpoint.trim_end_matches('/').to_string())
}

fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let value = raw.parse::<u64>().map_err(|_| {
        Error::Config(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    })?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::Config(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )))
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

//! The 6-digit user identifier and its persistence.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::storage::SharedStore;
use crate::{Error, Result};

const ID_MIN: u32 = 100_000;
const ID_MAX: u32 = 999_999;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{6}$").expect("Invalid regex"))
}

/// Validated user identifier: exactly six ASCII digits.
///
/// This is the only partition key of both the remote store and the local
/// fallback copy; holding a `UserId` means the value has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self> {
        if id_pattern().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::Validation(format!(
                "user id must be exactly 6 digits, got {raw:?}"
            )))
        }
    }

    /// Uniformly random identifier in `[100000, 999999]`.
    pub fn generate() -> Self {
        let value = rand::thread_rng().gen_range(ID_MIN..=ID_MAX);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn is_valid_user_id(raw: &str) -> bool {
    id_pattern().is_match(raw)
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// Reads, creates and replaces the persisted identifier.
#[derive(Clone)]
pub struct Identity {
    store: SharedStore,
    key: String,
}

impl Identity {
    pub fn new(store: SharedStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The stored identifier, if one exists and is valid.
    pub fn current(&self) -> Result<Option<UserId>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        match UserId::parse(&raw) {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                tracing::warn!(key = %self.key, "Ignoring malformed stored user id");
                Ok(None)
            }
        }
    }

    /// The stored identifier, generating and persisting one when absent.
    pub fn get_or_create(&self) -> Result<UserId> {
        if let Some(id) = self.current()? {
            return Ok(id);
        }
        let id = UserId::generate();
        self.store.set(&self.key, id.as_str())?;
        tracing::info!(user_id = %id, "Generated new user id");
        Ok(id)
    }

    /// Explicitly replace the identifier.
    pub fn set(&self, id: &UserId) -> Result<()> {
        self.store.set(&self.key, id.as_str())
    }

    /// Replace the identifier with a freshly generated one.
    pub fn regenerate(&self) -> Result<UserId> {
        let id = UserId::generate();
        self.set(&id)?;
        Ok(id)
    }
}

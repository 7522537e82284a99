//! Uniform result shape for remote store calls.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Why a remote call failed. Not part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, reset, DNS failure and the like.
    Transport,
    Timeout,
    /// Well-formed non-success response.
    Server(u16),
    /// Undecodable response body.
    Parse,
    /// The request could not be formed from the given input.
    Validation,
}

impl FailureKind {
    /// Failures below the HTTP layer, worth another attempt.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transport | Self::Timeout)
    }
}

/// `{ success, data?, message? }` as sent by the endpoint, plus the failure
/// classification filled in by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl<T> Envelope<T> {
    pub const fn ok(data: Option<T>, message: Option<String>) -> Self {
        Self {
            success: true,
            data,
            message,
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            failure: Some(kind),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
            failure: self.failure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.failure.is_some_and(FailureKind::is_retryable)
    }

    pub fn message_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(default)
    }

    /// Convert a failed envelope into the crate error taxonomy.
    pub fn to_error(&self) -> Option<Error> {
        let message = self.message_or("remote call failed").to_string();
        match self.failure? {
            FailureKind::Transport => Some(Error::Transport(message)),
            FailureKind::Timeout => Some(Error::Timeout(message)),
            FailureKind::Server(status) => Some(Error::Server { status, message }),
            FailureKind::Parse => Some(Error::Parse(message)),
            FailureKind::Validation => Some(Error::Validation(message)),
        }
    }
}

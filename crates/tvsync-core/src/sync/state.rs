//! Coordinator state, lifecycle events and the notification seam.

use serde::Serialize;

use crate::payload::SyncPayload;

/// Lifecycle of a single cycle: `Idle -> Syncing -> Succeeded|Failed -> Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Succeeded,
    Failed,
}

/// Process-lifetime coordinator state. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncState {
    pub locked: bool,
    /// Epoch millis of the last upload attempt, remote or not. Zero when none.
    pub last_sync_at: i64,
    pub phase: SyncPhase,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            locked: false,
            last_sync_at: 0,
            phase: SyncPhase::Idle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SyncDirection {
    Upload,
    Download,
}

/// Where the payload of a cycle ended up or came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SyncOrigin {
    Remote,
    LocalFallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    RemoteSuccess,
    LocalFallback,
    /// Nothing was stored or applied.
    NoOp,
}

/// Broadcast to every subscriber of a coordinator.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// An upload stored the payload.
    Synced { origin: SyncOrigin },
    /// A download applied a payload to the device.
    SyncCompleted {
        origin: SyncOrigin,
        payload: SyncPayload,
    },
    Finished {
        direction: SyncDirection,
        outcome: SyncOutcome,
    },
    /// The lock was released; a new cycle may start.
    Idle,
}

/// Why a trigger was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Another cycle is in flight.
    Busy,
    /// The previous upload was less than the minimum interval ago.
    Throttled { retry_in_ms: i64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy => f.write_str("a sync is already in progress"),
            Self::Throttled { retry_in_ms } => write!(
                f,
                "synced too recently, try again in {}s",
                (retry_in_ms + 999) / 1_000
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing notification sink (toasts, status lines).
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Discards every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _level: NoticeLevel, _message: &str) {}
}

//! Synchronization between the device and the remote store.

mod auto;
mod client;
mod coordinator;
mod envelope;
#[cfg(test)]
pub(crate) mod mock;
mod state;

pub use auto::{AutoSync, Visibility};
pub use client::{RemoteStore, RemoteStoreClient};
pub use coordinator::{SyncCoordinator, SyncCoordinatorBuilder};
pub use envelope::{Envelope, FailureKind};
pub use state::{
    NoticeLevel, Notifier, NullNotifier, Rejection, SyncDirection, SyncEvent, SyncOrigin,
    SyncOutcome, SyncPhase, SyncState,
};

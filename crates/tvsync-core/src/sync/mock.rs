//! In-process doubles for coordinator and auto-sync tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;

use super::client::RemoteStore;
use super::envelope::{Envelope, FailureKind};
use super::state::{NoticeLevel, Notifier, SyncEvent};
use crate::identity::UserId;
use crate::payload::SyncPayload;

#[derive(Default)]
pub struct MockRemote {
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    fail: AtomicBool,
    delay: Duration,
    stored: Mutex<Option<SyncPayload>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let remote = Self::default();
        remote.fail.store(true, Ordering::SeqCst);
        remote
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn seed(&self, payload: SyncPayload) {
        *self.stored.lock().unwrap() = Some(payload);
    }

    pub fn stored(&self) -> Option<SyncPayload> {
        self.stored.lock().unwrap().clone()
    }
}

impl RemoteStore for MockRemote {
    async fn read(&self, _id: &UserId) -> Envelope<SyncPayload> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Envelope::failed(FailureKind::Transport, "connection refused");
        }
        match self.stored() {
            Some(payload) => Envelope::ok(Some(payload), None),
            None => Envelope::failed(FailureKind::Server(404), "No sync data found"),
        }
    }

    async fn write(&self, _id: &UserId, payload: &SyncPayload) -> Envelope<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Envelope::failed(FailureKind::Transport, "connection refused");
        }
        self.seed(payload.clone());
        Envelope::ok(None, Some("Data synced successfully".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(NoticeLevel, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

/// Collect events up to and including the next `Idle`.
pub async fn wait_for_idle(events: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let collect = async {
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            let idle = event == SyncEvent::Idle;
            seen.push(event);
            if idle {
                return seen;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), collect)
        .await
        .expect("sync cycle did not finish")
}

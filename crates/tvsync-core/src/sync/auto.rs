//! Periodic and foreground-triggered uploads.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::client::RemoteStore;
use super::coordinator::SyncCoordinator;

/// Foreground state reported by the host application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Background task layering the auto-sync schedule on top of
/// [`SyncCoordinator::request_upload`]. It never bypasses the coordinator's
/// guards, so a tick during a running cycle is simply dropped.
///
/// Each `Visible` value published on the channel counts as a return to the
/// foreground; publishers should only send on actual transitions.
pub struct AutoSync {
    handle: JoinHandle<()>,
}

impl AutoSync {
    /// Upload immediately, then on every interval tick while visible and on
    /// every foreground return once the resume threshold has passed.
    pub fn start<R: RemoteStore>(
        coordinator: SyncCoordinator<R>,
        visibility: watch::Receiver<Visibility>,
    ) -> Self {
        let handle = tokio::spawn(run(coordinator, visibility));
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run<R: RemoteStore>(
    coordinator: SyncCoordinator<R>,
    mut visibility: watch::Receiver<Visibility>,
) {
    let period = coordinator.config().auto_sync_interval;
    let resume_threshold = coordinator.config().resume_threshold;

    tracing::info!(
        interval_secs = period.as_secs(),
        "Auto-sync started"
    );
    coordinator.request_upload(true);

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut channel_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if *visibility.borrow() == Visibility::Visible {
                    tracing::debug!("Auto-sync interval elapsed");
                    coordinator.request_upload(true);
                }
            }
            changed = visibility.changed(), if channel_open => {
                if changed.is_err() {
                    // Publisher gone: keep the periodic schedule with the last known state.
                    channel_open = false;
                    continue;
                }
                let current = *visibility.borrow_and_update();
                if current != Visibility::Visible {
                    continue;
                }
                let stale = coordinator
                    .since_last_sync()
                    .is_none_or(|elapsed| elapsed > resume_threshold);
                if stale {
                    tracing::debug!("Returned to foreground, syncing");
                    coordinator.request_upload(true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::SyncConfig;
    use crate::storage::MemoryStore;
    use crate::sync::mock::{wait_for_idle, MockRemote};
    use crate::util::ManualClock;

    fn setup() -> (
        SyncCoordinator<Arc<MockRemote>>,
        Arc<MockRemote>,
        Arc<ManualClock>,
    ) {
        let remote = Arc::new(MockRemote::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let config = SyncConfig::default().with_unlock_grace(Duration::ZERO);
        let coordinator =
            SyncCoordinator::builder(config, remote.clone(), Arc::new(MemoryStore::new()))
                .clock(clock.clone())
                .build();
        (coordinator, remote, clock)
    }

    #[tokio::test]
    async fn uploads_on_start_and_on_stale_foreground_return() {
        let (coordinator, remote, clock) = setup();
        let mut events = coordinator.subscribe();
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);

        let auto = AutoSync::start(coordinator.clone(), visibility_rx);
        wait_for_idle(&mut events).await;
        assert_eq!(remote.writes.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(61));
        visibility_tx.send(Visibility::Hidden).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        visibility_tx.send(Visibility::Visible).unwrap();
        wait_for_idle(&mut events).await;
        assert_eq!(remote.writes.load(Ordering::SeqCst), 2);

        assert!(auto.is_running());
        auto.stop();
    }

    #[tokio::test]
    async fn recent_sync_suppresses_foreground_upload() {
        let (coordinator, remote, clock) = setup();
        let mut events = coordinator.subscribe();
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);

        let _auto = AutoSync::start(coordinator.clone(), visibility_rx);
        wait_for_idle(&mut events).await;

        clock.advance(Duration::from_secs(45));
        visibility_tx.send(Visibility::Hidden).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        visibility_tx.send(Visibility::Visible).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(remote.writes.load(Ordering::SeqCst), 1);
        assert!(!coordinator.state().locked);
    }

    #[tokio::test]
    async fn periodic_tick_uploads_while_visible() {
        let remote = Arc::new(MockRemote::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let config = SyncConfig::default()
            .with_unlock_grace(Duration::ZERO)
            .with_min_sync_interval(Duration::ZERO)
            .with_auto_sync_interval(Duration::from_millis(100));
        let coordinator =
            SyncCoordinator::builder(config, remote.clone(), Arc::new(MemoryStore::new()))
                .clock(clock)
                .build();
        let (_visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);

        let auto = AutoSync::start(coordinator, visibility_rx);
        tokio::time::sleep(Duration::from_millis(350)).await;
        auto.stop();

        assert!(remote.writes.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn hidden_page_skips_periodic_ticks() {
        let remote = Arc::new(MockRemote::new());
        let config = SyncConfig::default()
            .with_unlock_grace(Duration::ZERO)
            .with_min_sync_interval(Duration::ZERO)
            .with_auto_sync_interval(Duration::from_millis(50));
        let coordinator =
            SyncCoordinator::builder(config, remote.clone(), Arc::new(MemoryStore::new()))
                .build();
        let (_visibility_tx, visibility_rx) = watch::channel(Visibility::Hidden);

        let auto = AutoSync::start(coordinator, visibility_rx);
        tokio::time::sleep(Duration::from_millis(220)).await;
        drop(auto);

        // Only the activation upload.
        assert_eq!(remote.writes.load(Ordering::SeqCst), 1);
    }
}

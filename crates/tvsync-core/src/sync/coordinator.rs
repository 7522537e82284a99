//! Upload/download orchestration.
//!
//! A [`SyncCoordinator`] owns the lock and throttle state for one device.
//! Triggers return immediately; accepted cycles run on a spawned task and
//! report through [`SyncEvent`]s and the [`Notifier`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;

use super::client::RemoteStore;
use super::envelope::Envelope;
use super::state::{
    NoticeLevel, Notifier, NullNotifier, Rejection, SyncDirection, SyncEvent, SyncOrigin,
    SyncOutcome, SyncPhase, SyncState,
};
use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::device_state::DeviceState;
use crate::identity::{Identity, UserId};
use crate::payload::SyncPayload;
use crate::storage::SharedStore;
use crate::util::{Clock, SystemClock};
use crate::Result;

const EVENT_CAPACITY: usize = 64;

pub struct SyncCoordinator<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for SyncCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct SyncCoordinatorBuilder<R> {
    config: SyncConfig,
    remote: R,
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<R: RemoteStore> SyncCoordinatorBuilder<R> {
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SyncCoordinator<R> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Inner {
            cache: LocalCache::new(self.store.clone(), self.config.fallback_prefix.clone()),
            device: DeviceState::new(self.store.clone(), self.config.force_remote),
            identity: Identity::new(self.store, self.config.identifier_key.clone()),
            config: self.config,
            remote: self.remote,
            notifier: self.notifier,
            clock: self.clock,
            state: Mutex::new(SyncState::default()),
            events,
        };
        SyncCoordinator {
            inner: Arc::new(inner),
        }
    }
}

struct Inner<R> {
    config: SyncConfig,
    remote: R,
    cache: LocalCache,
    device: DeviceState,
    identity: Identity,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    state: Mutex<SyncState>,
    events: broadcast::Sender<SyncEvent>,
}

impl<R: RemoteStore> SyncCoordinator<R> {
    pub fn builder(config: SyncConfig, remote: R, store: SharedStore) -> SyncCoordinatorBuilder<R> {
        SyncCoordinatorBuilder {
            config,
            remote,
            store,
            notifier: Arc::new(NullNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn new(config: SyncConfig, remote: R, store: SharedStore) -> Self {
        Self::builder(config, remote, store).build()
    }

    /// Start an upload cycle in the background.
    ///
    /// Returns `false` when a cycle is already running or the previous upload
    /// is more recent than the minimum interval. Must be called from within a
    /// Tokio runtime.
    pub fn request_upload(&self, silent: bool) -> bool {
        if !self.begin(SyncDirection::Upload, silent) {
            return false;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.upload(silent).await });
        true
    }

    /// Start a download cycle in the background. Only the lock guard applies.
    pub fn request_download(&self, silent: bool) -> bool {
        if !self.begin(SyncDirection::Download, silent) {
            return false;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.download(silent).await });
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> SyncState {
        *self.inner.lock_state()
    }

    /// Time elapsed since the last upload attempt, or `None` before the first.
    pub fn since_last_sync(&self) -> Option<Duration> {
        let last = self.inner.lock_state().last_sync_at;
        if last == 0 {
            return None;
        }
        let elapsed = self.inner.clock.now_millis().saturating_sub(last);
        Some(Duration::from_millis(u64::try_from(elapsed).unwrap_or(0)))
    }

    pub fn user_id(&self) -> Result<UserId> {
        self.inner.identity.get_or_create()
    }

    pub fn remote_enabled(&self) -> bool {
        self.inner.remote_enabled()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn device(&self) -> &DeviceState {
        &self.inner.device
    }

    pub fn cache(&self) -> &LocalCache {
        &self.inner.cache
    }

    fn begin(&self, direction: SyncDirection, silent: bool) -> bool {
        let now = self.inner.clock.now_millis();
        match self.inner.try_lock(direction, now) {
            Ok(()) => {
                tracing::debug!(?direction, "Sync cycle accepted");
                true
            }
            Err(rejection) => {
                tracing::warn!(?direction, %rejection, "Sync trigger rejected");
                self.inner
                    .notify(silent, NoticeLevel::Warning, &rejection.to_string());
                false
            }
        }
    }
}

impl<R: RemoteStore> Inner<R> {
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check both guards and take the lock in one critical section.
    fn try_lock(&self, direction: SyncDirection, now: i64) -> std::result::Result<(), Rejection> {
        let mut state = self.lock_state();
        if state.locked {
            return Err(Rejection::Busy);
        }
        if direction == SyncDirection::Upload && state.last_sync_at > 0 {
            let min_interval = duration_millis(self.config.min_sync_interval);
            let elapsed = now.saturating_sub(state.last_sync_at);
            if elapsed < min_interval {
                return Err(Rejection::Throttled {
                    retry_in_ms: min_interval - elapsed,
                });
            }
        }
        state.locked = true;
        state.phase = SyncPhase::Syncing;
        Ok(())
    }

    fn remote_enabled(&self) -> bool {
        if self.config.is_hosted_endpoint() {
            return true;
        }
        self.device.force_remote().unwrap_or_else(|error| {
            tracing::warn!(%error, "Could not read force-remote flag, using default");
            self.config.force_remote
        })
    }

    fn notify(&self, silent: bool, level: NoticeLevel, message: &str) {
        if !silent {
            self.notifier.notify(level, message);
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn mark_uploaded(&self) {
        let now = self.clock.now_millis();
        self.lock_state().last_sync_at = now;
    }

    async fn upload(&self, silent: bool) {
        let remote_enabled = self.remote_enabled();
        let (outcome, phase) = match self.prepare_upload() {
            Ok((id, payload)) => {
                self.store_payload(&id, &payload, remote_enabled, silent)
                    .await
            }
            Err(error) => {
                tracing::error!(%error, "Could not collect local data for upload");
                self.notify(
                    silent,
                    NoticeLevel::Error,
                    &format!("Sync failed: {error}"),
                );
                (SyncOutcome::NoOp, SyncPhase::Failed)
            }
        };
        self.finish(SyncDirection::Upload, outcome, phase, remote_enabled)
            .await;
    }

    fn prepare_upload(&self) -> Result<(UserId, SyncPayload)> {
        let id = self.identity.get_or_create()?;
        let payload = self.device.snapshot()?.stamped(self.clock.now_millis());
        Ok((id, payload))
    }

    async fn store_payload(
        &self,
        id: &UserId,
        payload: &SyncPayload,
        remote_enabled: bool,
        silent: bool,
    ) -> (SyncOutcome, SyncPhase) {
        if remote_enabled {
            let envelope = self.remote.write(id, payload).await;
            if envelope.success {
                self.mark_uploaded();
                if let Err(error) = self.device.record_last_sync_time(payload.last_sync_time) {
                    tracing::warn!(%error, "Could not record last sync time");
                }
                tracing::info!(user_id = %id, "Uploaded sync payload");
                self.notify(silent, NoticeLevel::Success, "Synced to cloud");
                self.emit(SyncEvent::Synced {
                    origin: SyncOrigin::Remote,
                });
                return (SyncOutcome::RemoteSuccess, SyncPhase::Succeeded);
            }
            log_remote_failure(id, SyncDirection::Upload, &envelope);
        }

        // Failed remote attempts still count against the throttle.
        self.mark_uploaded();
        let failed_phase = if remote_enabled {
            SyncPhase::Failed
        } else {
            SyncPhase::Succeeded
        };
        match self.cache.write_fallback(id, payload) {
            Ok(()) => {
                tracing::info!(user_id = %id, remote_enabled, "Saved sync payload locally");
                let message = if remote_enabled {
                    "Cloud sync unavailable, saved locally"
                } else {
                    "Saved locally"
                };
                self.notify(silent, NoticeLevel::Info, message);
                self.emit(SyncEvent::Synced {
                    origin: SyncOrigin::LocalFallback,
                });
                (SyncOutcome::LocalFallback, failed_phase)
            }
            Err(error) => {
                tracing::error!(user_id = %id, %error, "Local fallback write failed");
                self.notify(
                    silent,
                    NoticeLevel::Error,
                    &format!("Could not save data locally: {error}"),
                );
                (SyncOutcome::NoOp, SyncPhase::Failed)
            }
        }
    }

    async fn download(&self, silent: bool) {
        let remote_enabled = self.remote_enabled();
        let (outcome, phase) = match self.identity.get_or_create() {
            Ok(id) => self.fetch_payload(&id, remote_enabled, silent).await,
            Err(error) => {
                tracing::error!(%error, "Could not resolve user id for download");
                self.notify(
                    silent,
                    NoticeLevel::Error,
                    &format!("Sync failed: {error}"),
                );
                (SyncOutcome::NoOp, SyncPhase::Failed)
            }
        };
        self.finish(SyncDirection::Download, outcome, phase, remote_enabled)
            .await;
    }

    async fn fetch_payload(
        &self,
        id: &UserId,
        remote_enabled: bool,
        silent: bool,
    ) -> (SyncOutcome, SyncPhase) {
        if remote_enabled {
            match self.remote.read(id).await {
                Envelope {
                    success: true,
                    data: Some(payload),
                    ..
                } => {
                    return self.apply_payload(payload, SyncOrigin::Remote, silent);
                }
                failed => log_remote_failure(id, SyncDirection::Download, &failed),
            }
        }

        let miss_phase = if remote_enabled {
            SyncPhase::Failed
        } else {
            SyncPhase::Succeeded
        };
        match self.cache.read_fallback(id) {
            Ok(Some(payload)) => {
                let (outcome, phase) =
                    self.apply_payload(payload, SyncOrigin::LocalFallback, silent);
                if phase == SyncPhase::Succeeded {
                    (outcome, miss_phase)
                } else {
                    (outcome, phase)
                }
            }
            Ok(None) => {
                tracing::info!(user_id = %id, "No sync data found remotely or locally");
                self.notify(silent, NoticeLevel::Info, "No sync data found");
                (SyncOutcome::NoOp, miss_phase)
            }
            Err(error) => {
                tracing::error!(user_id = %id, %error, "Local fallback read failed");
                self.notify(
                    silent,
                    NoticeLevel::Error,
                    &format!("Could not read local copy: {error}"),
                );
                (SyncOutcome::NoOp, SyncPhase::Failed)
            }
        }
    }

    fn apply_payload(
        &self,
        payload: SyncPayload,
        origin: SyncOrigin,
        silent: bool,
    ) -> (SyncOutcome, SyncPhase) {
        if let Err(error) = self.device.apply(&payload) {
            tracing::error!(%error, ?origin, "Could not apply downloaded payload");
            self.notify(
                silent,
                NoticeLevel::Error,
                &format!("Could not apply synced data: {error}"),
            );
            return (SyncOutcome::NoOp, SyncPhase::Failed);
        }

        let (outcome, message) = match origin {
            SyncOrigin::Remote => (SyncOutcome::RemoteSuccess, "Synced from cloud"),
            SyncOrigin::LocalFallback => (SyncOutcome::LocalFallback, "Loaded local copy"),
        };
        tracing::info!(?origin, "Applied sync payload");
        self.notify(silent, NoticeLevel::Success, message);
        self.emit(SyncEvent::SyncCompleted { origin, payload });
        (outcome, SyncPhase::Succeeded)
    }

    /// Record the outcome, then release the lock after the grace delay.
    ///
    /// Cycles that never touched the network release immediately.
    async fn finish(
        &self,
        direction: SyncDirection,
        outcome: SyncOutcome,
        phase: SyncPhase,
        remote_enabled: bool,
    ) {
        self.lock_state().phase = phase;
        self.emit(SyncEvent::Finished { direction, outcome });

        if remote_enabled && !self.config.unlock_grace.is_zero() {
            tokio::time::sleep(self.config.unlock_grace).await;
        }

        {
            let mut state = self.lock_state();
            state.locked = false;
            state.phase = SyncPhase::Idle;
        }
        self.emit(SyncEvent::Idle);
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Unreachable stores and rejected requests both fall back to the local copy,
/// but only the former is expected to clear up on its own.
fn log_remote_failure<T>(id: &UserId, direction: SyncDirection, envelope: &Envelope<T>) {
    match envelope.to_error() {
        Some(error) if error.is_transport() => {
            tracing::warn!(
                user_id = %id,
                ?direction,
                %error,
                "Remote store unreachable, using local copy"
            );
        }
        Some(error) => {
            tracing::warn!(
                user_id = %id,
                ?direction,
                %error,
                "Remote store refused request, using local copy"
            );
        }
        None => {
            tracing::warn!(
                user_id = %id,
                ?direction,
                "Remote store returned no data, using local copy"
            );
        }
    }
}

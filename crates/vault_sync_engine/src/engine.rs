//! The sync engine handle.

use crate::config::{ConfigSource, SyncConfig, VaultSettings};
use crate::error::{SyncError, SyncResult};
use crate::state::{EngineState, SyncSnapshot};
use crate::transport::VaultTransport;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vault_sync_protocol::{ConflictKey, DocumentMerger, SyncProgress, SyncReport, SyncStatus};

pub(crate) struct Shared<T: VaultTransport> {
    pub config: SyncConfig,
    pub transport: T,
    pub settings: Arc<dyn ConfigSource>,
    pub merger: RwLock<Option<Arc<dyn DocumentMerger>>>,
    pub state: Mutex<EngineState>,
    pub publisher: watch::Sender<SyncSnapshot>,
}

impl<T: VaultTransport> Drop for Shared<T> {
    fn drop(&mut self) {
        self.state.get_mut().cancel_timers();
    }
}

/// Keeps one vault scope convergent with its remote copy.
///
/// The engine is a cheap handle: clones share the same state, timers and
/// transport. It is built once by the host, initialized with
/// [`SyncEngine::initialize`], and lives until [`SyncEngine::shutdown`] or
/// until the last clone is dropped.
///
/// Timers run on the Tokio runtime, so methods that arm them
/// ([`SyncEngine::schedule_push`], the sync operations, lifecycle hooks)
/// must be called from within a runtime.
pub struct SyncEngine<T: VaultTransport> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T: VaultTransport> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: VaultTransport> SyncEngine<T> {
    /// Creates an engine. Operations fail with `NotReady` until initialized.
    pub fn new(config: SyncConfig, transport: T, settings: impl ConfigSource + 'static) -> Self {
        let (publisher, _) = watch::channel(SyncSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                settings: Arc::new(settings),
                merger: RwLock::new(None),
                state: Mutex::new(EngineState::default()),
                publisher,
            }),
        }
    }

    /// Installs or removes the structured-document merger.
    ///
    /// Without a merger, documents changed on both sides surface as
    /// file-level conflicts.
    pub fn set_merger(&self, merger: Option<Arc<dyn DocumentMerger>>) {
        *self.shared.merger.write() = merger;
    }

    /// Builder-style [`SyncEngine::set_merger`].
    pub fn with_merger(self, merger: Arc<dyn DocumentMerger>) -> Self {
        self.set_merger(Some(merger));
        self
    }

    /// Initializes the transport from configuration and opens the engine.
    ///
    /// A transport failure is returned but still leaves the engine open;
    /// the next operation retries the initialization lazily.
    pub async fn initialize(&self) -> SyncResult<()> {
        let settings = self.shared.settings.settings();
        let outcome = match settings.endpoint() {
            Some(url) => {
                let result = self
                    .shared
                    .transport
                    .initialize(url, settings.api_key.as_deref())
                    .await;
                if let Err(err) = &result {
                    warn!(scope = %self.scope(), error = %err, "transport initialization failed");
                }
                result
            }
            None => {
                debug!(scope = %self.scope(), "no sync server configured");
                Ok(())
            }
        };

        self.update(|state| {
            state.initialized = true;
            state.shut_down = false;
            state.advance_timestamp();
        });
        info!(scope = %self.scope(), "sync engine initialized");
        outcome
    }

    /// Cancels every timer. Later timer fires and operations are rejected.
    pub fn shutdown(&self) {
        self.update(|state| {
            state.shut_down = true;
            state.cancel_timers();
        });
        info!(scope = %self.scope(), "sync engine shut down");
    }

    /// The engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// The vault scope this engine syncs.
    pub fn scope(&self) -> &str {
        &self.shared.config.scope
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.shared.state.lock().status
    }

    /// Message of the last failure while the status is `error`.
    pub fn error_message(&self) -> Option<String> {
        self.shared.state.lock().error_message.clone()
    }

    /// Progress of the running operation.
    pub fn progress(&self) -> Option<SyncProgress> {
        self.shared.state.lock().progress.clone()
    }

    /// Report of the last completed operation.
    pub fn last_result(&self) -> Option<SyncReport> {
        self.shared.state.lock().last_result.clone()
    }

    /// Boundary of the next incremental pull, as Unix seconds.
    pub fn last_sync_timestamp(&self) -> Option<f64> {
        self.shared.state.lock().last_sync_timestamp
    }

    /// Boundary of the next incremental pull, as a date.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let timestamp = self.last_sync_timestamp()?;
        DateTime::from_timestamp_micros((timestamp * 1e6).round() as i64)
    }

    /// Number of completed operations that pulled or merged something.
    pub fn pull_counter(&self) -> u64 {
        self.shared.state.lock().pull_counter
    }

    /// Unresolved conflicts in first-seen order.
    pub fn conflicts(&self) -> Vec<ConflictKey> {
        self.shared.state.lock().conflicts.keys().to_vec()
    }

    /// Paths waiting for the next push.
    pub fn pending_push_paths(&self) -> Vec<String> {
        self.shared.state.lock().pending.iter().cloned().collect()
    }

    /// Current published state.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.shared.state.lock().snapshot()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.shared.publisher.subscribe()
    }

    /// Marks a conflict as resolved. Returns false if it was not tracked.
    pub fn clear_conflict(&self, key: &ConflictKey) -> bool {
        let cleared = self.update(|state| state.conflicts.clear(key));
        if cleared {
            info!(scope = %self.scope(), conflict = %key, "conflict cleared");
        }
        cleared
    }

    /// Marks every conflict as resolved.
    pub fn clear_all_conflicts(&self) {
        self.update(|state| state.conflicts.clear_all());
    }

    /// Probes the server. Never changes engine state.
    pub async fn check_connection(&self) -> bool {
        self.shared.transport.is_server_reachable().await
    }

    /// Mutates state under the lock and publishes the result.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let mut state = self.shared.state.lock();
        let result = f(&mut state);
        self.shared.publisher.send_replace(state.snapshot());
        result
    }

    /// Reads state under the lock.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.shared.state.lock())
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<T>> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn upgrade(weak: &Weak<Shared<T>>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    pub(crate) fn merger(&self) -> Option<Arc<dyn DocumentMerger>> {
        self.shared.merger.read().clone()
    }

    /// Makes sure the transport has an endpoint, initializing it once if not.
    pub(crate) async fn ensure_transport_ready(&self) -> SyncResult<VaultSettings> {
        let settings = self.shared.settings.settings();
        if self.shared.transport.is_ready() {
            return Ok(settings);
        }

        let Some(url) = settings.endpoint() else {
            return Err(SyncError::NotConfigured);
        };

        debug!(scope = %self.scope(), "initializing transport lazily");
        if let Err(err) = self
            .shared
            .transport
            .initialize(url, settings.api_key.as_deref())
            .await
        {
            warn!(scope = %self.scope(), error = %err, "lazy transport initialization failed");
            return Err(SyncError::NotReady);
        }

        if self.shared.transport.is_ready() {
            Ok(settings)
        } else {
            Err(SyncError::NotReady)
        }
    }

    /// Arms the `success → idle` timer.
    pub(crate) fn arm_status_reset(&self, state: &mut EngineState) {
        let weak = self.downgrade();
        let delay = self.shared.config.status_reset_delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(engine) = Self::upgrade(&weak) {
                engine.update(|state| {
                    state.reset_task = None;
                    if state.status == SyncStatus::Success {
                        state.status = SyncStatus::Idle;
                    }
                });
            }
        });
        if let Some(previous) = state.reset_task.replace(task.abort_handle()) {
            previous.abort();
        }
    }
}

impl<T: VaultTransport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("scope", &self.shared.config.scope)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultSettings;
    use crate::memory::MemoryTransport;
    use vault_sync_protocol::EntryMerger;

    fn engine(settings: VaultSettings) -> SyncEngine<MemoryTransport> {
        SyncEngine::new(SyncConfig::new("daily"), MemoryTransport::new(), settings)
    }

    #[tokio::test]
    async fn initial_state() {
        let engine = engine(VaultSettings::default());
        assert_eq!(engine.status(), SyncStatus::Idle);
        assert_eq!(engine.pull_counter(), 0);
        assert_eq!(engine.last_sync_timestamp(), None);
        assert!(engine.conflicts().is_empty());
    }

    #[tokio::test]
    async fn initialize_sets_up_transport_and_timestamp() {
        let engine = engine(VaultSettings::new("https://vault.example.com"));
        engine.initialize().await.unwrap();

        assert!(engine.transport().is_ready());
        let timestamp = engine.last_sync_timestamp().unwrap();
        let time = engine.last_sync_time().unwrap();
        assert_eq!(time.timestamp_micros(), (timestamp * 1e6).round() as i64);
    }

    #[tokio::test]
    async fn initialize_without_endpoint_leaves_transport_unready() {
        let engine = engine(VaultSettings::default());
        engine.initialize().await.unwrap();

        assert!(!engine.transport().is_ready());
        assert!(engine.last_sync_timestamp().is_some());
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let engine = engine(VaultSettings::new("memory://"));
        let mut updates = engine.subscribe();
        engine.initialize().await.unwrap();

        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().last_sync_timestamp.is_some());
    }

    #[tokio::test]
    async fn merger_can_be_swapped() {
        let engine = engine(VaultSettings::default()).with_merger(Arc::new(EntryMerger::new()));
        assert!(engine.merger().is_some());
        engine.set_merger(None);
        assert!(engine.merger().is_none());
    }

    #[tokio::test]
    async fn clearing_conflicts() {
        let engine = engine(VaultSettings::default());
        let keys = [ConflictKey::file("a.md"), ConflictKey::entry("b.md", "x")];
        engine.update(|state| state.conflicts.add_conflicts(&keys));
        assert_eq!(engine.conflicts(), keys.to_vec());

        assert!(engine.clear_conflict(&keys[0]));
        assert_eq!(engine.snapshot().conflicts, vec![keys[1].clone()]);

        engine.clear_all_conflicts();
        assert!(engine.conflicts().is_empty());
    }

    #[tokio::test]
    async fn check_connection_passes_through() {
        let engine = engine(VaultSettings::new("memory://"));
        assert!(!engine.check_connection().await);

        engine.initialize().await.unwrap();
        assert!(engine.check_connection().await);

        engine.transport().set_reachable(false);
        assert!(!engine.check_connection().await);
    }
}

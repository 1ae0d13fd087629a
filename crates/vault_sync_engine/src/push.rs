//! Debounced push scheduling.
//!
//! Local edits are collected into a pending set and pushed in one batch once
//! no new edit has arrived for the configured quiet period. Every new
//! schedule restarts the quiet period.

use crate::config::DroppedPushPolicy;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::state::EngineState;
use crate::transport::VaultTransport;
use tracing::{debug, info, warn};

enum Claim {
    Nothing,
    Dropped { count: usize, requeued: bool },
    Push(Vec<String>),
}

impl<T: VaultTransport> SyncEngine<T> {
    /// Schedules `path` for the next push.
    pub fn schedule_push(&self, path: impl Into<String>) {
        self.schedule_push_batch([path.into()]);
    }

    /// Schedules several paths for the next push.
    ///
    /// Ignored after [`SyncEngine::shutdown`].
    pub fn schedule_push_batch<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = self.update(|state| {
            if state.shut_down {
                return None;
            }
            state.pending.extend(paths.into_iter().map(Into::into));
            self.arm_debounce(state);
            Some(state.pending.len())
        });

        match pending {
            Some(pending) => debug!(scope = %self.scope(), pending, "push scheduled"),
            None => debug!(scope = %self.scope(), "push ignored after shutdown"),
        }
    }

    /// Pushes every pending path now, skipping the quiet period.
    ///
    /// Returns the number of files the transport pushed. When the transport
    /// is not ready the batch is dropped or requeued per
    /// [`DroppedPushPolicy`] and `NotReady` is returned. When another
    /// operation is running, nothing is taken and `AlreadyInProgress` is
    /// returned.
    pub async fn flush_pending_push(&self) -> SyncResult<u64> {
        self.cancel_debounce();

        let ready = self.transport().is_ready();
        let policy = self.config().dropped_push_policy;
        let claim = self.update(|state| -> SyncResult<Claim> {
            if state.pending.is_empty() {
                return Ok(Claim::Nothing);
            }
            if !state.status.can_start_sync() {
                // Keep the batch and try again after another quiet period.
                if !state.shut_down {
                    self.arm_debounce(state);
                }
                return Err(SyncError::AlreadyInProgress);
            }
            if !ready || !state.initialized || state.shut_down {
                let count = state.pending.len();
                let requeued = policy == DroppedPushPolicy::Requeue;
                if !requeued {
                    state.pending.clear();
                }
                return Ok(Claim::Dropped { count, requeued });
            }
            state.begin()?;
            Ok(Claim::Push(std::mem::take(&mut state.pending).into_iter().collect()))
        })?;

        let paths = match claim {
            Claim::Nothing => return Ok(0),
            Claim::Dropped { count, requeued } => {
                warn!(scope = %self.scope(), count, requeued, "transport not ready; push dropped");
                return Err(SyncError::NotReady);
            }
            Claim::Push(paths) => paths,
        };

        debug!(scope = %self.scope(), count = paths.len(), "pushing");
        match self.transport().push(self.scope(), &paths).await {
            Ok(pushed) => {
                self.update(EngineState::finish_push);
                info!(scope = %self.scope(), pushed, "push complete");
                Ok(pushed)
            }
            Err(err) => {
                self.update(|state| state.fail(&err, false));
                warn!(scope = %self.scope(), error = %err, "push failed");
                Err(err)
            }
        }
    }

    /// Restarts the quiet period. Must be called with the state lock held.
    pub(crate) fn arm_debounce(&self, state: &mut EngineState) {
        state.debounce_generation += 1;
        let generation = state.debounce_generation;
        if let Some(previous) = state.debounce_task.take() {
            previous.abort();
        }

        let weak = self.downgrade();
        let delay = self.config().debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(engine) = Self::upgrade(&weak) else {
                return;
            };

            // Detach from the slot so a later schedule cannot abort this push.
            let current = engine.update(|state| {
                if state.debounce_generation != generation {
                    return false;
                }
                state.debounce_task = None;
                true
            });
            if current {
                engine.fire_debounce().await;
            }
        });
        state.debounce_task = Some(task.abort_handle());
    }

    /// Stops the quiet-period timer without touching the pending set.
    pub(crate) fn cancel_debounce(&self) {
        self.update(|state| {
            state.debounce_generation += 1;
            if let Some(task) = state.debounce_task.take() {
                task.abort();
            }
        });
    }

    async fn fire_debounce(&self) {
        if let Err(SyncError::AlreadyInProgress) = self.flush_pending_push().await {
            debug!(scope = %self.scope(), "sync running; push deferred");
        }
    }
}

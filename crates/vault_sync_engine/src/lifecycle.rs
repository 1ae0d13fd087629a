//! Host lifecycle hooks.

use crate::config::SyncStrategy;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::transport::VaultTransport;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

impl<T: VaultTransport> SyncEngine<T> {
    /// The host went to the background: flush pending pushes now.
    ///
    /// Stops periodic pulls. A pull already in flight is not cancelled.
    pub async fn on_background(&self) -> SyncResult<u64> {
        self.stop_periodic_pull();
        if self.read(|state| state.pending.is_empty()) {
            return Ok(0);
        }

        info!(scope = %self.scope(), "flushing pending pushes on background");
        self.flush_pending_push().await
    }

    /// The host came back to the foreground.
    ///
    /// With [`SyncStrategy::PeriodicPull`] this pulls right away and then
    /// on every interval until the next [`SyncEngine::on_background`].
    pub fn on_foreground(&self) {
        match self.config().strategy {
            SyncStrategy::PushOnChange => {
                debug!(scope = %self.scope(), "foreground; nothing to do");
            }
            SyncStrategy::PeriodicPull { interval } => self.start_periodic_pull(interval),
        }
    }

    fn start_periodic_pull(&self, interval: Duration) {
        let started = self.update(|state| {
            if state.shut_down || state.periodic_task.is_some() {
                return false;
            }

            let weak = self.downgrade();
            let task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let Some(engine) = Self::upgrade(&weak) else {
                        break;
                    };
                    // Detached so stopping the loop never cancels a pull mid-flight.
                    tokio::spawn(async move {
                        match engine.pull_changes().await {
                            Ok(_) => {}
                            Err(err @ (SyncError::AlreadyInProgress | SyncError::NotConfigured)) => {
                                debug!(scope = %engine.scope(), error = %err, "periodic pull skipped");
                            }
                            Err(err) => {
                                warn!(scope = %engine.scope(), error = %err, "periodic pull failed");
                            }
                        }
                    });
                }
            });
            state.periodic_task = Some(task.abort_handle());
            true
        });
        if started {
            info!(scope = %self.scope(), ?interval, "periodic pull started");
        }
    }

    fn stop_periodic_pull(&self) {
        let stopped = self.update(|state| match state.periodic_task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        });
        if stopped {
            info!(scope = %self.scope(), "periodic pull stopped");
        }
    }
}

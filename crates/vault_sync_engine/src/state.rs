//! Sync state machine.
//!
//! All mutable engine state lives in one [`EngineState`] behind a single
//! mutex, so every gate check and its transition happen atomically.

use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use std::collections::BTreeSet;
use tokio::task::AbortHandle;
use vault_sync_protocol::{ConflictKey, ConflictTracker, SyncProgress, SyncReport, SyncStatus};

/// Smallest step the sync timestamp advances by when the clock has not moved.
const TIMESTAMP_STEP: f64 = 1e-6;

/// Current wall-clock time as Unix seconds.
pub(crate) fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1e6
}

/// Published view of the engine, as read by UI observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSnapshot {
    /// Current status.
    pub status: SyncStatus,
    /// Message of the last failure while `status` is `error`.
    pub error_message: Option<String>,
    /// Progress of the running operation.
    pub progress: Option<SyncProgress>,
    /// Report of the last completed operation.
    pub last_result: Option<SyncReport>,
    /// Boundary for the next incremental pull (Unix seconds).
    pub last_sync_timestamp: Option<f64>,
    /// Number of completed operations that brought changes.
    pub pull_counter: u64,
    /// Unresolved conflicts.
    pub conflicts: Vec<ConflictKey>,
    /// Paths waiting for the next push.
    pub pending_pushes: usize,
}

/// Mutable engine state.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub initialized: bool,
    pub shut_down: bool,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub progress: Option<SyncProgress>,
    pub last_result: Option<SyncReport>,
    pub last_sync_timestamp: Option<f64>,
    pub pull_counter: u64,
    pub conflicts: ConflictTracker,
    pub pending: BTreeSet<String>,
    pub debounce_generation: u64,
    pub debounce_task: Option<AbortHandle>,
    pub reset_task: Option<AbortHandle>,
    pub periodic_task: Option<AbortHandle>,
}

impl EngineState {
    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            status: self.status,
            error_message: self.error_message.clone(),
            progress: self.progress.clone(),
            last_result: self.last_result.clone(),
            last_sync_timestamp: self.last_sync_timestamp,
            pull_counter: self.pull_counter,
            conflicts: self.conflicts.keys().to_vec(),
            pending_pushes: self.pending.len(),
        }
    }

    /// Gate check without side effects.
    pub fn check_can_start(&self) -> SyncResult<()> {
        if !self.initialized || self.shut_down {
            return Err(SyncError::NotReady);
        }
        if !self.status.can_start_sync() {
            return Err(SyncError::AlreadyInProgress);
        }
        Ok(())
    }

    /// Claims the engine for an operation: `* → syncing`.
    pub fn begin(&mut self) -> SyncResult<()> {
        self.check_can_start()?;
        if let Some(reset) = self.reset_task.take() {
            reset.abort();
        }
        self.status = SyncStatus::Syncing;
        self.error_message = None;
        self.progress = None;
        Ok(())
    }

    /// Ends a push: `syncing → idle`.
    pub fn finish_push(&mut self) {
        self.status = SyncStatus::Idle;
        self.progress = None;
    }

    /// Records a completed pull-type operation.
    ///
    /// Returns true if the status became `success` and the reset timer
    /// should be armed.
    pub fn finish_pull(&mut self, report: SyncReport) -> bool {
        self.progress = None;
        self.conflicts.add_conflicts(&report.conflicts);
        if report.brought_changes() {
            self.pull_counter += 1;
        }

        let succeeded = report.success;
        if succeeded {
            self.advance_timestamp();
            self.status = SyncStatus::Success;
            self.error_message = None;
        } else {
            self.status = SyncStatus::Error;
            self.error_message = Some(report.error_message());
        }
        self.last_result = Some(report);
        succeeded
    }

    /// Records a failed operation: `syncing → error`.
    pub fn fail(&mut self, error: &SyncError, record_result: bool) {
        self.progress = None;
        self.status = SyncStatus::Error;
        self.error_message = Some(error.to_string());
        if record_result {
            self.last_result = Some(SyncReport::failure(error.to_string()));
        }
    }

    /// Moves the incremental-pull boundary to now, strictly forward.
    pub fn advance_timestamp(&mut self) {
        let now = unix_now();
        self.last_sync_timestamp = Some(match self.last_sync_timestamp {
            Some(previous) if now <= previous => previous + TIMESTAMP_STEP,
            _ => now,
        });
    }

    /// Cancels every timer.
    pub fn cancel_timers(&mut self) {
        for handle in [
            self.debounce_task.take(),
            self.reset_task.take(),
            self.periodic_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ready_state() -> EngineState {
        EngineState {
            initialized: true,
            ..EngineState::default()
        }
    }

    #[test]
    fn uninitialized_state_is_not_ready() {
        let mut state = EngineState::default();
        assert_eq!(state.begin(), Err(SyncError::NotReady));
        assert_eq!(state.status, SyncStatus::Idle);
    }

    #[test]
    fn begin_while_syncing_has_no_side_effects() {
        let mut state = ready_state();
        state.begin().unwrap();
        state.error_message = Some("kept".into());

        assert_eq!(state.begin(), Err(SyncError::AlreadyInProgress));
        assert_eq!(state.status, SyncStatus::Syncing);
        assert_eq!(state.error_message.as_deref(), Some("kept"));
    }

    #[test]
    fn begin_from_error_and_success() {
        let mut state = ready_state();
        state.status = SyncStatus::Error;
        assert!(state.begin().is_ok());

        state.status = SyncStatus::Success;
        assert!(state.begin().is_ok());
        assert_eq!(state.status, SyncStatus::Syncing);
    }

    #[test]
    fn finish_pull_success() {
        let mut state = ready_state();
        state.begin().unwrap();

        let armed = state.finish_pull(SyncReport::pulled(2));
        assert!(armed);
        assert_eq!(state.status, SyncStatus::Success);
        assert_eq!(state.pull_counter, 1);
        assert!(state.last_sync_timestamp.is_some());
    }

    #[test]
    fn finish_pull_failure_keeps_timestamp() {
        let mut state = ready_state();
        state.last_sync_timestamp = Some(42.0);
        state.begin().unwrap();

        let report = SyncReport {
            success: false,
            errors: vec!["a".into(), "b".into()],
            ..SyncReport::default()
        };
        assert!(!state.finish_pull(report));
        assert_eq!(state.status, SyncStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some("a, b"));
        assert_eq!(state.last_sync_timestamp, Some(42.0));
        assert_eq!(state.pull_counter, 0);
    }

    #[test]
    fn pull_counter_tracks_merges() {
        let mut state = ready_state();
        let report = SyncReport {
            success: true,
            merged: 1,
            ..SyncReport::default()
        };
        state.finish_pull(report);
        state.finish_pull(SyncReport::empty());
        assert_eq!(state.pull_counter, 1);
    }

    #[test]
    fn timestamp_strictly_increases() {
        let mut state = ready_state();
        state.last_sync_timestamp = Some(unix_now() + 1_000.0);
        let before = state.last_sync_timestamp.unwrap();
        state.advance_timestamp();
        assert!(state.last_sync_timestamp.unwrap() > before);
    }

    #[test]
    fn fail_records_message() {
        let mut state = ready_state();
        state.begin().unwrap();
        state.fail(&SyncError::transport_retryable("HTTP 502"), true);

        assert_eq!(state.status, SyncStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some("HTTP 502"));
        assert_eq!(
            state.last_result,
            Some(SyncReport::failure("HTTP 502"))
        );
    }

    proptest! {
        #[test]
        fn timestamp_only_moves_forward_on_success(
            outcomes in prop::collection::vec(any::<bool>(), 1..20)
        ) {
            let mut state = ready_state();
            state.advance_timestamp();
            let mut previous = state.last_sync_timestamp.unwrap();

            for success in outcomes {
                state.begin().unwrap();
                let report = SyncReport { success, ..SyncReport::default() };
                state.finish_pull(report);
                let current = state.last_sync_timestamp.unwrap();
                if success {
                    prop_assert!(current > previous);
                } else {
                    prop_assert_eq!(current, previous);
                }
                previous = current;
            }
        }
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut state = ready_state();
        state.pending.insert("a.md".into());
        state.conflicts.add_conflicts(&[ConflictKey::file("b.md")]);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.pending_pushes, 1);
        assert_eq!(snapshot.conflicts, vec![ConflictKey::file("b.md")]);
        assert_eq!(snapshot.status, SyncStatus::Idle);
    }
}

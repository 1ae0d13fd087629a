//! Pull-type operations: incremental pull, full sync and date sync.
//!
//! All three share one shape. The gate is checked first and rejects the
//! call without touching state; the transport is then made ready, the
//! engine is claimed, and the outcome is recorded as `success` or `error`.

use crate::config::VaultSettings;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::transport::{SyncRequest, VaultTransport};
use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};
use vault_sync_protocol::{SyncProgress, SyncReport};

impl<T: VaultTransport> SyncEngine<T> {
    /// Pulls remote files changed since the last successful sync.
    pub async fn pull_changes(&self) -> SyncResult<SyncReport> {
        let settings = self.prepare().await?;
        let since = self.read(|state| state.last_sync_timestamp).unwrap_or(0.0);
        let pattern = &self.config().pull_pattern;

        let paths = match self
            .transport()
            .list_changes(self.scope(), since, pattern, settings.include_binary())
            .await
        {
            Ok(paths) => paths,
            Err(err) => return Err(self.record_failure(SyncError::ChangeListing(err.to_string()))),
        };
        debug!(scope = %self.scope(), since, changed = paths.len(), "listed remote changes");

        let report = if paths.is_empty() {
            SyncReport::empty()
        } else {
            match self.transport().pull(self.scope(), &paths).await {
                Ok(pulled) => SyncReport::pulled(pulled),
                Err(err) => return Err(self.record_failure(err)),
            }
        };
        Ok(self.record_report("pull", report))
    }

    /// Reconciles everything matching `pattern` in both directions.
    pub async fn sync(&self, pattern: &str) -> SyncResult<SyncReport> {
        let settings = self.prepare().await?;
        let merger = self.merger();
        let progress = |update: SyncProgress| self.update(|state| state.progress = Some(update));
        let request = SyncRequest {
            pattern,
            include_binary: settings.include_binary(),
            merger: merger.as_deref(),
            progress: &progress,
        };

        match self.transport().full_sync(request).await {
            Ok(report) => Ok(self.record_report("full sync", report)),
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Reconciles the files relevant to one day.
    pub async fn sync_date(&self, date: NaiveDate) -> SyncResult<SyncReport> {
        let settings = self.prepare().await?;
        let day = date.format("%Y-%m-%d").to_string();
        let merger = self.merger();
        let progress = |update: SyncProgress| self.update(|state| state.progress = Some(update));
        let request = SyncRequest {
            pattern: "*",
            include_binary: settings.include_binary(),
            merger: merger.as_deref(),
            progress: &progress,
        };

        match self.transport().date_sync(&day, request).await {
            Ok(report) => Ok(self.record_report("date sync", report)),
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// [`SyncEngine::sync_date`] for the local calendar day.
    pub async fn sync_today(&self) -> SyncResult<SyncReport> {
        self.sync_date(Local::now().date_naive()).await
    }

    // Gate, lazy transport init, claim. Gate errors leave state untouched.
    async fn prepare(&self) -> SyncResult<VaultSettings> {
        self.read(|state| state.check_can_start())?;
        let settings = self.ensure_transport_ready().await?;
        self.update(|state| state.begin())?;
        Ok(settings)
    }

    fn record_report(&self, operation: &str, report: SyncReport) -> SyncReport {
        self.update(|state| {
            if state.finish_pull(report.clone()) {
                self.arm_status_reset(state);
            }
        });

        if report.success {
            info!(
                scope = %self.scope(),
                operation,
                pulled = report.pulled,
                pushed = report.pushed,
                merged = report.merged,
                conflicts = report.conflicts.len(),
                "sync complete"
            );
        } else {
            warn!(scope = %self.scope(), operation, errors = %report.error_message(), "sync reported failure");
        }
        report
    }

    fn record_failure(&self, err: SyncError) -> SyncError {
        self.update(|state| state.fail(&err, true));
        warn!(scope = %self.scope(), error = %err, "sync failed");
        err
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{SyncConfig, VaultSettings};
    use crate::engine::SyncEngine;
    use crate::error::SyncError;
    use crate::memory::{MemoryTransport, TransportCall};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::Duration;
    use vault_sync_protocol::{ConflictKey, EntryMerger, SyncReport, SyncStatus};

    async fn ready_engine() -> SyncEngine<MemoryTransport> {
        let engine = SyncEngine::new(
            SyncConfig::new("daily"),
            MemoryTransport::new(),
            VaultSettings::new("memory://"),
        );
        engine.initialize().await.unwrap();
        engine
    }

    #[tokio::test(start_paused = true)]
    async fn pull_uses_last_sync_timestamp() {
        let engine = ready_engine().await;
        let since = engine.last_sync_timestamp().unwrap();
        engine.transport().put_remote_at("old.md", "x", since - 10.0);
        engine.transport().put_remote_at("new.md", "y", since + 10.0);

        let report = engine.pull_changes().await.unwrap();
        assert_eq!(report, SyncReport::pulled(1));
        assert_eq!(engine.transport().local("new.md").as_deref(), Some("y"));
        assert_eq!(engine.transport().local("old.md"), None);
        assert!(engine.last_sync_timestamp().unwrap() > since);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pull_succeeds_without_pull_call() {
        let engine = ready_engine().await;
        let report = engine.pull_changes().await.unwrap();

        assert_eq!(report, SyncReport::empty());
        assert_eq!(engine.status(), SyncStatus::Success);
        assert_eq!(engine.pull_counter(), 0);
        assert!(!engine
            .transport()
            .calls()
            .iter()
            .any(|call| matches!(call, TransportCall::Pull { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn listing_failure_is_wrapped() {
        let engine = ready_engine().await;
        engine.transport().fail_next("HTTP 500");

        let err = engine.pull_changes().await.unwrap_err();
        assert_eq!(err, SyncError::ChangeListing("HTTP 500".into()));
        assert_eq!(engine.status(), SyncStatus::Error);
        assert_eq!(
            engine.error_message().as_deref(),
            Some("failed to get changes: HTTP 500")
        );
        assert_eq!(engine.last_result().map(|r| r.success), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_to_idle() {
        let engine = ready_engine().await;
        engine.pull_changes().await.unwrap();
        assert_eq!(engine.status(), SyncStatus::Success);

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(engine.status(), SyncStatus::Success);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.status(), SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn new_operation_cancels_pending_reset() {
        let engine = ready_engine().await;
        engine.pull_changes().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        engine.pull_changes().await.unwrap();

        // The first reset would have fired at 3s.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(engine.status(), SyncStatus::Success);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(engine.status(), SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn date_sync_records_conflicts_and_counter() {
        let daily = "Daily/2026-02-09.md";
        let transport = MemoryTransport::new();
        transport.seed_synced(daily, "<!-- entry:abc -->\noriginal\n");
        transport.write_local(daily, "<!-- entry:abc -->\nlocal edit\n");
        transport.put_remote(daily, "<!-- entry:abc -->\nremote edit\n");
        transport.put_remote("Chat/2026-02-09.md", "hello");

        let engine = SyncEngine::new(
            SyncConfig::new("daily"),
            transport,
            VaultSettings::new("memory://"),
        )
        .with_merger(Arc::new(EntryMerger::new()));
        engine.initialize().await.unwrap();
        let before = engine.last_sync_timestamp().unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        let report = engine.sync_date(date).await.unwrap();

        assert_eq!(report.pulled, 1);
        assert_eq!(engine.conflicts(), vec![ConflictKey::entry(daily, "abc")]);
        assert_eq!(engine.pull_counter(), 1);
        assert!(engine.last_sync_timestamp().unwrap() > before);
        assert_eq!(engine.status(), SyncStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn date_sync_formats_day() {
        let engine = ready_engine().await;
        engine.transport().put_remote("Daily/2026-02-09.md", "today");

        let date = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        let report = engine.sync_date(date).await.unwrap();
        assert_eq!(report.pulled, 1);
        assert!(engine.transport().calls().contains(&TransportCall::DateSync {
            date: "2026-02-09".into(),
            include_binary: false,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn full_sync_passes_mode() {
        let engine = SyncEngine::new(
            SyncConfig::new("vault"),
            MemoryTransport::new(),
            VaultSettings::new("memory://").with_sync_mode(vault_sync_protocol::SyncMode::Full),
        );
        engine.initialize().await.unwrap();
        engine.sync("Chat/*").await.unwrap();

        assert!(engine.transport().calls().contains(&TransportCall::FullSync {
            pattern: "Chat/*".into(),
            include_binary: true,
        }));
        assert_eq!(
            engine.progress(),
            None,
            "progress is cleared once the sync finishes"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_engine_stays_idle() {
        let engine = SyncEngine::new(
            SyncConfig::new("daily"),
            MemoryTransport::new(),
            VaultSettings::default(),
        );
        engine.initialize().await.unwrap();

        assert_eq!(engine.sync("*").await, Err(SyncError::NotConfigured));
        assert_eq!(engine.status(), SyncStatus::Idle);
        assert_eq!(engine.last_result(), None);
    }
}

//! Transport layer abstraction for vault sync.

use crate::error::SyncResult;
use async_trait::async_trait;
use std::fmt;
use vault_sync_protocol::{DocumentMerger, SyncProgress, SyncReport};

/// Callback receiving progress updates from long-running syncs.
pub type ProgressFn<'a> = dyn Fn(SyncProgress) + Send + Sync + 'a;

/// Parameters for a full or date-scoped sync.
pub struct SyncRequest<'a> {
    /// Paths taking part in the sync.
    pub pattern: &'a str,
    /// Whether binary attachments take part.
    pub include_binary: bool,
    /// Merger for documents changed on both sides, if one is installed.
    pub merger: Option<&'a dyn DocumentMerger>,
    /// Progress sink.
    pub progress: &'a ProgressFn<'a>,
}

impl<'a> SyncRequest<'a> {
    /// Reports progress.
    pub fn report(&self, phase: &str, current: u64, total: u64) {
        (self.progress)(SyncProgress::new(phase, current, total));
    }
}

impl fmt::Debug for SyncRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRequest")
            .field("pattern", &self.pattern)
            .field("include_binary", &self.include_binary)
            .field("merger", &self.merger.is_some())
            .finish()
    }
}

/// Network client talking to the remote vault.
///
/// Implementations own the wire protocol, timeouts and per-file error
/// handling. Scopes and paths are opaque to the engine and passed through.
#[async_trait]
pub trait VaultTransport: Send + Sync + 'static {
    /// Points the transport at an endpoint. May be called again to re-initialize.
    async fn initialize(&self, server_url: &str, api_key: Option<&str>) -> SyncResult<()>;

    /// Returns true once the transport has a usable endpoint.
    fn is_ready(&self) -> bool;

    /// Liveness check, independent of [`VaultTransport::is_ready`].
    async fn is_server_reachable(&self) -> bool;

    /// Uploads local files. Returns how many were pushed.
    async fn push(&self, scope: &str, paths: &[String]) -> SyncResult<u64>;

    /// Downloads remote files. Returns how many were pulled.
    async fn pull(&self, scope: &str, paths: &[String]) -> SyncResult<u64>;

    /// Lists remote paths changed after `since` (Unix seconds).
    async fn list_changes(
        &self,
        scope: &str,
        since: f64,
        pattern: &str,
        include_binary: bool,
    ) -> SyncResult<Vec<String>>;

    /// Reconciles everything matching the request's pattern in both directions.
    async fn full_sync(&self, request: SyncRequest<'_>) -> SyncResult<SyncReport>;

    /// Reconciles the files relevant to one day (`YYYY-MM-DD`).
    async fn date_sync(&self, date: &str, request: SyncRequest<'_>) -> SyncResult<SyncReport>;
}

//! In-memory transport.
//!
//! [`MemoryTransport`] keeps a local and a remote vault in process and
//! implements the complete [`VaultTransport`] contract against them. It
//! records every call, which makes it the transport of choice for tests
//! and for hosts running without a server.

use crate::error::{SyncError, SyncResult};
use crate::transport::{SyncRequest, VaultTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use vault_sync_protocol::{is_syncable, ConflictKey, MergeOutcome, SyncReport};

/// A call received by a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    /// `initialize`
    Initialize {
        /// Endpoint.
        server_url: String,
    },
    /// `push`
    Push {
        /// Scope.
        scope: String,
        /// Paths sent.
        paths: Vec<String>,
    },
    /// `pull`
    Pull {
        /// Scope.
        scope: String,
        /// Paths requested.
        paths: Vec<String>,
    },
    /// `list_changes`
    ListChanges {
        /// Scope.
        scope: String,
        /// Lower timestamp bound.
        since: f64,
        /// Pattern.
        pattern: String,
        /// Whether binaries were included.
        include_binary: bool,
    },
    /// `full_sync`
    FullSync {
        /// Pattern.
        pattern: String,
        /// Whether binaries were included.
        include_binary: bool,
    },
    /// `date_sync`
    DateSync {
        /// Day, `YYYY-MM-DD`.
        date: String,
        /// Whether binaries were included.
        include_binary: bool,
    },
}

impl TransportCall {
    /// Returns true for calls that reach the remote vault.
    pub fn is_network(&self) -> bool {
        !matches!(self, TransportCall::Initialize { .. })
    }
}

#[derive(Debug, Clone)]
struct RemoteFile {
    content: String,
    modified: f64,
}

#[derive(Debug, Default)]
struct VaultState {
    local: BTreeMap<String, String>,
    remote: BTreeMap<String, RemoteFile>,
    // Last version both sides agreed on, per path.
    base: BTreeMap<String, String>,
    endpoint: Option<String>,
    unreachable: bool,
    fail_next: Option<String>,
    reject_next_sync: Option<Vec<String>>,
    calls: Vec<TransportCall>,
}

/// Transport backed by in-process local and remote file maps.
///
/// Clones share the same vaults.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<VaultState>>,
    latency: Duration,
}

impl MemoryTransport {
    /// Creates an uninitialized transport with empty vaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport already initialized against `server_url`.
    pub fn connected(server_url: impl Into<String>) -> Self {
        let transport = Self::new();
        transport.state.lock().endpoint = Some(server_url.into());
        transport
    }

    /// Delays every network call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Writes a local file, as an editor would.
    pub fn write_local(&self, path: &str, content: &str) {
        self.state
            .lock()
            .local
            .insert(path.to_string(), content.to_string());
    }

    /// Deletes a local file.
    pub fn delete_local(&self, path: &str) {
        self.state.lock().local.remove(path);
    }

    /// Reads a local file.
    pub fn local(&self, path: &str) -> Option<String> {
        self.state.lock().local.get(path).cloned()
    }

    /// Writes a remote file stamped with the current time.
    pub fn put_remote(&self, path: &str, content: &str) {
        self.put_remote_at(path, content, crate::state::unix_now());
    }

    /// Writes a remote file with an explicit modification time.
    pub fn put_remote_at(&self, path: &str, content: &str, modified: f64) {
        self.state.lock().remote.insert(
            path.to_string(),
            RemoteFile {
                content: content.to_string(),
                modified,
            },
        );
    }

    /// Reads a remote file.
    pub fn remote(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .remote
            .get(path)
            .map(|file| file.content.clone())
    }

    /// Puts the same content on both sides as the last synced version.
    pub fn seed_synced(&self, path: &str, content: &str) {
        let mut state = self.state.lock();
        state.local.insert(path.to_string(), content.to_string());
        state.base.insert(path.to_string(), content.to_string());
        state.remote.insert(
            path.to_string(),
            RemoteFile {
                content: content.to_string(),
                modified: 0.0,
            },
        );
    }

    /// Makes the next network call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    /// Makes the next full or date sync report failure with `errors`.
    pub fn reject_next_sync(&self, errors: Vec<String>) {
        self.state.lock().reject_next_sync = Some(errors);
    }

    /// Toggles whether the server answers liveness checks.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unreachable = !reachable;
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().calls.clone()
    }

    /// Paths of every push call, in order.
    pub fn push_calls(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Push { paths, .. } => Some(paths.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of calls that reached the remote vault.
    pub fn network_call_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_network())
            .count()
    }

    async fn network_delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl VaultState {
    fn check_network(&mut self) -> SyncResult<()> {
        if let Some(message) = self.fail_next.take() {
            return Err(SyncError::transport_retryable(message));
        }
        if self.endpoint.is_none() {
            return Err(SyncError::transport_fatal("transport not initialized"));
        }
        Ok(())
    }

    fn reconcile<F>(&mut self, request: &SyncRequest<'_>, filter: F) -> SyncReport
    where
        F: Fn(&str) -> bool,
    {
        if let Some(errors) = self.reject_next_sync.take() {
            return SyncReport {
                success: false,
                errors,
                ..SyncReport::default()
            };
        }

        let paths: BTreeSet<String> = self
            .local
            .keys()
            .chain(self.remote.keys())
            .chain(self.base.keys())
            .filter(|path| is_syncable(path, request.pattern, request.include_binary))
            .filter(|path| filter(path))
            .cloned()
            .collect();

        let total = paths.len() as u64;
        let mut report = SyncReport::empty();

        for (index, path) in paths.iter().enumerate() {
            request.report("syncing", index as u64, total);

            let base = self.base.get(path).cloned();
            let local = self.local.get(path).cloned();
            let remote = self.remote.get(path).map(|file| file.content.clone());

            let local_changed = local != base;
            let remote_changed = remote != base;

            match (local_changed, remote_changed) {
                (false, false) => {}
                (true, false) => {
                    self.apply_everywhere(path, local, false, true);
                    report.pushed += 1;
                }
                (false, true) => {
                    self.apply_everywhere(path, remote, true, false);
                    report.pulled += 1;
                }
                (true, true) if local == remote => {
                    self.apply_everywhere(path, local, false, false);
                }
                (true, true) => match (&local, &remote, request.merger) {
                    (Some(l), Some(r), Some(merger)) if merger.can_merge(path) => {
                        match merger.merge(path, base.as_deref(), l, r) {
                            MergeOutcome::Merged(text) => {
                                self.apply_everywhere(path, Some(text), true, true);
                                report.merged += 1;
                            }
                            MergeOutcome::Conflicts(keys) => report.conflicts.extend(keys),
                        }
                    }
                    _ => report.conflicts.push(ConflictKey::file(path.as_str())),
                },
            }
        }

        request.report("done", total, total);
        report
    }

    // Makes `content` the agreed version of `path`, writing the chosen sides.
    fn apply_everywhere(
        &mut self,
        path: &str,
        content: Option<String>,
        write_local: bool,
        write_remote: bool,
    ) {
        match content {
            Some(content) => {
                if write_local {
                    self.local.insert(path.to_string(), content.clone());
                }
                if write_remote {
                    self.remote.insert(
                        path.to_string(),
                        RemoteFile {
                            content: content.clone(),
                            modified: crate::state::unix_now(),
                        },
                    );
                }
                self.base.insert(path.to_string(), content);
            }
            None => {
                if write_local {
                    self.local.remove(path);
                }
                if write_remote {
                    self.remote.remove(path);
                }
                self.base.remove(path);
            }
        }
    }
}

#[async_trait]
impl VaultTransport for MemoryTransport {
    async fn initialize(&self, server_url: &str, _api_key: Option<&str>) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Initialize {
            server_url: server_url.to_string(),
        });
        if server_url.trim().is_empty() {
            return Err(SyncError::transport_fatal("invalid server url"));
        }
        state.endpoint = Some(server_url.to_string());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state.lock().endpoint.is_some()
    }

    async fn is_server_reachable(&self) -> bool {
        self.network_delay().await;
        let state = self.state.lock();
        state.endpoint.is_some() && !state.unreachable
    }

    async fn push(&self, scope: &str, paths: &[String]) -> SyncResult<u64> {
        self.network_delay().await;
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Push {
            scope: scope.to_string(),
            paths: paths.to_vec(),
        });
        state.check_network()?;

        let mut pushed = 0;
        for path in paths {
            let content = state.local.get(path).cloned();
            state.apply_everywhere(path, content, false, true);
            pushed += 1;
        }
        Ok(pushed)
    }

    async fn pull(&self, scope: &str, paths: &[String]) -> SyncResult<u64> {
        self.network_delay().await;
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Pull {
            scope: scope.to_string(),
            paths: paths.to_vec(),
        });
        state.check_network()?;

        let mut pulled = 0;
        for path in paths {
            // Files gone from the remote since listing are skipped.
            let Some(content) = state.remote.get(path).map(|f| f.content.clone()) else {
                continue;
            };
            state.apply_everywhere(path, Some(content), true, false);
            pulled += 1;
        }
        Ok(pulled)
    }

    async fn list_changes(
        &self,
        scope: &str,
        since: f64,
        pattern: &str,
        include_binary: bool,
    ) -> SyncResult<Vec<String>> {
        self.network_delay().await;
        let mut state = self.state.lock();
        state.calls.push(TransportCall::ListChanges {
            scope: scope.to_string(),
            since,
            pattern: pattern.to_string(),
            include_binary,
        });
        state.check_network()?;

        Ok(state
            .remote
            .iter()
            .filter(|(_, file)| file.modified > since)
            .filter(|(path, _)| is_syncable(path, pattern, include_binary))
            .map(|(path, _)| path.clone())
            .collect())
    }

    async fn full_sync(&self, request: SyncRequest<'_>) -> SyncResult<SyncReport> {
        self.network_delay().await;
        let mut state = self.state.lock();
        state.calls.push(TransportCall::FullSync {
            pattern: request.pattern.to_string(),
            include_binary: request.include_binary,
        });
        state.check_network()?;
        Ok(state.reconcile(&request, |_| true))
    }

    async fn date_sync(&self, date: &str, request: SyncRequest<'_>) -> SyncResult<SyncReport> {
        self.network_delay().await;
        let mut state = self.state.lock();
        state.calls.push(TransportCall::DateSync {
            date: date.to_string(),
            include_binary: request.include_binary,
        });
        state.check_network()?;
        Ok(state.reconcile(&request, |path| path.contains(date)))
    }
}

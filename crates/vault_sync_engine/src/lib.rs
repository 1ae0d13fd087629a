//! # Vault Sync Engine
//!
//! Keeps a local vault of notes convergent with a remote copy.
//!
//! This crate provides:
//! - A sync coordinator ([`SyncEngine`]) with an `idle → syncing →
//!   success | error` status machine
//! - Debounced, batched pushes of locally changed paths
//! - Incremental pulls driven by the last successful sync time
//! - Full and per-day reconciliation with structured-document merging
//! - Conflict tracking until the user resolves them
//! - Host lifecycle hooks (background flush, periodic pull)
//! - A transport abstraction and an in-memory transport
//!
//! ## Key Invariants
//!
//! - At most one pull-type operation or push runs at a time
//! - A rejected operation leaves every observable field untouched
//! - The incremental-pull boundary only moves forward, and only on success
//! - Conflicts survive until cleared explicitly
//!
//! ## Example
//!
//! ```no_run
//! use vault_sync_engine::{MemoryTransport, SyncConfig, SyncEngine, VaultSettings};
//!
//! # async fn run() -> vault_sync_engine::SyncResult<()> {
//! let engine = SyncEngine::new(
//!     SyncConfig::new("daily"),
//!     MemoryTransport::new(),
//!     VaultSettings::from_env(),
//! );
//! engine.initialize().await?;
//!
//! engine.schedule_push("Daily/2026-02-09.md");
//! let report = engine.pull_changes().await?;
//! println!("pulled {} files", report.pulled);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod lifecycle;
mod memory;
mod pull;
mod push;
mod state;
mod transport;

pub use config::{
    ConfigSource, DroppedPushPolicy, SharedSettings, SyncConfig, SyncStrategy, VaultSettings,
    ENV_API_KEY, ENV_SERVER_URL, ENV_SYNC_MODE,
};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use memory::{MemoryTransport, TransportCall};
pub use state::SyncSnapshot;
pub use transport::{ProgressFn, SyncRequest, VaultTransport};

pub use vault_sync_protocol::{
    ConflictKey, DocumentMerger, EntryMerger, MergeOutcome, SyncMode, SyncProgress, SyncReport,
    SyncStatus,
};

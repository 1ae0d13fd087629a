//! # Vault Sync Protocol
//!
//! Shared types for the vault synchronization engine.
//!
//! This crate provides:
//! - `SyncStatus`, `SyncProgress` and `SyncMode`
//! - `SyncReport` for completed operations
//! - `ConflictKey` and the additive `ConflictTracker`
//! - The `DocumentMerger` capability and the entry-level `EntryMerger`
//! - Path pattern matching used by transports
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod merge;
mod pattern;
mod report;
mod status;

pub use conflict::{ConflictKey, ConflictTracker, ENTRY_SEPARATOR};
pub use merge::{
    DocumentMerger, EntryDocument, EntryMerger, MergeOutcome, ENTRY_MARKER_PREFIX,
    ENTRY_MARKER_SUFFIX, HEADER_ENTRY_ID,
};
pub use pattern::{is_syncable, is_text_path, matches_pattern, TEXT_EXTENSIONS};
pub use report::SyncReport;
pub use status::{SyncMode, SyncProgress, SyncStatus};

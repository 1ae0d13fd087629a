//! Sync status, progress and mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The externally visible status of a sync engine.
///
/// Exactly one value holds at any instant. The only path back to
/// [`SyncStatus::Idle`] from [`SyncStatus::Success`] is the auto-reset
/// timer; [`SyncStatus::Error`] stays until the next operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No operation in flight.
    #[default]
    Idle,
    /// A push or pull operation is in flight.
    Syncing,
    /// The last pull operation completed successfully.
    Success,
    /// The last operation failed.
    Error,
}

impl SyncStatus {
    /// Returns true if an operation is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }

    /// Returns true if a new operation may start.
    pub fn can_start_sync(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Progress of a running full or date-scoped sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Human-readable phase label (e.g. "pulling").
    pub phase: String,
    /// Items processed so far.
    pub current: u64,
    /// Total items in this phase.
    pub total: u64,
}

impl SyncProgress {
    /// Creates a progress update.
    pub fn new(phase: impl Into<String>, current: u64, total: u64) -> Self {
        Self {
            phase: phase.into(),
            current,
            total,
        }
    }

    /// Fraction complete in `0.0..=1.0`. An empty phase counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.current.min(self.total) as f64) / (self.total as f64)
    }
}

/// Which files take part in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Only text documents are synced.
    #[default]
    TextOnly,
    /// Text documents and binary attachments are synced.
    Full,
}

impl SyncMode {
    /// Returns true if binary attachments are included.
    pub fn include_binary(&self) -> bool {
        matches!(self, SyncMode::Full)
    }

    /// Parses a mode name as used in configuration.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "text_only" | "textonly" => Some(SyncMode::TextOnly),
            "full" | "all" => Some(SyncMode::Full),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_checks() {
        assert!(SyncStatus::Idle.can_start_sync());
        assert!(SyncStatus::Success.can_start_sync());
        assert!(SyncStatus::Error.can_start_sync());
        assert!(!SyncStatus::Syncing.can_start_sync());
        assert!(SyncStatus::Syncing.is_active());
        assert_eq!(SyncStatus::default(), SyncStatus::Idle);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SyncStatus::Syncing).unwrap();
        assert_eq!(json, "\"syncing\"");
        assert_eq!(SyncStatus::Error.to_string(), "error");
    }

    #[test]
    fn progress_fraction() {
        assert_eq!(SyncProgress::new("pulling", 1, 4).fraction(), 0.25);
        assert_eq!(SyncProgress::new("pulling", 0, 0).fraction(), 1.0);
        assert_eq!(SyncProgress::new("pulling", 9, 4).fraction(), 1.0);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(SyncMode::parse("full"), Some(SyncMode::Full));
        assert_eq!(SyncMode::parse(" Text "), Some(SyncMode::TextOnly));
        assert_eq!(SyncMode::parse("text_only"), Some(SyncMode::TextOnly));
        assert_eq!(SyncMode::parse("binary"), None);
        assert!(SyncMode::Full.include_binary());
        assert!(!SyncMode::TextOnly.include_binary());
    }
}

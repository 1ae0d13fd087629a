//! Outcome of a completed sync operation.

use crate::conflict::ConflictKey;
use serde::{Deserialize, Serialize};

/// Result of one completed pull, full or date-scoped sync.
///
/// A report is produced once per operation and never mutated afterwards.
/// `success` and `conflicts` are independent: a sync can succeed and still
/// carry unresolved conflicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Files brought in from the remote vault.
    pub pulled: u64,
    /// Files sent to the remote vault.
    pub pushed: u64,
    /// Documents reconciled automatically by the merger.
    pub merged: u64,
    /// Conflicts that could not be resolved, in detection order.
    pub conflicts: Vec<ConflictKey>,
    /// Human-readable error messages.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// A successful report with zero counts.
    pub fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A failed report carrying a single error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
            ..Self::default()
        }
    }

    /// A successful report for an incremental pull.
    pub fn pulled(count: u64) -> Self {
        Self {
            success: true,
            pulled: count,
            ..Self::default()
        }
    }

    /// Returns true if anything new arrived locally.
    ///
    /// Observers use this to decide whether views need reloading.
    pub fn brought_changes(&self) -> bool {
        self.pulled > 0 || self.merged > 0
    }

    /// All error messages joined for display.
    pub fn error_message(&self) -> String {
        self.errors.join(", ")
    }

    /// Returns true if unresolved conflicts remain.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_report() {
        let report = SyncReport::failure("Sync already in progress");
        assert!(!report.success);
        assert_eq!(report.errors, vec!["Sync already in progress".to_string()]);
        assert_eq!(report.pulled, 0);
        assert!(!report.brought_changes());
    }

    #[test]
    fn brought_changes_counts_merges() {
        let mut report = SyncReport::empty();
        assert!(!report.brought_changes());
        report.merged = 1;
        assert!(report.brought_changes());
        assert!(SyncReport::pulled(3).brought_changes());
    }

    #[test]
    fn error_message_joins() {
        let report = SyncReport {
            errors: vec!["a failed".into(), "b failed".into()],
            ..SyncReport::default()
        };
        assert_eq!(report.error_message(), "a failed, b failed");
    }

    #[test]
    fn success_with_conflicts() {
        let report = SyncReport {
            success: true,
            conflicts: vec![ConflictKey::entry("Daily/2026-02-09.md", "abc")],
            ..SyncReport::default()
        };
        assert!(report.success);
        assert!(report.has_conflicts());
    }
}

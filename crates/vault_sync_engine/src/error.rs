//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No server endpoint is configured.
    #[error("sync server is not configured")]
    NotConfigured,

    /// The engine or its transport has not been initialized.
    #[error("sync engine is not ready")]
    NotReady,

    /// Another operation holds the engine.
    #[error("Sync already in progress")]
    AlreadyInProgress,

    /// Network or protocol failure reported by the transport.
    #[error("{message}")]
    Transport {
        /// Error message, verbatim from the transport.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The transport could not list remote changes.
    #[error("failed to get changes: {0}")]
    ChangeListing(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried by calling again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::AlreadyInProgress => true,
            SyncError::ChangeListing(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error was raised before any state changed.
    ///
    /// Gate errors leave status, result and counters untouched.
    pub fn is_gate_error(&self) -> bool {
        matches!(
            self,
            SyncError::NotConfigured | SyncError::NotReady | SyncError::AlreadyInProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::AlreadyInProgress.is_retryable());
        assert!(SyncError::ChangeListing("timeout".into()).is_retryable());
        assert!(!SyncError::NotConfigured.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::AlreadyInProgress.to_string(),
            "Sync already in progress"
        );
        assert_eq!(
            SyncError::transport_retryable("HTTP 502").to_string(),
            "HTTP 502"
        );
        assert_eq!(
            SyncError::ChangeListing("HTTP 500".into()).to_string(),
            "failed to get changes: HTTP 500"
        );
    }

    #[test]
    fn gate_errors() {
        assert!(SyncError::NotReady.is_gate_error());
        assert!(SyncError::NotConfigured.is_gate_error());
        assert!(SyncError::AlreadyInProgress.is_gate_error());
        assert!(!SyncError::transport_fatal("boom").is_gate_error());
    }
}

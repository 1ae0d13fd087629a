//! Conflict keys and the conflict tracker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between a document path and an entry ID in a conflict key.
pub const ENTRY_SEPARATOR: char = '#';

/// Identifies an unresolved divergence between local and remote copies.
///
/// A key is either a bare relative path (file-level conflict) or
/// `path#entryId` (entry-level conflict inside a mergeable document).
/// Two keys are the same conflict iff their strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictKey(String);

impl ConflictKey {
    /// A file-level conflict key.
    pub fn file(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// An entry-level conflict key.
    pub fn entry(path: &str, entry_id: &str) -> Self {
        Self(format!("{path}{ENTRY_SEPARATOR}{entry_id}"))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The document path this key refers to.
    pub fn path(&self) -> &str {
        match self.0.rsplit_once(ENTRY_SEPARATOR) {
            Some((path, _)) => path,
            None => &self.0,
        }
    }

    /// The entry ID for entry-level keys.
    pub fn entry_id(&self) -> Option<&str> {
        self.0.rsplit_once(ENTRY_SEPARATOR).map(|(_, id)| id)
    }

    /// Returns true for entry-level keys.
    pub fn is_entry_level(&self) -> bool {
        self.entry_id().is_some()
    }
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConflictKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConflictKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ConflictKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Accumulates unresolved conflict keys across sync runs.
///
/// # Invariants
///
/// - No key appears twice
/// - Keys keep their first-seen order
/// - Keys are only removed by an explicit [`ConflictTracker::clear`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictTracker {
    keys: Vec<ConflictKey>,
}

impl ConflictTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the keys not already tracked. Returns how many were new.
    pub fn add_conflicts<'a, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a ConflictKey>,
    {
        let mut added = 0;
        for key in keys {
            // Linear scan; vault-scale lists stay small.
            if !self.keys.contains(key) {
                self.keys.push(key.clone());
                added += 1;
            }
        }
        added
    }

    /// Removes a resolved key. Returns false if it was not tracked.
    pub fn clear(&mut self, key: &ConflictKey) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        self.keys.len() != before
    }

    /// Removes every tracked key.
    pub fn clear_all(&mut self) {
        self.keys.clear();
    }

    /// Returns true if the key is tracked.
    pub fn contains(&self, key: &ConflictKey) -> bool {
        self.keys.contains(key)
    }

    /// Tracked keys in first-seen order.
    pub fn keys(&self) -> &[ConflictKey] {
        &self.keys
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

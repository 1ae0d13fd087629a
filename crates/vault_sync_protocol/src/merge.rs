//! Entry-level merging of structured documents.
//!
//! A structured document is a sequence of entries. Each entry starts with
//! a marker line `<!-- entry:ID -->` and runs until the next marker. Text
//! before the first marker is the document header.

use crate::conflict::ConflictKey;
use crate::pattern::matches_pattern;

/// Marker prefix that opens an entry.
pub const ENTRY_MARKER_PREFIX: &str = "<!-- entry:";
/// Marker suffix that closes an entry marker.
pub const ENTRY_MARKER_SUFFIX: &str = "-->";
/// Entry ID used for the text before the first marker.
pub const HEADER_ENTRY_ID: &str = "_header";

/// Outcome of merging two edited copies of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Every entry reconciled; the merged document text.
    Merged(String),
    /// Entries that could not be reconciled.
    Conflicts(Vec<ConflictKey>),
}

impl MergeOutcome {
    /// Returns true if the document merged cleanly.
    pub fn is_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged(_))
    }
}

/// Reconciles two independently edited copies of a structured document.
///
/// Transports call a merger when both the local and the remote copy of a
/// mergeable document changed since the last common version.
pub trait DocumentMerger: Send + Sync {
    /// Returns true if this merger understands the document at `path`.
    fn can_merge(&self, path: &str) -> bool;

    /// Merges `local` and `remote` against their common ancestor `base`.
    fn merge(&self, path: &str, base: Option<&str>, local: &str, remote: &str) -> MergeOutcome;
}

/// Three-way merger working entry by entry.
///
/// For each entry ID:
/// - identical on both sides: kept
/// - changed on one side only: the changed side wins (including deletes)
/// - changed differently on both sides: conflict `path#ID`
#[derive(Debug, Clone)]
pub struct EntryMerger {
    pattern: String,
}

impl EntryMerger {
    /// Creates a merger for markdown documents.
    pub fn new() -> Self {
        Self {
            pattern: "*.md".into(),
        }
    }

    /// Restricts the merger to paths matching `pattern`.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }
}

impl Default for EntryMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentMerger for EntryMerger {
    fn can_merge(&self, path: &str) -> bool {
        matches_pattern(&self.pattern, path)
    }

    fn merge(&self, path: &str, base: Option<&str>, local: &str, remote: &str) -> MergeOutcome {
        let base = base.map(EntryDocument::parse).unwrap_or_default();
        let local = EntryDocument::parse(local);
        let remote = EntryDocument::parse(remote);

        let mut order: Vec<&str> = remote.ids().collect();
        for id in local.ids() {
            if !order.contains(&id) {
                order.push(id);
            }
        }
        for id in base.ids() {
            if !order.contains(&id) {
                order.push(id);
            }
        }

        let mut merged = EntryDocument::default();
        let mut conflicts = Vec::new();

        for id in order {
            let b = base.get(id);
            let l = local.get(id);
            let r = remote.get(id);

            let chosen = if l == r || l == b {
                r
            } else if r == b {
                l
            } else {
                conflicts.push(ConflictKey::entry(path, id));
                continue;
            };

            if let Some(text) = chosen {
                merged.push(id, text);
            }
        }

        if conflicts.is_empty() {
            MergeOutcome::Merged(merged.render())
        } else {
            MergeOutcome::Conflicts(conflicts)
        }
    }
}

/// A document split into entries, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDocument {
    entries: Vec<(String, String)>,
}

impl EntryDocument {
    /// Splits document text into entries.
    ///
    /// Repeated IDs are folded into the first occurrence.
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::default();
        let mut current_id = HEADER_ENTRY_ID.to_string();
        let mut current = String::new();

        for line in text.split_inclusive('\n') {
            if let Some(id) = parse_marker(line) {
                doc.append(&current_id, &current);
                current_id = id.to_string();
                current.clear();
            }
            current.push_str(line);
        }
        doc.append(&current_id, &current);

        doc
    }

    /// Entry IDs in document order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// The full text of an entry, marker line included.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, text)| text.as_str())
    }

    /// Number of entries, header included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the document has no content.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Joins the entries back into document text.
    pub fn render(&self) -> String {
        self.entries.iter().map(|(_, text)| text.as_str()).collect()
    }

    fn push(&mut self, id: &str, text: &str) {
        self.entries.push((id.to_string(), text.to_string()));
    }

    fn append(&mut self, id: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(entry_id, _)| entry_id == id) {
            Some((_, existing)) => existing.push_str(text),
            None => self.push(id, text),
        }
    }
}

fn parse_marker(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(ENTRY_MARKER_PREFIX)?;
    let id = rest.strip_suffix(ENTRY_MARKER_SUFFIX)?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

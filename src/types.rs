//! Core data types used throughout the Strata library
//!
//! ## Overview
//!
//! - **Journal content**: [`ChangeRecord`] - one file's state at one point in time
//! - **Differ state**: [`Snapshot`] - last-known fingerprint per path
//! - **Results**: [`ChangeStats`], [`DiffOutcome`], [`RestoreReport`], [`CorruptSegment`]
//! - **Options**: [`RestoreOptions`]
//!
//! ## Examples
//!
//! ```rust
//! use strata::types::{ChangeRecord, Snapshot};
//! use chrono::Utc;
//!
//! let record = ChangeRecord::live("docs/readme.md", 0o644, Utc::now(), b"hello".to_vec());
//! assert!(!record.deleted);
//!
//! let tombstone = ChangeRecord::tombstone("docs/old.md");
//! assert!(tombstone.deleted && tombstone.content.is_empty());
//!
//! let mut snapshot = Snapshot::new();
//! snapshot.insert("docs/readme.md", "ab12...".to_string());
//! assert_eq!(snapshot.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One file's state at one point in time
///
/// Live records carry the full file content and the metadata needed to
/// materialize it. Tombstones (`deleted == true`) carry only the path; the
/// remaining fields are zeroed and `content` is always empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Slash-separated path relative to the watched root
    pub path: String,
    /// Unix permission bits (`mode & 0o7777`)
    pub permissions: u32,
    /// Last modification time
    pub mod_time: DateTime<Utc>,
    /// Size reported by the filesystem at scan time (informational)
    pub size: u64,
    /// Raw file bytes
    pub content: Vec<u8>,
    /// Tombstone flag
    pub deleted: bool,
}

impl ChangeRecord {
    /// Build a live record; `size` is taken from the content length
    pub fn live(
        path: impl Into<String>,
        permissions: u32,
        mod_time: DateTime<Utc>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            path: path.into(),
            permissions,
            mod_time,
            size: content.len() as u64,
            content,
            deleted: false,
        }
    }

    /// Build a tombstone for `path`
    pub fn tombstone(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            permissions: 0,
            mod_time: DateTime::<Utc>::UNIX_EPOCH,
            size: 0,
            content: Vec::new(),
            deleted: true,
        }
    }

    /// Bytes this record contributes towards a segment's soft limit
    pub fn packed_size(&self, entry_overhead: u64) -> u64 {
        self.content.len() as u64 + entry_overhead
    }
}

/// Last-known content fingerprint per relative path
///
/// Owned by a single watch session and mutated in place by every
/// differencing pass. Keys are slash-normalized relative paths; values are
/// lowercase hex SHA-256 digests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: HashMap<String, String>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint stored for `path`
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Whether `path` is tracked
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Insert or overwrite the fingerprint for `path`
    pub fn insert(&mut self, path: impl Into<String>, fingerprint: String) {
        self.entries.insert(path.into(), fingerprint);
    }

    /// Stop tracking `path`
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    /// Number of tracked paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no paths are tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over tracked paths
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Replace the whole content; used to commit a completed pass
    pub(crate) fn replace(&mut self, entries: HashMap<String, String>) {
        self.entries = entries;
    }
}

/// Statistics about one differencing pass
///
/// # Examples
///
/// ```rust
/// # use strata::types::ChangeStats;
/// let stats = ChangeStats {
///     files_added: 3,
///     files_modified: 1,
///     files_deleted: 2,
///     bytes_added: 300,
///     bytes_modified: 50,
/// };
/// assert!(stats.has_changes());
/// assert_eq!(stats.total_operations(), 6);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    /// Paths not present in the previous snapshot
    pub files_added: usize,
    /// Paths whose fingerprint changed
    pub files_modified: usize,
    /// Paths that disappeared
    pub files_deleted: usize,
    /// Content bytes of added files
    pub bytes_added: u64,
    /// Content bytes of modified files (new size)
    pub bytes_modified: u64,
}

impl ChangeStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total_operations() > 0
    }

    /// Get total number of file operations
    pub fn total_operations(&self) -> usize {
        self.files_added + self.files_modified + self.files_deleted
    }
}

/// Result of a differencing pass
#[derive(Debug, Clone, Default)]
pub struct DiffOutcome {
    /// Change records, each path at most once
    pub changes: Vec<ChangeRecord>,
    /// Classification of the changes
    pub stats: ChangeStats,
}

/// Options controlling a restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Only replay segments whose timestamp is at or before this epoch second
    pub until: Option<u64>,
}

impl RestoreOptions {
    /// Restore the state as of `timestamp` (inclusive)
    pub fn until(timestamp: u64) -> Self {
        Self { until: Some(timestamp) }
    }
}

/// A segment that was skipped during replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptSegment {
    /// Segment file name
    pub name: String,
    /// Why it could not be used
    pub reason: String,
}

/// Result of a restore operation
///
/// Besides counters, it carries the post-restore diagnostics: segments that
/// were skipped as corrupt, records refused for unsafe paths, and non-fatal
/// warnings such as modification times that could not be applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Live files written to the target
    pub files_restored: usize,
    /// Content bytes written
    pub bytes_written: u64,
    /// Paths whose final state was a tombstone
    pub tombstoned: usize,
    /// Segments decoded and folded
    pub segments_applied: usize,
    /// Segments skipped because they could not be decoded
    pub corrupt_segments: Vec<CorruptSegment>,
    /// Record paths refused because they would escape the target
    pub skipped_records: Vec<String>,
    /// Non-fatal problems
    pub warnings: Vec<String>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

impl RestoreReport {
    /// No corruption, no skipped records, no warnings
    pub fn is_clean(&self) -> bool {
        self.corrupt_segments.is_empty() && self.skipped_records.is_empty() && self.warnings.is_empty()
    }
}

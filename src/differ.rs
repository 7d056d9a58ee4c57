//! Snapshot differencing for Strata
//!
//! The differ walks a directory tree, fingerprints every regular file with
//! SHA-256 and compares the result against a [`Snapshot`] held by the caller.
//! It produces one [`ChangeRecord`] per added, modified or deleted path and
//! then updates the snapshot in place.
//!
//! ## Change classification
//!
//! 1. **Added**: path absent from the snapshot
//! 2. **Modified**: path present with a different fingerprint
//! 3. **Deleted**: path in the snapshot but not found by the walk (tombstone)
//!
//! ## Failure atomicity
//!
//! The new fingerprint table is built on the side and swapped in only after
//! the whole walk succeeds. If any directory or file cannot be read the pass
//! returns an error and the snapshot is left exactly as it was, so the next
//! pass re-detects the same changes.
//!
//! ## What gets fingerprinted
//!
//! - Directories produce no records
//! - Symbolic links are followed and fingerprinted by their target's content;
//!   links to directories are skipped like directories
//! - Zero-byte files are ordinary files
//! - Paths with a component that is not valid UTF-8 cannot be stored as
//!   record paths; they are logged with `warn!` and left out of the snapshot,
//!   so the rest of the tree is still backed up
//!
//! ### Special files
//!
//! FIFOs, sockets and device nodes are **not** treated as ordinary files:
//! they are skipped and never enter the snapshot or the journal. Opening a
//! FIFO blocks until a writer appears and a character device can stream
//! forever, so fingerprinting them would stall the pass. A restore therefore
//! never recreates them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata::differ::SnapshotDiffer;
//! use strata::types::Snapshot;
//!
//! # fn main() -> strata::Result<()> {
//! let differ = SnapshotDiffer::new("./project")
//!     .with_ignore_patterns(vec!["*.tmp".to_string()])?;
//! let mut snapshot = Snapshot::new();
//!
//! let first = differ.diff(&mut snapshot)?;
//! println!("{} files to back up", first.changes.len());
//!
//! let second = differ.diff(&mut snapshot)?;
//! assert!(second.changes.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::types::{ChangeRecord, DiffOutcome, Snapshot};
use crate::utils;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Walks one directory tree and diffs it against a snapshot
#[derive(Debug, Clone)]
pub struct SnapshotDiffer {
    root: PathBuf,
    ignore_patterns: Vec<String>,
    ignore: GlobSet,
    /// Slash-separated relative directories pruned from the walk
    excluded: Vec<String>,
}

impl SnapshotDiffer {
    /// Differ for `root` with no ignore patterns
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_patterns: Vec::new(),
            ignore: GlobSet::empty(),
            excluded: Vec::new(),
        }
    }

    /// Skip files and directories whose relative path matches any pattern
    ///
    /// Patterns use glob syntax and are matched against slash-separated paths
    /// relative to the root, e.g. `*.tmp`, `build/**`, `logs`.
    ///
    /// # Errors
    ///
    /// - [`crate::StrataError::InvalidPattern`] if a pattern does not compile
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.ignore = builder.build()?;
        self.ignore_patterns = patterns;
        Ok(self)
    }

    /// Prune `dir` from the walk if it lies inside the root
    ///
    /// Used to keep a backup location nested in the watched tree out of its
    /// own journal. Both paths must exist; a directory outside the root is
    /// ignored.
    pub fn exclude_dir(&mut self, dir: &Path) -> Result<()> {
        let root = self.root.canonicalize()?;
        let dir = dir.canonicalize()?;
        if dir != root && dir.starts_with(&root) {
            let relative = utils::normalize_relative(&dir, &root)?;
            debug!("Excluding {:?} from scans of {:?}", relative, self.root);
            self.excluded.push(relative);
        }
        Ok(())
    }

    /// Root directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured ignore patterns
    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    /// Walk the root, emit change records and update `snapshot`
    ///
    /// Each path appears at most once in the result. Live records come in
    /// walk order (sorted by file name per directory), followed by tombstones
    /// sorted by path.
    ///
    /// # Errors
    ///
    /// - [`crate::StrataError::WalkDir`] if a directory cannot be listed
    /// - [`crate::StrataError::Io`] if a file cannot be read
    ///
    /// On error `snapshot` is unchanged.
    pub fn diff(&self, snapshot: &mut Snapshot) -> Result<DiffOutcome> {
        let start = Instant::now();
        let mut current: HashMap<String, String> = HashMap::with_capacity(snapshot.len());
        let mut outcome = DiffOutcome::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.keep_entry(entry));

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let relative = match utils::normalize_relative(entry.path(), &self.root) {
                Ok(relative) => relative,
                Err(e) if e.is_non_utf8() => {
                    warn!("Skipping {:?}: name is not valid UTF-8", entry.path());
                    continue;
                }
                Err(e) => return Err(e),
            };
            if self.ignore.is_match(&relative) {
                trace!("Ignoring {:?}", relative);
                continue;
            }

            let metadata = utils::get_file_metadata(entry.path())?;
            if metadata.is_special {
                debug!("Skipping special file {:?}", relative);
                continue;
            }
            if metadata.is_symlink && fs::metadata(entry.path())?.is_dir() {
                trace!("Skipping symlink to directory {:?}", relative);
                continue;
            }

            let previous = snapshot.get(&relative);
            if let Some(previous) = previous {
                let fingerprint = utils::hash_file_content(entry.path())?;
                if fingerprint == previous {
                    current.insert(relative, fingerprint);
                    continue;
                }
            }

            // Fingerprint the bytes we actually record, so the snapshot and
            // the journal never disagree if the file changes mid-pass.
            let content = fs::read(entry.path())?;
            let fingerprint = utils::hash_data(&content);
            if previous == Some(fingerprint.as_str()) {
                current.insert(relative, fingerprint);
                continue;
            }

            if previous.is_some() {
                outcome.stats.files_modified += 1;
                outcome.stats.bytes_modified += content.len() as u64;
            } else {
                outcome.stats.files_added += 1;
                outcome.stats.bytes_added += content.len() as u64;
            }
            trace!("Changed: {:?} ({} bytes)", relative, content.len());

            outcome.changes.push(ChangeRecord {
                path: relative.clone(),
                permissions: metadata.permissions,
                mod_time: utils::system_time_to_utc(metadata.modified),
                size: metadata.size,
                content,
                deleted: false,
            });
            current.insert(relative, fingerprint);
        }

        let mut deleted: Vec<&str> = snapshot
            .paths()
            .filter(|path| !current.contains_key(*path))
            .collect();
        deleted.sort_unstable();
        for path in deleted {
            trace!("Deleted: {:?}", path);
            outcome.changes.push(ChangeRecord::tombstone(path));
            outcome.stats.files_deleted += 1;
        }

        snapshot.replace(current);

        debug!(
            "Scanned {:?}: {} added, {} modified, {} deleted in {:?}",
            self.root,
            outcome.stats.files_added,
            outcome.stats.files_modified,
            outcome.stats.files_deleted,
            start.elapsed()
        );
        Ok(outcome)
    }

    /// Prune excluded and ignored directories; files are filtered later
    fn keep_entry(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        match utils::normalize_relative(entry.path(), &self.root) {
            Ok(relative) => {
                !self.excluded.iter().any(|excluded| *excluded == relative)
                    && !self.ignore.is_match(&relative)
            }
            Err(e) if e.is_non_utf8() => {
                warn!("Skipping directory {:?}: name is not valid UTF-8", entry.path());
                false
            }
            // Let the walk loop surface the error
            Err(_) => true,
        }
    }
}

/// Diff `root_path` against `snapshot`, updating it in place
///
/// Convenience wrapper around [`SnapshotDiffer::diff`] without ignore
/// patterns.
pub fn diff(root_path: &Path, snapshot: &mut Snapshot) -> Result<Vec<ChangeRecord>> {
    Ok(SnapshotDiffer::new(root_path).diff(snapshot)?.changes)
}

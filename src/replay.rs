//! Journal replay and restore
//!
//! Restoring is a fold followed by a materialization:
//!
//! 1. **Fold**: every healthy segment, oldest first, is applied record by
//!    record to a [`RestoreState`]. A tombstone marks its path deleted and
//!    drops any earlier live record; a live record replaces whatever state
//!    the path had. Last writer wins.
//! 2. **Materialize**: every path that ends live is written under the target
//!    with its permission bits and modification time. Tombstoned paths are
//!    not created and pre-existing files at the target are never deleted;
//!    restore only adds or overwrites.
//!
//! Corrupt segments do not stop a restore. They are skipped, logged, and
//! listed in the [`RestoreReport`].
//!
//! ## Scaling
//!
//! The fold keeps one entry per distinct path and holds the content of every
//! live file in memory until materialization. That suits single-host
//! directory backups; journals whose live set does not fit in memory are not
//! supported.
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata::replay::restore;
//! use std::path::Path;
//!
//! # fn main() -> strata::Result<()> {
//! let report = restore(Path::new("./backups"), Path::new("./restored"))?;
//! println!("Restored {} files", report.files_restored);
//! for corrupt in &report.corrupt_segments {
//!     eprintln!("skipped {}: {}", corrupt.name, corrupt.reason);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::reader::{JournalReader, SegmentOutcome};
use crate::types::{ChangeRecord, CorruptSegment, RestoreOptions, RestoreReport};
use crate::utils;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Final state of one path after folding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathState {
    /// Latest record is live
    Live(ChangeRecord),
    /// Latest record is a tombstone
    Tombstoned,
}

/// Latest state per path, built by folding the journal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreState {
    paths: BTreeMap<String, PathState>,
}

impl RestoreState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one record on top of the current state
    pub fn apply(&mut self, record: ChangeRecord) {
        if record.deleted {
            trace!("Tombstone: {:?}", record.path);
            self.paths.insert(record.path, PathState::Tombstoned);
        } else {
            trace!("Live: {:?}", record.path);
            self.paths.insert(record.path.clone(), PathState::Live(record));
        }
    }

    /// Apply records in order
    pub fn apply_all(&mut self, records: impl IntoIterator<Item = ChangeRecord>) {
        for record in records {
            self.apply(record);
        }
    }

    /// State of `path`, if it was ever seen
    pub fn get(&self, path: &str) -> Option<&PathState> {
        self.paths.get(path)
    }

    /// Live record for `path`
    pub fn live_record(&self, path: &str) -> Option<&ChangeRecord> {
        match self.paths.get(path) {
            Some(PathState::Live(record)) => Some(record),
            _ => None,
        }
    }

    /// Live records in path order
    pub fn live(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.paths.values().filter_map(|state| match state {
            PathState::Live(record) => Some(record),
            PathState::Tombstoned => None,
        })
    }

    /// Number of live paths
    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// Number of tombstoned paths
    pub fn tombstoned_count(&self) -> usize {
        self.paths.len() - self.live_count()
    }

    /// Consume the state, yielding live records in path order
    pub fn into_live(self) -> impl Iterator<Item = ChangeRecord> {
        self.paths.into_values().filter_map(|state| match state {
            PathState::Live(record) => Some(record),
            PathState::Tombstoned => None,
        })
    }
}

/// Outcome of folding a journal
#[derive(Debug, Clone, Default)]
pub struct Replay {
    /// Folded state
    pub state: RestoreState,
    /// Healthy segments applied
    pub segments_applied: usize,
    /// Segments skipped
    pub corrupt_segments: Vec<CorruptSegment>,
}

/// Fold the journal at `backup_path`
///
/// With `options.until` set, segments stamped after that second are ignored,
/// giving the state as of that point in time.
///
/// # Errors
///
/// - [`crate::StrataError::JournalNotFound`] if no segment files exist
/// - [`crate::StrataError::Io`] if the backup location cannot be listed
pub fn replay(backup_path: &Path, options: &RestoreOptions) -> Result<Replay> {
    let reader = JournalReader::new(backup_path);
    let listing = reader.scan_required()?;
    let mut replay = Replay::default();

    for name in &listing.malformed {
        warn!("Skipping {}: file name is not a valid segment name", name);
        replay.corrupt_segments.push(CorruptSegment {
            name: name.clone(),
            reason: "file name is not a valid segment name".to_string(),
        });
    }

    for info in &listing.segments {
        if options.until.is_some_and(|until| info.id.timestamp > until) {
            trace!("Stopping before {} (after cut-off)", info.id);
            break;
        }

        match reader.read_segment(info) {
            SegmentOutcome::Ok { id, records } => {
                debug!("Applying {} ({} records)", id, records.len());
                replay.state.apply_all(records);
                replay.segments_applied += 1;
            }
            SegmentOutcome::Corrupt { name, reason } => {
                warn!("Skipping corrupt segment {}: {}", name, reason);
                replay.corrupt_segments.push(CorruptSegment { name, reason });
            }
        }
    }

    Ok(replay)
}

/// Write every live record of `state` under `target_path`
///
/// Records whose paths would escape the target are skipped and listed in
/// `report.skipped_records`. A modification time that cannot be applied is
/// a warning.
///
/// # Errors
///
/// - [`crate::StrataError::Io`] if a directory or file cannot be written
pub fn materialize(state: RestoreState, target_path: &Path, report: &mut RestoreReport) -> Result<()> {
    for record in state.into_live() {
        let file_path = match utils::resolve_record_path(target_path, &record.path) {
            Ok(path) => path,
            Err(e) => {
                warn!("Refusing to restore {:?}: {}", record.path, e);
                report.skipped_records.push(record.path);
                continue;
            }
        };

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Replace rather than write through: the old file may be read-only
        // or a symlink.
        utils::remove_existing_file(&file_path)?;
        fs::write(&file_path, &record.content)?;

        if let Err(e) = utils::set_modified(&file_path, &record.mod_time) {
            warn!("Could not restore times for {:?}: {}", record.path, e);
            report
                .warnings
                .push(format!("Could not restore times for {}: {}", record.path, e));
        }
        utils::set_permissions(&file_path, record.permissions)?;

        trace!("Restored {:?} ({} bytes)", record.path, record.content.len());
        report.files_restored += 1;
        report.bytes_written += record.content.len() as u64;
    }
    Ok(())
}

/// Restore the latest state of the journal at `backup_path` into `target_path`
pub fn restore(backup_path: &Path, target_path: &Path) -> Result<RestoreReport> {
    restore_with_options(backup_path, target_path, &RestoreOptions::default())
}

/// Restore with explicit options (e.g. a point-in-time cut-off)
///
/// # Errors
///
/// - [`crate::StrataError::Io`] if `target_path` cannot be created or a live
///   file cannot be written
/// - [`crate::StrataError::JournalNotFound`] if no segment files exist
///
/// Corrupt segments are never an error.
pub fn restore_with_options(
    backup_path: &Path,
    target_path: &Path,
    options: &RestoreOptions,
) -> Result<RestoreReport> {
    info!("Restoring from {:?} to {:?}", backup_path, target_path);
    let start = Instant::now();

    fs::create_dir_all(target_path)?;

    let replay = replay(backup_path, options)?;
    let mut report = RestoreReport {
        tombstoned: replay.state.tombstoned_count(),
        segments_applied: replay.segments_applied,
        corrupt_segments: replay.corrupt_segments,
        ..Default::default()
    };

    materialize(replay.state, target_path, &mut report)?;
    report.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Restored {} files ({}) from {} segments in {}ms",
        report.files_restored,
        utils::format_bytes(report.bytes_written),
        report.segments_applied,
        report.duration_ms
    );
    if !report.corrupt_segments.is_empty() {
        warn!("{} segment(s) skipped as corrupt", report.corrupt_segments.len());
    }

    Ok(report)
}

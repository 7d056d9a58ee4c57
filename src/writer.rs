//! Journal writer
//!
//! Turns one differencing pass worth of [`ChangeRecord`]s into one or more
//! segment files. All segments of an invocation share a timestamp and are
//! numbered from `000` upward.
//!
//! ## Packing
//!
//! Records are packed greedily in input order. Each record costs its content
//! length plus a fixed per-entry overhead. Before a record is added, the
//! current segment is closed if the record would push it past the soft limit
//! and the segment already holds at least one record. A record is never
//! split, so a single record larger than the limit gets a segment to itself.
//!
//! ## Timestamps
//!
//! A writer remembers the newest timestamp in its journal and never reuses
//! it: an invocation is stamped `max(now, newest + 1)`. Two passes within the
//! same second therefore land in distinct, correctly ordered segments instead
//! of overwriting `chunk_<ts>_000.dat`.
//!
//! ## Failure behaviour
//!
//! Segments are written atomically (temp file + rename). If segment N fails,
//! segments `0..N` stay in place; every segment is independently valid.

use crate::config::JournalConfig;
use crate::error::Result;
use crate::reader;
use crate::segment::{self, SegmentId};
use crate::types::ChangeRecord;
use crate::utils;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Split `records` into segments according to `config`
///
/// Returns slices of the input in order; their concatenation is `records`.
pub fn pack_segments<'a>(records: &'a [ChangeRecord], config: &JournalConfig) -> Vec<&'a [ChangeRecord]> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut current_size = 0u64;

    for (index, record) in records.iter().enumerate() {
        let size = record.packed_size(config.entry_overhead);
        if current_size + size > config.segment_soft_limit && index > start {
            segments.push(&records[start..index]);
            start = index;
            current_size = 0;
        }
        current_size += size;
    }

    if start < records.len() {
        segments.push(&records[start..]);
    }
    segments
}

/// Appends change sets to the journal at one backup location
#[derive(Debug)]
pub struct JournalWriter {
    backup_path: PathBuf,
    config: JournalConfig,
    last_timestamp: Option<u64>,
}

impl JournalWriter {
    /// Open (creating if needed) the backup directory
    ///
    /// # Errors
    ///
    /// - [`crate::StrataError::Io`] if the directory cannot be created or listed
    /// - [`crate::StrataError::InvalidConfiguration`] for a zero soft limit
    pub fn open(backup_path: impl Into<PathBuf>, config: JournalConfig) -> Result<Self> {
        config.validate()?;
        let backup_path = backup_path.into();
        fs::create_dir_all(&backup_path)?;
        let last_timestamp = reader::latest_timestamp(&backup_path)?;

        debug!(
            "Opened journal at {:?} (latest timestamp {:?})",
            backup_path, last_timestamp
        );
        Ok(Self {
            backup_path,
            config,
            last_timestamp,
        })
    }

    /// Backup directory
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Packing parameters
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Newest invocation timestamp in this journal
    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Write `changes` stamped with the current time
    ///
    /// Returns the ids of the segments written; an empty change list writes
    /// nothing.
    pub fn write(&mut self, changes: &[ChangeRecord]) -> Result<Vec<SegmentId>> {
        let now = Utc::now().timestamp().max(0) as u64;
        self.write_at(now, changes)
    }

    /// Write `changes` stamped with `timestamp`
    ///
    /// If `timestamp` is not newer than the journal's latest, the next free
    /// second is used instead.
    pub fn write_at(&mut self, timestamp: u64, changes: &[ChangeRecord]) -> Result<Vec<SegmentId>> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let timestamp = match self.last_timestamp {
            Some(last) if timestamp <= last => last + 1,
            _ => timestamp,
        };
        self.last_timestamp = Some(timestamp);

        let segments = pack_segments(changes, &self.config);
        let mut written = Vec::with_capacity(segments.len());
        let mut total_bytes = 0u64;

        for (sequence, records) in segments.into_iter().enumerate() {
            let id = SegmentId::new(timestamp, sequence as u32);
            let bytes = segment::encode_segment(id, records)?;
            utils::atomic_write(&self.backup_path.join(id.file_name()), &bytes)?;

            debug!(
                "Wrote {} ({} records, {})",
                id,
                records.len(),
                utils::format_bytes(bytes.len() as u64)
            );
            total_bytes += bytes.len() as u64;
            written.push(id);
        }

        info!(
            "Journaled {} changes in {} segment(s) at {} ({})",
            changes.len(),
            written.len(),
            timestamp,
            utils::format_bytes(total_bytes)
        );
        Ok(written)
    }
}

/// Write `changes` to the journal at `backup_path` with default packing
///
/// An empty change list is a no-op and creates nothing.
pub fn write_changes(backup_path: &Path, changes: &[ChangeRecord]) -> Result<Vec<SegmentId>> {
    if changes.is_empty() {
        return Ok(Vec::new());
    }
    JournalWriter::open(backup_path, JournalConfig::default())?.write(changes)
}

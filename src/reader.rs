//! Journal reader
//!
//! Locates the segment files of a backup location, orders them
//! chronologically and decodes them one at a time.
//!
//! Ordering uses the `(timestamp, sequence)` pair parsed from each file name
//! rather than the raw string, so a journal spanning a change in timestamp
//! digit width still replays in the right order. Files that look like
//! segments (`chunk_*.dat`) but whose names do not parse are kept aside as
//! malformed and reported by the replayer.
//!
//! Decoding never fails the caller: every segment yields a [`SegmentOutcome`],
//! either its records or the reason it is unusable.

use crate::error::{Result, StrataError};
use crate::segment::{self, SegmentId};
use crate::types::ChangeRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A segment file found in the backup location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Parsed position in the journal
    pub id: SegmentId,
    /// Full path of the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Everything that looks like a segment in a backup location
#[derive(Debug, Clone, Default)]
pub struct JournalListing {
    /// Well-named segments in chronological order
    pub segments: Vec<SegmentInfo>,
    /// `chunk_*.dat` files whose names do not parse
    pub malformed: Vec<String>,
}

impl JournalListing {
    /// No segment files at all
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.malformed.is_empty()
    }
}

/// Result of reading one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Segment decoded and verified
    Ok {
        /// Segment id
        id: SegmentId,
        /// Records in write order
        records: Vec<ChangeRecord>,
    },
    /// Segment unreadable or undecodable; replay skips it
    Corrupt {
        /// File name
        name: String,
        /// Human-readable cause
        reason: String,
    },
}

impl SegmentOutcome {
    /// Records of a healthy segment
    pub fn records(&self) -> Option<&[ChangeRecord]> {
        match self {
            SegmentOutcome::Ok { records, .. } => Some(records),
            SegmentOutcome::Corrupt { .. } => None,
        }
    }

    /// Whether the segment was skipped
    pub fn is_corrupt(&self) -> bool {
        matches!(self, SegmentOutcome::Corrupt { .. })
    }
}

/// Reads the journal at one backup location
#[derive(Debug, Clone)]
pub struct JournalReader {
    backup_path: PathBuf,
}

impl JournalReader {
    /// Reader for `backup_path`
    pub fn new(backup_path: impl Into<PathBuf>) -> Self {
        Self {
            backup_path: backup_path.into(),
        }
    }

    /// Backup directory
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// List segment files, oldest first
    ///
    /// A missing backup directory lists as empty.
    ///
    /// # Errors
    ///
    /// - [`StrataError::Io`] if the directory exists but cannot be listed
    pub fn scan(&self) -> Result<JournalListing> {
        let mut listing = JournalListing::default();

        let entries = match fs::read_dir(&self.backup_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Backup location {:?} does not exist", self.backup_path);
                return Ok(listing);
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !SegmentId::is_segment_name(&name) {
                trace!("Ignoring non-segment file {:?}", name);
                continue;
            }
            match SegmentId::parse(&name) {
                Ok(id) => listing.segments.push(SegmentInfo {
                    id,
                    path: entry.path(),
                    size: entry.metadata()?.len(),
                }),
                Err(_) => listing.malformed.push(name),
            }
        }

        listing.segments.sort_by_key(|info| info.id);
        listing.malformed.sort();
        Ok(listing)
    }

    /// Well-named segments, oldest first
    pub fn list_segments(&self) -> Result<Vec<SegmentInfo>> {
        Ok(self.scan()?.segments)
    }

    /// Like [`scan`](Self::scan), but an empty journal is an error
    ///
    /// # Errors
    ///
    /// - [`StrataError::JournalNotFound`] if no segment files exist
    pub fn scan_required(&self) -> Result<JournalListing> {
        let listing = self.scan()?;
        if listing.is_empty() {
            return Err(StrataError::JournalNotFound(self.backup_path.clone()));
        }
        Ok(listing)
    }

    /// Read and verify one segment
    pub fn read_segment(&self, info: &SegmentInfo) -> SegmentOutcome {
        let name = info.id.file_name();
        let corrupt = |reason: String| SegmentOutcome::Corrupt {
            name: name.clone(),
            reason,
        };

        let bytes = match fs::read(&info.path) {
            Ok(bytes) => bytes,
            Err(e) => return corrupt(format!("read failed: {}", e)),
        };

        match segment::decode_segment(&bytes) {
            Ok((header, _)) if header.id != info.id => corrupt(format!(
                "header identifies the segment as {}",
                header.id.file_name()
            )),
            Ok((_, records)) => {
                trace!("Read {} ({} records)", name, records.len());
                SegmentOutcome::Ok {
                    id: info.id,
                    records,
                }
            }
            Err(e) => corrupt(e.to_string()),
        }
    }
}

/// Newest timestamp among the segments at `backup_path`
pub(crate) fn latest_timestamp(backup_path: &Path) -> Result<Option<u64>> {
    let listing = JournalReader::new(backup_path).scan()?;
    Ok(listing.segments.last().map(|info| info.id.timestamp))
}

//! Sequential watch loop
//!
//! A [`Watcher`] owns everything one watch session needs: the differ, the
//! in-memory [`Snapshot`] and the journal writer. Each [`tick`](Watcher::tick)
//! is one scan → diff → write cycle; [`run`](Watcher::run) repeats it forever,
//! sleeping the configured interval between cycles.
//!
//! The snapshot starts empty, so the first cycle journals every file in the
//! tree. A failed cycle is logged and the loop moves on to the next interval
//! without retrying.

use crate::config::WatchConfig;
use crate::differ::SnapshotDiffer;
use crate::error::Result;
use crate::segment::SegmentId;
use crate::types::{ChangeStats, Snapshot};
use crate::utils;
use crate::writer::JournalWriter;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of one watch cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Segments written, empty when nothing changed
    pub segments: Vec<SegmentId>,
    /// Classification of the changes found
    pub stats: ChangeStats,
    /// Paths tracked after the cycle
    pub tracked_files: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Owns the state of one watch session
#[derive(Debug)]
pub struct Watcher {
    config: WatchConfig,
    differ: SnapshotDiffer,
    snapshot: Snapshot,
    writer: JournalWriter,
    cycles: u64,
}

impl Watcher {
    /// Prepare a session
    ///
    /// Creates the backup directory. If it lies inside the watched tree it is
    /// excluded from every scan.
    ///
    /// # Errors
    ///
    /// - [`crate::StrataError::InvalidConfiguration`] if `config` is invalid
    /// - [`crate::StrataError::InvalidPattern`] if an ignore pattern does not compile
    /// - [`crate::StrataError::Io`] if the backup directory cannot be created
    pub fn new(config: WatchConfig) -> Result<Self> {
        config.validate()?;
        let writer = JournalWriter::open(&config.backup_root, config.journal)?;

        let mut differ =
            SnapshotDiffer::new(&config.watch_root).with_ignore_patterns(config.ignore_patterns.clone())?;
        if config.watch_root.exists() {
            differ.exclude_dir(&config.backup_root)?;
        } else {
            warn!("Watch root {:?} does not exist yet", config.watch_root);
        }

        info!(
            "Watching {:?}, journaling to {:?} every {}s",
            config.watch_root,
            config.backup_root,
            config.interval.as_secs()
        );
        Ok(Self {
            config,
            differ,
            snapshot: Snapshot::new(),
            writer,
            cycles: 0,
        })
    }

    /// Session configuration
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Last-known fingerprints
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Cycles attempted so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one diff → write cycle
    ///
    /// If the journal write fails the snapshot is rolled back, so the same
    /// changes are found again on the next cycle.
    ///
    /// # Errors
    ///
    /// - [`crate::StrataError::Io`] or [`crate::StrataError::WalkDir`] if the
    ///   scan or the write fails
    pub fn tick(&mut self) -> Result<CycleReport> {
        let start = Instant::now();
        self.cycles += 1;
        debug!("Starting cycle {}", self.cycles);

        let previous = self.snapshot.clone();
        let outcome = self.differ.diff(&mut self.snapshot)?;

        let segments = match self.writer.write(&outcome.changes) {
            Ok(segments) => segments,
            Err(e) => {
                self.snapshot = previous;
                return Err(e);
            }
        };

        let report = CycleReport {
            segments,
            stats: outcome.stats,
            tracked_files: self.snapshot.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if report.stats.has_changes() {
            info!(
                "Cycle {}: {} added, {} modified, {} deleted ({}) in {} segment(s)",
                self.cycles,
                report.stats.files_added,
                report.stats.files_modified,
                report.stats.files_deleted,
                utils::format_bytes(report.stats.bytes_added + report.stats.bytes_modified),
                report.segments.len()
            );
        } else {
            debug!("Cycle {}: no changes", self.cycles);
        }
        Ok(report)
    }

    /// Cycle forever
    ///
    /// Never returns; stop the process to end the session.
    pub fn run(&mut self) -> ! {
        loop {
            if let Err(e) = self.tick() {
                error!("Backup cycle {} failed: {}", self.cycles, e);
            }
            thread::sleep(self.config.interval);
        }
    }
}

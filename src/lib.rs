//! # Strata - Incremental chunked backups for directory trees
//!
//! Strata detects changes in a directory tree by content hash, packs them into
//! bounded-size segment files that together form an append-only journal, and
//! replays that journal to rebuild the tree as of its latest state or any
//! earlier second.
//!
//! ## Overview
//!
//! Three engines do the work:
//!
//! - **Snapshot Differ** ([`differ`]): walks a tree, fingerprints every file
//!   with SHA-256 and compares against the previous [`Snapshot`] to produce
//!   additions, modifications and deletions (tombstones).
//! - **Journal Writer** ([`writer`]): packs the changes of one pass into
//!   `chunk_<timestamp>_<seq>.dat` segments of at most ~5 MiB each.
//! - **Journal Reader / Replayer** ([`reader`], [`replay`]): orders the
//!   segments, folds them with last-writer-wins and tombstone semantics and
//!   materializes the live files onto a target directory.
//!
//! [`watch::Watcher`] ties the differ and the writer into a periodic loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::{diff, restore, write_changes, Snapshot};
//! use std::path::Path;
//!
//! # fn main() -> strata::Result<()> {
//! let mut snapshot = Snapshot::new();
//!
//! // First pass: every file is new
//! let changes = diff(Path::new("./project"), &mut snapshot)?;
//! write_changes(Path::new("./backups"), &changes)?;
//!
//! // ... files change ...
//!
//! // Later passes journal only what changed
//! let changes = diff(Path::new("./project"), &mut snapshot)?;
//! write_changes(Path::new("./backups"), &changes)?;
//!
//! // Rebuild the tree elsewhere
//! let report = restore(Path::new("./backups"), Path::new("./restored"))?;
//! println!("Restored {} files", report.files_restored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running a watch session
//!
//! ```rust,no_run
//! use strata::{WatchConfig, Watcher};
//! use std::time::Duration;
//!
//! # fn main() -> strata::Result<()> {
//! let config = WatchConfig::new("./project", "./backups")
//!     .with_interval(Duration::from_secs(30))
//!     .with_ignore_patterns(vec!["*.tmp".to_string(), "target/**".to_string()]);
//!
//! let mut watcher = Watcher::new(config)?;
//! watcher.run();
//! # }
//! ```
//!
//! ## Point-in-time restore
//!
//! ```rust,no_run
//! use strata::{restore_with_options, RestoreOptions};
//! use std::path::Path;
//!
//! # fn main() -> strata::Result<()> {
//! // State as of 2024-01-01T00:00:00Z
//! let options = RestoreOptions::until(1_704_067_200);
//! let report = restore_with_options(Path::new("./backups"), Path::new("./restored"), &options)?;
//! if !report.is_clean() {
//!     eprintln!("{} corrupt segment(s) skipped", report.corrupt_segments.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Journal semantics
//!
//! - Segments are ordered by the `(timestamp, sequence)` parsed from their
//!   names. A writer never reuses a timestamp, so two passes in the same
//!   second still land in distinct segments.
//! - Within the fold the last record for a path wins. A tombstone drops any
//!   earlier live record; a later live record brings the path back.
//! - A corrupt segment is skipped and reported; the rest of the journal still
//!   restores.
//! - Restore adds and overwrites files but never deletes anything already in
//!   the target.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] with [`StrataError`]. The helpers
//! [`StrataError::is_io`], [`StrataError::is_not_found`] and
//! [`StrataError::is_decode`] classify failures.
//!
//! ## Module Organization
//!
//! - [`differ`]: Change detection against a snapshot
//! - [`segment`]: Segment naming and binary encoding
//! - [`writer`]: Packing change sets into segments
//! - [`reader`]: Listing and decoding segments
//! - [`replay`]: Folding the journal and restoring files
//! - [`watch`]: The periodic backup loop
//! - [`config`]: Configuration and config files
//! - [`types`]: Common types and data structures
//! - [`error`]: Error types and handling

// Public API modules
pub mod config;
pub mod differ;
pub mod error;
pub mod reader;
pub mod replay;
pub mod segment;
pub mod types;
pub mod watch;
pub mod writer;

// Internal modules (not part of public API)
mod utils;

// Re-export main types for convenience
pub use config::{ConfigFile, JournalConfig, WatchConfig};
pub use differ::{diff, SnapshotDiffer};
pub use error::{Result, StrataError};
pub use reader::{JournalReader, SegmentInfo, SegmentOutcome};
pub use replay::{restore, restore_with_options, RestoreState};
pub use segment::SegmentId;
pub use types::*;
pub use watch::{CycleReport, Watcher};
pub use writer::{write_changes, JournalWriter};

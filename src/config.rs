//! Configuration for the journal writer and the watch loop
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults (5 MiB segments, 1 KiB per-entry overhead, 60s interval)
//! 2. An optional JSON [`ConfigFile`]
//! 3. Explicit values set through the `with_*` builder methods (CLI flags)
//!
//! ```rust
//! use strata::config::WatchConfig;
//! use std::time::Duration;
//!
//! let config = WatchConfig::new("./project", "./backups")
//!     .with_interval(Duration::from_secs(30))
//!     .with_ignore_patterns(vec!["*.tmp".to_string()]);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Result, StrataError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Soft limit on content bytes per segment
pub const DEFAULT_SEGMENT_SOFT_LIMIT: u64 = 5 * 1024 * 1024;

/// Bytes accounted per record on top of its content
pub const DEFAULT_ENTRY_OVERHEAD: u64 = 1024;

/// Default scan interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Segment packing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Soft cap on accumulated record size per segment
    pub segment_soft_limit: u64,
    /// Per-record accounting overhead
    pub entry_overhead: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            segment_soft_limit: DEFAULT_SEGMENT_SOFT_LIMIT,
            entry_overhead: DEFAULT_ENTRY_OVERHEAD,
        }
    }
}

impl JournalConfig {
    /// Reject a zero soft limit
    pub fn validate(&self) -> Result<()> {
        if self.segment_soft_limit == 0 {
            return Err(StrataError::config("segment soft limit must be positive"));
        }
        Ok(())
    }
}

/// Everything the watch loop needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Directory tree being backed up
    pub watch_root: PathBuf,
    /// Journal location
    pub backup_root: PathBuf,
    /// Time between cycles
    pub interval: Duration,
    /// Glob patterns (matched against slash-separated relative paths) to skip
    pub ignore_patterns: Vec<String>,
    /// Segment packing
    pub journal: JournalConfig,
}

impl WatchConfig {
    /// Defaults for the given roots
    pub fn new(watch_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            watch_root: watch_root.into(),
            backup_root: backup_root.into(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            ignore_patterns: Vec::new(),
            journal: JournalConfig::default(),
        }
    }

    /// Set the interval between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set ignore patterns
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Set segment packing parameters
    pub fn with_journal(mut self, journal: JournalConfig) -> Self {
        self.journal = journal;
        self
    }

    /// Overlay values present in a config file
    ///
    /// Ignore patterns from the file are prepended to any already configured.
    pub fn merge_file(mut self, file: &ConfigFile) -> Self {
        if let Some(secs) = file.interval_secs {
            self.interval = Duration::from_secs(secs);
        }
        if let Some(limit) = file.segment_soft_limit {
            self.journal.segment_soft_limit = limit;
        }
        if let Some(overhead) = file.entry_overhead {
            self.journal.entry_overhead = overhead;
        }
        if !file.ignore_patterns.is_empty() {
            let mut patterns = file.ignore_patterns.clone();
            patterns.append(&mut self.ignore_patterns);
            self.ignore_patterns = patterns;
        }
        self
    }

    /// Check the configuration before starting a session
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(StrataError::config("refresh interval must be at least one second"));
        }
        if self.watch_root == self.backup_root {
            return Err(StrataError::config(format!(
                "watch root and backup root must differ (both {:?})",
                self.watch_root
            )));
        }
        self.journal.validate()
    }
}

/// Optional on-disk configuration (JSON)
///
/// ```json
/// {
///   "interval_secs": 30,
///   "ignore_patterns": ["*.tmp", "target/**"],
///   "segment_soft_limit": 8388608
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Scan interval in seconds
    pub interval_secs: Option<u64>,
    /// Extra ignore patterns
    pub ignore_patterns: Vec<String>,
    /// Segment soft limit in bytes
    pub segment_soft_limit: Option<u64>,
    /// Per-record overhead in bytes
    pub entry_overhead: Option<u64>,
}

impl ConfigFile {
    /// Load and parse a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&json)?;
        Ok(file)
    }
}

//! Integration tests for Strata
//!
//! Multi-pass scenarios: a harness mutates a real directory, journals each
//! pass with an explicit timestamp and remembers the expected tree after
//! every pass, so restores at any point can be checked exactly.

use ::strata::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::info;

/// Expected tree contents: relative path to bytes
pub type TreeState = BTreeMap<String, Vec<u8>>;

/// Drives a watched directory through passes of the differ and writer
pub struct JournalHarness {
    pub watch_dir: TempDir,
    pub backup_dir: TempDir,
    pub snapshot: Snapshot,
    pub writer: JournalWriter,
    /// Timestamp of the next pass
    pub clock: u64,
    /// Expected tree after each pass, keyed by pass timestamp
    pub history: Vec<(u64, TreeState)>,
    current: TreeState,
    rng: StdRng,
}

impl JournalHarness {
    pub fn new() -> Self {
        Self::with_config(JournalConfig::default())
    }

    pub fn with_config(config: JournalConfig) -> Self {
        let watch_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let writer = JournalWriter::open(backup_dir.path(), config).unwrap();
        Self {
            watch_dir,
            backup_dir,
            snapshot: Snapshot::new(),
            writer,
            clock: 1_700_000_000,
            history: Vec::new(),
            current: TreeState::new(),
            rng: StdRng::seed_from_u64(42),
        }
    }

    pub fn write_file(&mut self, path: &str, content: &[u8]) {
        let full = self.watch_dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
        self.current.insert(path.to_string(), content.to_vec());
    }

    pub fn write_random_file(&mut self, path: &str, len: usize) {
        let mut content = vec![0u8; len];
        self.rng.fill(&mut content[..]);
        self.write_file(path, &content);
    }

    pub fn delete_file(&mut self, path: &str) {
        fs::remove_file(self.watch_dir.path().join(path)).unwrap();
        self.current.remove(path);
    }

    /// Diff and journal; returns the records written
    pub fn pass(&mut self) -> Vec<ChangeRecord> {
        let changes = diff(self.watch_dir.path(), &mut self.snapshot).unwrap();
        let ids = self.writer.write_at(self.clock, &changes).unwrap();
        info!("Pass at {}: {} changes in {} segments", self.clock, changes.len(), ids.len());
        self.history.push((self.clock, self.current.clone()));
        self.clock += 10;
        changes
    }

    pub fn restore_latest(&self) -> (TempDir, RestoreReport) {
        let target = TempDir::new().unwrap();
        let report = restore(self.backup_dir.path(), target.path()).unwrap();
        (target, report)
    }

    pub fn restore_until(&self, timestamp: u64) -> (TempDir, RestoreReport) {
        let target = TempDir::new().unwrap();
        let report =
            restore_with_options(self.backup_dir.path(), target.path(), &RestoreOptions::until(timestamp))
                .unwrap();
        (target, report)
    }

    pub fn expected_latest(&self) -> &TreeState {
        &self.current
    }
}

impl Default for JournalHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Read every regular file under `root` into a tree state
pub fn read_tree(root: &Path) -> TreeState {
    let mut state = TreeState::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            state.insert(relative, fs::read(entry.path()).unwrap());
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_tombstone_then_recreate() {
        let mut harness = JournalHarness::new();

        harness.write_file("file.txt", b"v1");
        harness.pass();
        let t1 = harness.history[0].0;

        harness.delete_file("file.txt");
        let changes = harness.pass();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].deleted);
        let t2 = harness.history[1].0;

        harness.write_file("file.txt", b"v3");
        harness.pass();

        let (target, _) = harness.restore_latest();
        assert_eq!(fs::read(target.path().join("file.txt")).unwrap(), b"v3");

        let (target, report) = harness.restore_until(t2);
        assert!(!target.path().join("file.txt").exists());
        assert_eq!(report.tombstoned, 1);

        let (target, _) = harness.restore_until(t1);
        assert_eq!(fs::read(target.path().join("file.txt")).unwrap(), b"v1");
    }

    #[test]
    #[traced_test]
    fn test_last_write_wins_over_many_passes() {
        let mut harness = JournalHarness::new();
        for version in 0..10 {
            harness.write_file("config.json", format!("{{\"version\": {}}}", version).as_bytes());
            harness.write_file(&format!("log/{}.txt", version), b"entry");
            harness.pass();
        }

        let (target, report) = harness.restore_latest();
        assert_eq!(report.segments_applied, 10);
        assert_eq!(read_tree(target.path()), *harness.expected_latest());
        assert_eq!(
            fs::read_to_string(target.path().join("config.json")).unwrap(),
            "{\"version\": 9}"
        );
    }

    #[test]
    #[traced_test]
    fn test_every_pass_is_restorable() {
        let mut harness = JournalHarness::new();

        harness.write_file("a.txt", b"a");
        harness.write_file("dir/b.txt", b"b");
        harness.pass();

        harness.write_file("a.txt", b"a2");
        harness.delete_file("dir/b.txt");
        harness.write_file("dir/c.txt", b"c");
        harness.pass();

        harness.delete_file("a.txt");
        harness.write_file("dir/b.txt", b"b again");
        harness.pass();

        // No changes; writes nothing
        assert!(harness.pass().is_empty());

        for (timestamp, expected) in harness.history.clone() {
            let (target, _) = harness.restore_until(timestamp);
            assert_eq!(read_tree(target.path()), expected, "state at {}", timestamp);
        }
    }

    #[test]
    #[traced_test]
    fn test_large_files_span_segments() {
        let mut harness = JournalHarness::new();
        for i in 0..4 {
            harness.write_random_file(&format!("blob_{}.bin", i), 3 * 1024 * 1024);
        }
        harness.write_file("small.txt", b"small");
        harness.pass();

        let segments = JournalReader::new(harness.backup_dir.path()).list_segments().unwrap();
        assert!(segments.len() >= 2, "expected several segments, got {}", segments.len());
        assert!(segments.iter().all(|s| s.id.timestamp == harness.history[0].0));
        for (index, info) in segments.iter().enumerate() {
            assert_eq!(info.id.sequence as usize, index);
        }

        let (target, report) = harness.restore_latest();
        assert_eq!(report.files_restored, 5);
        assert_eq!(read_tree(target.path()), *harness.expected_latest());
    }

    #[test]
    #[traced_test]
    fn test_small_segment_limit() {
        let mut harness = JournalHarness::with_config(JournalConfig {
            segment_soft_limit: 4096,
            entry_overhead: 1024,
        });
        for i in 0..25 {
            harness.write_random_file(&format!("f{:02}", i), 1000);
        }
        harness.pass();

        let segments = JournalReader::new(harness.backup_dir.path()).list_segments().unwrap();
        assert!(segments.len() > 10);

        let (target, _) = harness.restore_latest();
        assert_eq!(read_tree(target.path()), *harness.expected_latest());
    }

    #[test]
    #[traced_test]
    fn test_metadata_fidelity() {
        use chrono::{TimeZone, Utc};

        let mut harness = JournalHarness::new();
        harness.write_file("script.sh", b"#!/bin/sh\necho hi\n");
        let source = harness.watch_dir.path().join("script.sh");
        let when = filetime::FileTime::from_unix_time(1_600_000_000, 500_000_000);
        filetime::set_file_mtime(&source, when).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&source, fs::Permissions::from_mode(0o750)).unwrap();
        }

        let changes = harness.pass();
        let expected_time = Utc.timestamp_opt(1_600_000_000, 500_000_000).unwrap();
        assert_eq!(changes[0].mod_time, expected_time);

        let (target, _) = harness.restore_latest();
        let restored = fs::metadata(target.path().join("script.sh")).unwrap();
        let restored_time = filetime::FileTime::from_last_modification_time(&restored);
        assert_eq!(restored_time.unix_seconds(), 1_600_000_000);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(restored.permissions().mode() & 0o7777, 0o750);
        }
    }

    #[test]
    #[traced_test]
    fn test_restore_is_additive() {
        let mut harness = JournalHarness::new();
        harness.write_file("kept.txt", b"kept");
        harness.write_file("removed.txt", b"removed");
        harness.pass();
        harness.delete_file("removed.txt");
        harness.pass();

        let target = TempDir::new().unwrap();
        fs::write(target.path().join("removed.txt"), b"already here").unwrap();
        fs::write(target.path().join("local.txt"), b"local").unwrap();

        restore(harness.backup_dir.path(), target.path()).unwrap();
        assert_eq!(fs::read(target.path().join("kept.txt")).unwrap(), b"kept");
        assert_eq!(fs::read(target.path().join("removed.txt")).unwrap(), b"already here");
        assert_eq!(fs::read(target.path().join("local.txt")).unwrap(), b"local");
    }
}

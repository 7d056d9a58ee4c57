//! Chaos tests for Strata
//!
//! Damages journals in the ways disks and crashes do (truncation, bit rot,
//! garbage, renamed or half-written files) and checks that restore skips
//! exactly the damaged segments and still rebuilds everything else.

use ::strata::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

/// A journal with one segment per file, for targeted damage
pub struct ChaosHarness {
    pub backup_dir: TempDir,
    pub segments: Vec<PathBuf>,
    rng: StdRng,
}

impl ChaosHarness {
    /// Journal `count` passes, each adding `file_<i>.txt`
    pub fn new(count: usize) -> anyhow::Result<Self> {
        let backup_dir = TempDir::new()?;
        let mut writer = JournalWriter::open(backup_dir.path(), JournalConfig::default())?;
        let mut segments = Vec::new();

        for i in 0..count {
            let record = ChangeRecord::live(
                format!("file_{}.txt", i),
                0o644,
                chrono::Utc::now(),
                format!("content {}", i).into_bytes(),
            );
            for id in writer.write_at(100 + i as u64, &[record])? {
                segments.push(backup_dir.path().join(id.file_name()));
            }
        }
        info!("Chaos journal with {} segments", segments.len());

        Ok(Self {
            backup_dir,
            segments,
            rng: StdRng::seed_from_u64(0xC4A05),
        })
    }

    pub fn backup_path(&self) -> &Path {
        self.backup_dir.path()
    }

    /// Flip `count` random bits in a segment, past the magic prefix
    pub fn corrupt_random_bits(&mut self, index: usize, count: usize) -> anyhow::Result<()> {
        let path = &self.segments[index];
        let mut bytes = fs::read(path)?;
        for _ in 0..count {
            let offset = self.rng.random_range(4..bytes.len());
            let bit = self.rng.random_range(0..8);
            bytes[offset] ^= 1 << bit;
        }
        fs::write(path, bytes)?;
        warn!("Flipped {} bits in {:?}", count, path);
        Ok(())
    }

    /// Cut a segment down to `keep` bytes
    pub fn truncate(&self, index: usize, keep: usize) -> anyhow::Result<()> {
        let path = &self.segments[index];
        let bytes = fs::read(path)?;
        fs::write(path, &bytes[..keep.min(bytes.len())])?;
        Ok(())
    }

    /// Replace a segment with random bytes
    pub fn overwrite_with_garbage(&mut self, index: usize, len: usize) -> anyhow::Result<()> {
        let mut garbage = vec![0u8; len];
        self.rng.fill(&mut garbage[..]);
        fs::write(&self.segments[index], garbage)?;
        Ok(())
    }

    /// Overwrite the length prefix of the header's checksum string
    pub fn damage_checksum_length(&self, index: usize, marker: u8) -> anyhow::Result<()> {
        let path = &self.segments[index];
        let mut bytes = fs::read(path)?;
        let (header, _) = segment::decode_segment(&bytes)?;
        let checksum = header.checksum.as_bytes();
        let at = bytes
            .windows(checksum.len())
            .position(|w| w == checksum)
            .ok_or_else(|| anyhow::anyhow!("checksum not found in {:?}", path))?;
        bytes[at - 1] = marker;
        fs::write(path, bytes)?;
        warn!("Replaced checksum length in {:?} with {:#04x}", path, marker);
        Ok(())
    }

    pub fn restore(&self) -> (TempDir, RestoreReport) {
        let target = TempDir::new().unwrap();
        let report = restore(self.backup_path(), target.path()).unwrap();
        (target, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn restored_files(target: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(target)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    #[traced_test]
    fn test_bit_flips_skip_only_damaged_segment() {
        let mut harness = ChaosHarness::new(5).unwrap();
        harness.corrupt_random_bits(2, 3).unwrap();

        let (target, report) = harness.restore();
        assert_eq!(report.corrupt_segments.len(), 1);
        assert_eq!(report.corrupt_segments[0].name, "chunk_102_000.dat");
        assert_eq!(report.segments_applied, 4);
        assert_eq!(
            restored_files(target.path()),
            vec!["file_0.txt", "file_1.txt", "file_3.txt", "file_4.txt"]
        );
    }

    #[test]
    #[traced_test]
    fn test_truncated_segments() {
        let harness = ChaosHarness::new(4).unwrap();
        harness.truncate(0, 0).unwrap();
        harness.truncate(1, 3).unwrap();
        let len = fs::metadata(&harness.segments[2]).unwrap().len() as usize;
        harness.truncate(2, len - 1).unwrap();

        let (target, report) = harness.restore();
        assert_eq!(report.corrupt_segments.len(), 3);
        assert_eq!(restored_files(target.path()), vec!["file_3.txt"]);
    }

    #[test]
    #[traced_test]
    fn test_garbage_segments() {
        let mut harness = ChaosHarness::new(3).unwrap();
        harness.overwrite_with_garbage(0, 1).unwrap();
        harness.overwrite_with_garbage(1, 4096).unwrap();

        let (target, report) = harness.restore();
        assert_eq!(report.corrupt_segments.len(), 2);
        assert!(!report.is_clean());
        assert_eq!(restored_files(target.path()), vec!["file_2.txt"]);
    }

    #[test]
    #[traced_test]
    fn test_huge_header_length_is_corrupt_not_fatal() {
        let harness = ChaosHarness::new(3).unwrap();
        harness.damage_checksum_length(1, 0xFD).unwrap();

        let (target, report) = harness.restore();
        assert_eq!(report.corrupt_segments.len(), 1);
        assert_eq!(report.corrupt_segments[0].name, "chunk_101_000.dat");
        assert_eq!(restored_files(target.path()), vec!["file_0.txt", "file_2.txt"]);
    }

    #[test]
    #[traced_test]
    fn test_every_segment_corrupt_restores_nothing() {
        let mut harness = ChaosHarness::new(3).unwrap();
        for i in 0..3 {
            harness.overwrite_with_garbage(i, 128).unwrap();
        }

        let (target, report) = harness.restore();
        assert_eq!(report.corrupt_segments.len(), 3);
        assert_eq!(report.files_restored, 0);
        assert!(restored_files(target.path()).is_empty());
    }

    #[test]
    #[traced_test]
    fn test_misnamed_and_renamed_segments() {
        let harness = ChaosHarness::new(2).unwrap();

        // Matches chunk_*.dat but does not parse
        fs::copy(&harness.segments[0], harness.backup_path().join("chunk_latest.dat")).unwrap();
        // Parses, but the header names another segment
        fs::rename(&harness.segments[1], harness.backup_path().join("chunk_500_000.dat")).unwrap();

        let (target, report) = harness.restore();
        let mut names: Vec<&str> = report.corrupt_segments.iter().map(|c| c.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["chunk_500_000.dat", "chunk_latest.dat"]);
        assert_eq!(restored_files(target.path()), vec!["file_0.txt"]);
    }

    #[test]
    #[traced_test]
    fn test_leftover_temp_files_are_ignored() {
        let harness = ChaosHarness::new(2).unwrap();
        // A crash between write and rename leaves this behind
        fs::write(harness.backup_path().join("chunk_999_000.tmp"), b"half written").unwrap();

        let (target, report) = harness.restore();
        assert!(report.is_clean());
        assert_eq!(restored_files(target.path()).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    #[traced_test]
    fn test_unreadable_segment_entry_is_corrupt() {
        let harness = ChaosHarness::new(2).unwrap();
        // A directory where a segment file should be cannot be read as one
        fs::create_dir(harness.backup_path().join("chunk_150_000.dat")).unwrap();

        let (target, report) = harness.restore();
        assert_eq!(report.corrupt_segments.len(), 1);
        assert_eq!(report.corrupt_segments[0].name, "chunk_150_000.dat");
        assert_eq!(restored_files(target.path()).len(), 2);
    }

    #[test]
    #[traced_test]
    fn test_writer_recovers_after_damage() {
        let mut harness = ChaosHarness::new(2).unwrap();
        harness.overwrite_with_garbage(1, 64).unwrap();

        // The damaged segment still holds its place in the timeline
        let mut writer = JournalWriter::open(harness.backup_path(), JournalConfig::default()).unwrap();
        assert_eq!(writer.last_timestamp(), Some(101));
        let ids = writer
            .write_at(50, &[ChangeRecord::tombstone("file_0.txt")])
            .unwrap();
        assert_eq!(ids[0], SegmentId::new(102, 0));

        let (target, report) = harness.restore();
        assert_eq!(report.corrupt_segments.len(), 1);
        assert_eq!(report.tombstoned, 1);
        assert!(restored_files(target.path()).is_empty());
    }
}

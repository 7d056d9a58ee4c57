//! Main test module for Strata
//!
//! This module includes all test suites:
//! - Integration tests for multi-pass journal scenarios
//! - Chaos tests for damaged journals
//! - Property-based tests for replay invariants

pub mod chaos;
pub mod integration;

#[cfg(test)]
mod edge_cases {
    use ::strata::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let mut snapshot = Snapshot::new();

        let changes = diff(temp_dir.path(), &mut snapshot).unwrap();
        assert!(changes.is_empty());
        assert!(write_changes(backup_dir.path(), &changes).unwrap().is_empty());

        // Nothing was journaled, so there is nothing to restore
        let target = TempDir::new().unwrap();
        assert!(restore(backup_dir.path(), target.path()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_special_filenames() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();

        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file_with_underscores.txt",
            "file.multiple.dots.txt",
            "UPPERCASE.TXT",
            "ünïcödé.txt",
            "emoji_😀.txt",
            ".hidden",
        ];
        for name in &special_names {
            fs::write(temp_dir.path().join(name), format!("Content of {}", name)).unwrap();
        }

        let mut snapshot = Snapshot::new();
        let changes = diff(temp_dir.path(), &mut snapshot).unwrap();
        assert_eq!(changes.len(), special_names.len());
        write_changes(backup_dir.path(), &changes).unwrap();

        restore(backup_dir.path(), target_dir.path()).unwrap();
        for name in &special_names {
            let content = fs::read_to_string(target_dir.path().join(name)).unwrap();
            assert_eq!(content, format!("Content of {}", name));
        }
    }

    #[test]
    fn test_zero_byte_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("empty"), b"").unwrap();

        let mut snapshot = Snapshot::new();
        let changes = diff(temp_dir.path(), &mut snapshot).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(!changes[0].deleted);
        write_changes(backup_dir.path(), &changes).unwrap();

        let report = restore(backup_dir.path(), target_dir.path()).unwrap();
        assert_eq!(report.files_restored, 1);
        assert_eq!(fs::read(target_dir.path().join("empty")).unwrap(), b"");
    }

    #[test]
    fn test_deeply_nested_paths() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();

        let mut nested = temp_dir.path().to_path_buf();
        for i in 0..20 {
            nested = nested.join(format!("level_{}", i));
        }
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("deep.txt"), "deep").unwrap();

        let mut snapshot = Snapshot::new();
        let changes = diff(temp_dir.path(), &mut snapshot).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].path.starts_with("level_0/level_1/"));
        write_changes(backup_dir.path(), &changes).unwrap();

        restore(backup_dir.path(), target_dir.path()).unwrap();
        let restored = nested
            .strip_prefix(temp_dir.path())
            .map(|rel| target_dir.path().join(rel).join("deep.txt"))
            .unwrap();
        assert_eq!(fs::read_to_string(restored).unwrap(), "deep");
    }

    #[test]
    fn test_empty_directories_are_not_journaled() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a").join("b")).unwrap();

        let mut snapshot = Snapshot::new();
        assert!(diff(temp_dir.path(), &mut snapshot).unwrap().is_empty());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_restore_into_missing_nested_target() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let mut snapshot = Snapshot::new();
        let changes = diff(temp_dir.path(), &mut snapshot).unwrap();
        write_changes(backup_dir.path(), &changes).unwrap();

        let target = backup_dir.path().join("does").join("not").join("exist");
        restore(backup_dir.path(), &target).unwrap();
        assert_eq!(fs::read_to_string(target.join("a.txt")).unwrap(), "a");
    }

    #[test]
    fn test_foreign_files_in_backup_location_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        fs::write(backup_dir.path().join("README"), "not a segment").unwrap();
        fs::write(backup_dir.path().join("chunk_1_000.dat.tmp"), "leftover").unwrap();

        let mut snapshot = Snapshot::new();
        let changes = diff(temp_dir.path(), &mut snapshot).unwrap();
        write_changes(backup_dir.path(), &changes).unwrap();

        let report = restore(backup_dir.path(), target_dir.path()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.segments_applied, 1);
    }
}

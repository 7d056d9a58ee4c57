//! Utility functions for Strata
//!
//! ### File Operations
//! - File content fingerprinting (SHA-256)
//! - File metadata extraction
//! - Atomic file writing
//! - Permission and modification-time handling (cross-platform)
//!
//! ### Path Manipulation
//! - Slash-normalized relative paths for journal records
//! - Resolving journal paths back under a restore target
//!
//! ### Display
//! - Byte formatting (human-readable sizes)

use crate::error::{Result, StrataError};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

/// Hash a file's content using SHA-256
///
/// Streams the file through an 8KB buffer, so memory use does not depend on
/// file size. Symbolic links are followed.
///
/// # Returns
///
/// The digest as a 64-character lowercase hexadecimal string.
///
/// # Errors
///
/// - [`StrataError::Io`] if the file cannot be opened or read
pub fn hash_file_content(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192]; // 8KB buffer

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash in-memory data using SHA-256
///
/// Produces the same digest as [`hash_file_content`] for a file holding
/// `data`. Empty input hashes to the fixed SHA-256 of the empty string.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// File metadata container
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Unix-style permission bits (e.g., 0o644)
    pub permissions: u32,
    /// Last modification timestamp
    pub modified: SystemTime,
    /// Whether the path itself is a symbolic link
    pub is_symlink: bool,
    /// FIFO, socket, or device node
    pub is_special: bool,
}

/// Get file metadata, following symbolic links
///
/// `is_symlink` still reports whether `path` itself is a link, so callers can
/// log it; everything else describes the link target.
pub fn get_file_metadata(path: &Path) -> Result<FileMetadata> {
    let link_metadata = fs::symlink_metadata(path)?;
    let metadata = if link_metadata.file_type().is_symlink() {
        fs::metadata(path)?
    } else {
        link_metadata.clone()
    };

    let file_type = metadata.file_type();
    Ok(FileMetadata {
        size: metadata.len(),
        permissions: get_permissions(&metadata),
        modified: metadata.modified()?,
        is_symlink: link_metadata.file_type().is_symlink(),
        is_special: !file_type.is_file() && !file_type.is_dir(),
    })
}

/// Get Unix permission bits from metadata
#[cfg(unix)]
fn get_permissions(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Get permissions from metadata (Windows implementation)
#[cfg(windows)]
fn get_permissions(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Set Unix permissions
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    Ok(())
}

/// Set permissions (Windows implementation)
///
/// Only the owner write bit is meaningful: it maps to the read-only attribute.
#[cfg(windows)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Set a file's modification time (access time is set to the same value)
pub fn set_modified(path: &Path, modified: &DateTime<Utc>) -> Result<()> {
    let time = FileTime::from_unix_time(modified.timestamp(), modified.timestamp_subsec_nanos());
    filetime::set_file_times(path, time, time)?;
    Ok(())
}

/// Convert a filesystem timestamp to UTC
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    time.into()
}

/// Path of `path` relative to `base`, as a forward-slash string
///
/// Journal paths are OS-independent: components are joined with `/`
/// regardless of the platform separator.
///
/// # Errors
///
/// - [`StrataError::NonUtf8Path`] if a component is not valid UTF-8
/// - [`StrataError::Internal`] if `path` is not under `base`
pub fn normalize_relative(path: &Path, base: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| {
        StrataError::internal(format!("Path {:?} is not relative to {:?}", path, base))
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| StrataError::NonUtf8Path(path.to_path_buf()))?;
                parts.push(part);
            }
            Component::CurDir => {}
            other => {
                return Err(StrataError::internal(format!(
                    "Unexpected component {:?} in {:?}",
                    other, relative
                )))
            }
        }
    }

    Ok(parts.join("/"))
}

/// Resolve a journal path under `root`
///
/// Splits on `/` and rejects empty paths, absolute paths, and any `..`
/// component so a record can never be materialized outside `root`.
pub fn resolve_record_path(root: &Path, record_path: &str) -> Result<PathBuf> {
    let invalid = || StrataError::InvalidRecordPath(record_path.to_string());

    if record_path.is_empty()
        || record_path.starts_with('/')
        || (cfg!(windows) && record_path.contains('\\'))
    {
        return Err(invalid());
    }

    let mut resolved = root.to_path_buf();
    let mut depth = 0;
    for part in record_path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(invalid()),
            _ => {
                if Path::new(part).components().count() != 1
                    || !matches!(Path::new(part).components().next(), Some(Component::Normal(_)))
                {
                    return Err(invalid());
                }
                resolved.push(part);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(invalid());
    }
    Ok(resolved)
}

/// Atomic file write (write to temp file then rename)
///
/// The target is either absent or complete; a crash mid-write leaves at most
/// a `.tmp` sibling behind.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    if let Err(e) = fs::write(&temp_path, content) {
        fs::remove_file(&temp_path).ok();
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        fs::remove_file(&temp_path).ok();
        return Err(e.into());
    }

    Ok(())
}

/// Remove a file or symlink at `path` if one exists
///
/// Directories are left alone; writing over one fails later with an I/O
/// error, which is what the caller should see.
pub fn remove_existing_file(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if !metadata.is_dir() => {
            fs::remove_file(path)?;
            trace!("Removed existing file at {:?}", path);
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Format bytes in human-readable form (binary units)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

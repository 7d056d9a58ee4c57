//! Error types for the Strata library
//!
//! Every fallible operation returns [`Result<T>`], whose error side is
//! [`StrataError`]. The variants fall into three families that drive how the
//! watch loop and the restore path react:
//!
//! - **I/O** ([`StrataError::Io`], [`StrataError::WalkDir`]): filesystem
//!   read/write/create failures. Logged and retried on the next watch cycle;
//!   fatal for restore only when the target cannot be written.
//! - **Not found** ([`StrataError::JournalNotFound`]): a restore was asked for
//!   but the backup location holds no segments at all.
//! - **Decode** ([`StrataError::Decode`]): a segment's bytes are not a valid
//!   record list. Restore skips such segments and reports them.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the Strata library
pub type Result<T> = std::result::Result<T, StrataError>;

/// Main error type for all Strata operations
#[derive(Debug, Error)]
pub enum StrataError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk failed (unreadable directory, entry vanished mid-walk)
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Errors reading or writing JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No journal segments exist at the backup location
    #[error("No backup chunks found in {0:?}")]
    JournalNotFound(PathBuf),

    /// Segment bytes do not parse as a valid record list
    #[error("Decode error: {0}")]
    Decode(String),

    /// Segment could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// File name does not follow the `chunk_<timestamp>_<seq>.dat` layout
    #[error("Invalid segment name: {0}")]
    InvalidSegmentName(String),

    /// Path has a component that is not valid UTF-8
    #[error("Path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),

    /// Record path would escape the restore target
    #[error("Invalid record path: {0}")]
    InvalidRecordPath(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Ignore pattern failed to compile
    #[error("Invalid ignore pattern: {0}")]
    InvalidPattern(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bincode::error::DecodeError> for StrataError {
    fn from(err: bincode::error::DecodeError) -> Self {
        StrataError::Decode(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for StrataError {
    fn from(err: bincode::error::EncodeError) -> Self {
        StrataError::Encode(err.to_string())
    }
}

impl From<globset::Error> for StrataError {
    fn from(err: globset::Error) -> Self {
        StrataError::InvalidPattern(err.to_string())
    }
}

impl StrataError {
    /// Create a decode error with a custom message
    pub fn decode(msg: impl Into<String>) -> Self {
        StrataError::Decode(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        StrataError::Internal(msg.into())
    }

    /// Create a configuration error with a custom message
    pub fn config(msg: impl Into<String>) -> Self {
        StrataError::InvalidConfiguration(msg.into())
    }

    /// Filesystem failure (read, write, create, walk)
    pub fn is_io(&self) -> bool {
        matches!(self, StrataError::Io(_) | StrataError::WalkDir(_))
    }

    /// Segment content could not be decoded
    pub fn is_decode(&self) -> bool {
        matches!(self, StrataError::Decode(_))
    }

    /// Path cannot be stored as a record path
    pub fn is_non_utf8(&self) -> bool {
        matches!(self, StrataError::NonUtf8Path(_))
    }

    /// The backup location holds no journal
    pub fn is_not_found(&self) -> bool {
        matches!(self, StrataError::JournalNotFound(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            StrataError::JournalNotFound(path) => {
                format!(
                    "No backup chunks found in {:?}. Check the --backup path or run 'strata watch' first.",
                    path
                )
            }
            StrataError::InvalidConfiguration(msg) => {
                format!("Invalid configuration: {}. See 'strata --help'.", msg)
            }
            _ => self.to_string(),
        }
    }
}

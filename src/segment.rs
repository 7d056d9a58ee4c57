//! Journal segment naming and binary encoding
//!
//! ## File names
//!
//! Each segment lives in its own file named `chunk_<timestamp>_<seq>.dat`:
//! `<timestamp>` is the writer invocation's Unix epoch second in plain decimal
//! and `<seq>` is the segment's position within that invocation, zero-padded
//! to three digits. The name is the ordering key of the journal. Readers parse
//! both fields and sort numerically, so ordering stays correct even when the
//! timestamp's digit width changes.
//!
//! ## File layout
//!
//! ```text
//! +--------+---------------------------+---------------------------+
//! | "STRJ" | bincode(SegmentHeader)    | bincode(Vec<ChangeRecord>)|
//! +--------+---------------------------+---------------------------+
//! ```
//!
//! The header repeats the segment id, counts the records and carries the
//! payload length and its SHA-256, so truncation and bit rot are detected
//! before any record is trusted.

use crate::error::{Result, StrataError};
use crate::types::ChangeRecord;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// File name prefix of every segment
pub const SEGMENT_PREFIX: &str = "chunk_";

/// File extension of every segment
pub const SEGMENT_EXTENSION: &str = "dat";

/// Leading bytes of every segment file
pub const SEGMENT_MAGIC: &[u8; 4] = b"STRJ";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on the encoded header size
///
/// A damaged length prefix inside the header must fail the decode rather
/// than drive an allocation sized by garbage.
pub const MAX_HEADER_LEN: usize = 4096;

/// Position of a segment in the journal: `(timestamp, sequence)`
///
/// The derived ordering compares the timestamp first, then the sequence,
/// which is the chronological order of the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId {
    /// Writer invocation time, seconds since the Unix epoch
    pub timestamp: u64,
    /// Index within the invocation, starting at 0
    pub sequence: u32,
}

impl SegmentId {
    /// Create a segment id
    pub fn new(timestamp: u64, sequence: u32) -> Self {
        Self { timestamp, sequence }
    }

    /// File name for this segment, e.g. `chunk_1700000000_000.dat`
    pub fn file_name(&self) -> String {
        format!(
            "{}{}_{:03}.{}",
            SEGMENT_PREFIX, self.timestamp, self.sequence, SEGMENT_EXTENSION
        )
    }

    /// Whether `name` looks like a segment file (`chunk_*.dat`)
    pub fn is_segment_name(name: &str) -> bool {
        name.starts_with(SEGMENT_PREFIX)
            && name.len() > SEGMENT_PREFIX.len() + SEGMENT_EXTENSION.len() + 1
            && name.ends_with(&format!(".{}", SEGMENT_EXTENSION))
    }

    /// Parse a segment file name
    ///
    /// # Errors
    ///
    /// - [`StrataError::InvalidSegmentName`] if the name does not match
    ///   `chunk_<digits>_<digits>.dat` with a sequence of at least 3 digits
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || StrataError::InvalidSegmentName(name.to_string());

        let stem = name
            .strip_prefix(SEGMENT_PREFIX)
            .and_then(|rest| rest.strip_suffix(&format!(".{}", SEGMENT_EXTENSION)))
            .ok_or_else(invalid)?;
        let (timestamp, sequence) = stem.split_once('_').ok_or_else(invalid)?;

        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(timestamp) || !all_digits(sequence) || sequence.len() < 3 {
            return Err(invalid());
        }

        Ok(Self {
            timestamp: timestamp.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

impl FromStr for SegmentId {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Fixed-size-ish header preceding the record payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHeader {
    /// On-disk format version
    pub format_version: u32,
    /// Segment this file claims to be
    pub id: SegmentId,
    /// Number of records in the payload
    pub record_count: u64,
    /// Length of the encoded payload in bytes
    pub payload_len: u64,
    /// Hex SHA-256 of the encoded payload
    pub checksum: String,
}

/// Encode `records` as the segment `id`
pub fn encode_segment(id: SegmentId, records: &[ChangeRecord]) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    let payload = bincode::serde::encode_to_vec(records, config)?;
    let header = SegmentHeader {
        format_version: FORMAT_VERSION,
        id,
        record_count: records.len() as u64,
        payload_len: payload.len() as u64,
        checksum: utils::hash_data(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, config)?;

    let mut bytes = Vec::with_capacity(SEGMENT_MAGIC.len() + header_bytes.len() + payload.len());
    bytes.extend_from_slice(SEGMENT_MAGIC);
    bytes.extend_from_slice(&header_bytes);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a segment file's bytes
///
/// # Errors
///
/// - [`StrataError::Decode`] on a missing magic prefix, an oversized or
///   unparseable header, unknown format version, length or checksum mismatch,
///   record count mismatch, or bytes that do not parse
pub fn decode_segment(bytes: &[u8]) -> Result<(SegmentHeader, Vec<ChangeRecord>)> {
    let config = bincode::config::standard();

    let body = bytes
        .strip_prefix(SEGMENT_MAGIC.as_slice())
        .ok_or_else(|| StrataError::decode("missing segment magic"))?;

    let (header, header_len): (SegmentHeader, usize) =
        bincode::serde::decode_from_slice(body, config.with_limit::<MAX_HEADER_LEN>())?;
    if header.format_version != FORMAT_VERSION {
        return Err(StrataError::decode(format!(
            "unsupported format version {}",
            header.format_version
        )));
    }

    let payload = &body[header_len..];
    if payload.len() as u64 != header.payload_len {
        return Err(StrataError::decode(format!(
            "payload is {} bytes, header declares {}",
            payload.len(),
            header.payload_len
        )));
    }

    // Nothing in the payload is trusted until it matches the checksum
    let checksum = utils::hash_data(payload);
    if checksum != header.checksum {
        return Err(StrataError::decode(format!(
            "checksum mismatch: expected {}, actual {}",
            header.checksum, checksum
        )));
    }

    let (records, used): (Vec<ChangeRecord>, usize) =
        bincode::serde::decode_from_slice(payload, config)?;
    if used != payload.len() || records.len() as u64 != header.record_count {
        return Err(StrataError::decode(format!(
            "decoded {} records from {} of {} payload bytes, header declares {} records",
            records.len(),
            used,
            payload.len(),
            header.record_count
        )));
    }

    Ok((header, records))
}

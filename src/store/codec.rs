//! Line codec for prediction records
//!
//! One record is one JSON object followed by `\n`. `serde_json` escapes
//! control characters inside strings, so an encoded record never contains a
//! raw newline and each line is self-delimited.

use crate::types::prediction::{PredictionRecord, RecordViolation};
use thiserror::Error;

/// Longest line, terminator included, a record may occupy
pub const MAX_RECORD_LEN: usize = 1 << 20;

/// Why a line is not a usable record
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or not shaped like a record
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Well-formed, but breaks a record invariant
    #[error("invalid record: {0}")]
    Invalid(#[from] RecordViolation),

    /// Longer than [`MAX_RECORD_LEN`]; the line was discarded unread
    #[error("line exceeds {max} bytes")]
    TooLong { max: usize },
}

/// Encode a record as a complete, newline-terminated line
pub fn encode(record: &PredictionRecord) -> serde_json::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

/// Decode one line (with or without its terminator)
pub fn decode(line: &[u8]) -> Result<PredictionRecord, DecodeError> {
    let record: PredictionRecord = serde_json::from_slice(trim_line(line))?;
    record.validate()?;
    Ok(record)
}

/// Whether a line carries no content at all
pub fn is_blank(line: &[u8]) -> bool {
    trim_line(line).iter().all(u8::is_ascii_whitespace)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

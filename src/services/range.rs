//! Byte-range resolution for partial-content responses.
//!
//! Only the single-range form `bytes=<start>-<end>?` is understood. Framing
//! (status codes, headers) is left to the caller.

use thiserror::Error;

/// Slice served when a range omits its end: 10 MB
pub const DEFAULT_RANGE_CHUNK: u64 = 10 * 1024 * 1024;

const BYTES_UNIT: &str = "bytes=";

/// The concrete slice of a file to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServedSlice {
    pub start: u64,
    /// Inclusive. Meaningless when `length == 0` (empty file, full response).
    pub end: u64,
    pub total_size: u64,
    pub length: u64,
    /// `true` when the client asked for a range and gets a 206.
    pub partial: bool,
}

impl ServedSlice {
    pub fn full(total_size: u64) -> Self {
        Self {
            start: 0,
            end: total_size.saturating_sub(1),
            total_size,
            length: total_size,
            partial: false,
        }
    }

    /// Value for the `Content-Range` header of a 206 response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range header must use the form 'bytes=<start>-<end>'")]
    Malformed,

    #[error("multiple ranges are not supported")]
    MultipleRanges,

    #[error("range start is required")]
    MissingStart,

    #[error("invalid range bound: {0:?}")]
    InvalidNumber(String),

    #[error("range start {start} is beyond the resource size {total_size}")]
    Unsatisfiable { start: u64, total_size: u64 },

    #[error("range start {start} is after range end {end}")]
    Inverted { start: u64, end: u64 },
}

/// Resolves an optional `Range` header against a file of `total_size` bytes.
///
/// An open-ended range (`bytes=500-`) is capped at `default_chunk` bytes; an
/// explicit end past the last byte is clamped to it.
pub fn resolve(
    total_size: u64,
    header: Option<&str>,
    default_chunk: u64,
) -> Result<ServedSlice, RangeError> {
    let Some(header) = header else {
        return Ok(ServedSlice::full(total_size));
    };

    let spec = header
        .trim()
        .strip_prefix(BYTES_UNIT)
        .ok_or(RangeError::Malformed)?;

    if spec.contains(',') {
        return Err(RangeError::MultipleRanges);
    }

    let (start_part, end_part) = spec.split_once('-').ok_or(RangeError::Malformed)?;
    let start_part = start_part.trim();
    let end_part = end_part.trim();

    if start_part.is_empty() {
        return Err(RangeError::MissingStart);
    }
    let start = parse_bound(start_part)?;
    let end = if end_part.is_empty() {
        None
    } else {
        Some(parse_bound(end_part)?)
    };

    if start >= total_size {
        return Err(RangeError::Unsatisfiable { start, total_size });
    }

    let last = total_size - 1;
    let end = match end {
        Some(end) if end < start => return Err(RangeError::Inverted { start, end }),
        Some(end) => end.min(last),
        None => start
            .saturating_add(default_chunk.max(1) - 1)
            .min(last),
    };

    Ok(ServedSlice {
        start,
        end,
        total_size,
        length: end - start + 1,
        partial: true,
    })
}

fn parse_bound(raw: &str) -> Result<u64, RangeError> {
    // u64::from_str accepts a leading '+', which is not valid in a range
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::InvalidNumber(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| RangeError::InvalidNumber(raw.to_string()))
}

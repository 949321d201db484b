//! Record codec.
//!
//! Encodes and decodes a single WAL record to/from its on-disk frame:
//!
//! ```text
//! [timestamp: i64 BE][key_len: u32 BE][key][value_len: u32 BE][value][crc32: u32 BE]
//! ```
//!
//! The trailing CRC32 (IEEE polynomial) covers every preceding byte of the
//! frame. Decoding never infers frame boundaries from the buffer length
//! alone — callers concatenating frames must track each frame's length
//! themselves to slice correctly.

use crc32fast::Hasher as Crc32;
use thiserror::Error;

use super::Completion;

/// Fixed frame overhead: `timestamp(8) + key_len(4) + value_len(4) + crc32(4)`.
pub const FRAME_OVERHEAD: usize = 20;

/// Errors returned by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// Fewer than [`FRAME_OVERHEAD`] bytes were supplied.
    #[error("frame shorter than the {FRAME_OVERHEAD}-byte fixed header ({0} bytes)")]
    ShortHeader(usize),

    /// The declared key or value length would read past the end of the
    /// supplied bytes.
    #[error("frame truncated before its declared key/value bytes")]
    ShortFrame,

    /// The trailing CRC32 did not match the recomputed checksum.
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// A single durable log entry.
///
/// `completion` is transient: a one-shot channel the committer uses to
/// notify the original caller once this record's batch has been flushed.
/// It is never part of the encoded frame and is always `None` on a record
/// produced by [`decode`].
pub struct Record {
    /// Wall-clock timestamp, nanoseconds since the Unix epoch.
    ///
    /// Informational only: concurrent callers may be enqueued in an order
    /// that does not match timestamp order (see the `wal` module docs).
    pub timestamp: i64,
    /// Arbitrary key bytes.
    pub key: Vec<u8>,
    /// Arbitrary value bytes.
    pub value: Vec<u8>,
    pub(crate) completion: Option<Completion>,
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("timestamp", &self.timestamp)
            .field("key", &self.key)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Record {
    /// Compares only the durable fields; the completion signal is transient
    /// and never part of a record's identity.
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.key == other.key && self.value == other.value
    }
}

impl Record {
    /// Builds a record with no completion signal attached.
    ///
    /// This is what [`decode`] returns, and is also the natural constructor
    /// for tests exercising the codec in isolation.
    pub fn new(timestamp: i64, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            timestamp,
            key,
            value,
            completion: None,
        }
    }

    pub(crate) fn with_completion(
        timestamp: i64,
        key: Vec<u8>,
        value: Vec<u8>,
        completion: Completion,
    ) -> Self {
        Self {
            timestamp,
            key,
            value,
            completion: Some(completion),
        }
    }

    /// Size in bytes of this record's encoded frame, without allocating it.
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.key.len() + self.value.len()
    }
}

/// Encodes `record` into a freshly allocated frame (see module docs).
pub fn encode(record: &Record) -> Vec<u8> {
    let mut buf = Vec::with_capacity(record.encoded_len());

    buf.extend_from_slice(&record.timestamp.to_be_bytes());
    buf.extend_from_slice(&(record.key.len() as u32).to_be_bytes());
    buf.extend_from_slice(&record.key);
    buf.extend_from_slice(&(record.value.len() as u32).to_be_bytes());
    buf.extend_from_slice(&record.value);

    let mut hasher = Crc32::new();
    hasher.update(&buf);
    buf.extend_from_slice(&hasher.finalize().to_be_bytes());

    buf
}

/// Decodes a single frame. Returns a record with `completion` unset.
///
/// Fails with [`FrameError::ShortHeader`] if `data` is under
/// [`FRAME_OVERHEAD`] bytes, [`FrameError::ShortFrame`] if the declared key
/// or value length would read past `data`, and
/// [`FrameError::ChecksumMismatch`] if the recomputed CRC32 disagrees with
/// the trailing one.
pub fn decode(data: &[u8]) -> Result<Record, FrameError> {
    if data.len() < FRAME_OVERHEAD {
        return Err(FrameError::ShortHeader(data.len()));
    }

    let timestamp = i64::from_be_bytes(data[0..8].try_into().unwrap());
    let key_len = u32::from_be_bytes(data[8..12].try_into().unwrap()) as usize;

    let key_start = 12;
    let key_end = key_start
        .checked_add(key_len)
        .ok_or(FrameError::ShortFrame)?;
    if data.len() < key_end + 4 {
        return Err(FrameError::ShortFrame);
    }

    let value_len = u32::from_be_bytes(data[key_end..key_end + 4].try_into().unwrap()) as usize;
    let value_start = key_end + 4;
    let value_end = value_start
        .checked_add(value_len)
        .ok_or(FrameError::ShortFrame)?;
    if data.len() < value_end + 4 {
        return Err(FrameError::ShortFrame);
    }

    let mut hasher = Crc32::new();
    hasher.update(&data[..value_end]);
    let computed = hasher.finalize();
    let stored = u32::from_be_bytes(data[value_end..value_end + 4].try_into().unwrap());
    if computed != stored {
        return Err(FrameError::ChecksumMismatch);
    }

    Ok(Record::new(
        timestamp,
        data[key_start..key_end].to_vec(),
        data[value_start..value_end].to_vec(),
    ))
}

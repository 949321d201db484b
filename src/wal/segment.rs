//! Segment — one fixed-size, `mmap`-backed WAL file.
//!
//! A [`Segment`] owns exactly one `wal_<index>.db` file, truncated to a
//! fixed size and mapped read/write for its entire lifetime. It holds no
//! lock of its own: the WAL committer is its sole owner and mutator after
//! construction (see the `wal` module docs).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors returned by [`Segment`] operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SegmentError {
    /// Underlying I/O failure opening, truncating, mapping, or flushing the
    /// segment file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Clone for SegmentError {
    fn clone(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }
}

/// One fixed-size, memory-mapped WAL segment file.
pub struct Segment {
    // Held for its lifetime only — closing the fd happens when this (and
    // `mmap`) drop. Neither memmap2 nor std::fs::File surface an error from
    // that point, so `close()` only surfaces the final `flush()`.
    file: File,
    mmap: MmapMut,
    path: PathBuf,
    index: u64,
    size: u64,
    offset: u64,
}

impl Segment {
    /// Opens (creating if absent) `wal_<index>.db` under `folder`, truncates
    /// it to `size` bytes, and maps it read/write. The write offset always
    /// starts at 0 — reopening a non-empty segment for append replay is
    /// outside this crate's scope.
    pub fn open(folder: &Path, index: u64, size: u64) -> Result<Self, SegmentError> {
        let path = folder.join(format!("wal_{index}.db"));

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.set_len(size)?;

        // SAFETY: this `Segment` is the only handle that maps `path` for as
        // long as the mapping lives; the WAL committer never shares it with
        // another thread or remaps the same file concurrently.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        debug!(path = %path.display(), index, size, "WAL segment opened");

        Ok(Self {
            file,
            mmap,
            path,
            index,
            size,
            offset: 0,
        })
    }

    /// Segment index — the `N` in `wal_<N>.db`.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Current write offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff appending `bytes` would overflow the segment.
    pub fn is_full(&self, bytes: &[u8]) -> bool {
        self.offset + bytes.len() as u64 > self.size
    }

    /// Copies `bytes` into the mapping at the current offset and advances
    /// it. The caller must have checked [`Segment::is_full`] first; this
    /// never rolls over or truncates on its own, and never flushes.
    pub fn append(&mut self, bytes: &[u8]) {
        let start = self.offset as usize;
        let end = start + bytes.len();
        self.mmap[start..end].copy_from_slice(bytes);
        self.offset = end as u64;
        trace!(index = self.index, offset = self.offset, "segment append");
    }

    /// Synchronous `msync` of the mapping.
    pub fn flush(&self) -> Result<(), SegmentError> {
        self.mmap.flush()?;
        Ok(())
    }

    /// Flushes the mapping. The unmap and fd-close steps happen implicitly
    /// when this segment is dropped — Rust's ownership model makes those
    /// steps infallible from the caller's perspective, so this method
    /// surfaces only the flush error.
    pub fn close(&mut self) -> Result<(), SegmentError> {
        self.flush()
    }
}

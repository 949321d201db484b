//! Metadata — the single-file record of which segment is currently active.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Filename of the metadata file within the WAL folder.
pub const METADATA_FILENAME: &str = "wal.meta";

/// Errors returned by [`Metadata`] operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MetadataError {
    /// Underlying I/O failure opening, reading, writing, or syncing
    /// `wal.meta`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `wal.meta` existed but its content did not parse as a base-10
    /// non-negative integer.
    #[error("wal.meta content is not a valid segment index: {0:?}")]
    InvalidIndex(String),
}

impl Clone for MetadataError {
    fn clone(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::InvalidIndex(s) => Self::InvalidIndex(s.clone()),
        }
    }
}

/// Handle to `wal.meta`: the ASCII-decimal current segment index.
pub struct Metadata {
    file: File,
    path: PathBuf,
    index: u64,
}

impl Metadata {
    /// Reads the current index from `<folder>/wal.meta` if present (else
    /// `0`), then reopens the file truncated for subsequent rewrites.
    ///
    /// A parse failure on an existing `wal.meta` is fatal — returned as
    /// [`MetadataError::InvalidIndex`], never a panic.
    pub fn open(folder: &Path) -> Result<Self, MetadataError> {
        let path = folder.join(METADATA_FILENAME);

        let index = match File::open(&path) {
            Ok(mut f) => {
                let mut contents = String::new();
                f.read_to_string(&mut contents)?;
                contents
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| MetadataError::InvalidIndex(contents))?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        debug!(path = %path.display(), index, "WAL metadata opened");

        Ok(Self { file, path, index })
    }

    /// Current in-memory segment index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Updates the in-memory index. Does not persist — call
    /// [`Metadata::write`] afterward.
    pub fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the file with the ASCII-decimal current index (no
    /// newline, no padding). Does not fsync — the file is synced only on
    /// [`Metadata::close`].
    pub fn write(&mut self) -> Result<(), MetadataError> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(self.index.to_string().as_bytes())?;
        Ok(())
    }

    /// Fsyncs and closes.
    pub fn close(self) -> Result<(), MetadataError> {
        self.file.sync_all()?;
        Ok(())
    }
}

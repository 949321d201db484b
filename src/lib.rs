//! # aeternus-wal
//!
//! A durable, segmented, group-commit **write-ahead log** backed by
//! memory-mapped files. Extracted from the write-ahead logging layer of an
//! LSM-tree storage engine into a standalone durability primitive.
//!
//! ## Architecture
//!
//! ```text
//! caller ──append──► bounded channel ──► committer thread ──► active segment (mmap) ──msync──► caller wakes
//!                                              │
//!                                              ├─ rolls to the next wal_<N>.db when the segment fills
//!                                              └─ rewrites wal.meta with the new active index
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`wal`] | The `Wal` coordinator: open, append, close, and the committer loop |
//! | [`wal::codec`] | CRC32-protected binary frame encoding for a single record |
//! | [`wal::segment`] | One fixed-size, `mmap`-backed `wal_<N>.db` file |
//! | [`wal::metadata`] | `wal.meta` — the ASCII-decimal index of the active segment |
//!
//! ## Key Features
//!
//! - **Group commit** — a single committer thread batches concurrent
//!   callers into one `msync` per batch instead of one fsync per record.
//! - **CRC32 integrity** — every frame is checksummed; a corrupted frame is
//!   detected on decode, never silently accepted.
//! - **Bounded backpressure** — the request queue has a fixed capacity;
//!   callers block on a full queue rather than growing memory unbounded.
//! - **Conservative failure handling** — a fatal I/O error poisons the log:
//!   every waiter in the failing batch is woken with the error, and every
//!   later `append` fails fast instead of hanging.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aeternus_wal::Wal;
//!
//! let wal = Wal::open("/tmp/my_wal").unwrap();
//!
//! wal.append(b"hello".to_vec(), b"world".to_vec()).unwrap();
//!
//! wal.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod wal;

pub use wal::{Wal, WalConfig, WalError};

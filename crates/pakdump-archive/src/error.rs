//! Error types for the archive crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when reading a sharded archive.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] pakdump_common::Error),

    /// The index stream is too short to hold its header.
    #[error("index stream too short: resource count at {offset:#x} is unreadable")]
    IndexTooShort { offset: u64 },

    /// No file in the shard directory matched the naming convention.
    #[error("no shard files found in {}", dir.display())]
    NoShards { dir: PathBuf },

    /// Two shard files share an ordinal.
    #[error("duplicate shard ordinal {ordinal}: {} and {}", first.display(), second.display())]
    DuplicateShard {
        ordinal: u32,
        first: PathBuf,
        second: PathBuf,
    },

    /// The shard naming pattern has no capture group for the ordinal.
    #[error("invalid shard pattern: {0}")]
    InvalidShardPattern(String),

    /// A requested byte run lies outside the virtual address space.
    #[error("range out of bounds: start {start:#x}, length {length} (virtual size {total:#x})")]
    OutOfRange { start: i64, length: i64, total: u64 },

    /// A requested byte run starts in one shard and ends in another.
    #[error("range crosses shard boundary: start {start:#x}, length {length} in shard {shard}")]
    CrossesShardBoundary { start: u64, length: u64, shard: u32 },

    /// A raw record is shorter than its fixed header or declares more payload than it holds.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Decompressed output does not have the declared length.
    #[error("decompressed length mismatch: expected {expected} bytes, {found}")]
    DataIntegrity { expected: i64, found: String },

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

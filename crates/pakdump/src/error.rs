//! Error types for extraction runs.

use std::io;

use thiserror::Error;

/// Errors that abort an extraction run.
///
/// Failures of a single record never abort a run; they are reported as
/// [`crate::RecordError`] through events and counted in the stats.
#[derive(Debug, Error)]
pub enum Error {
    /// Index or shard failure outside a single record
    #[error(transparent)]
    Archive(#[from] pakdump_archive::Error),

    /// Output root or filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The rayon pool could not be built
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    /// A worker thread panicked before the queue drained
    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

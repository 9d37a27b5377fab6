//! Per-record events and the observer interface.

use std::fmt;
use std::path::PathBuf;

use pakdump_archive::{CompressionType, Record, ResourceLocator};
use pakdump_sniff::FileType;
use thiserror::Error;

use crate::Error;

/// Pipeline stage a record failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Stage {
    /// Reading the byte run from its shard
    Read,
    /// Parsing the record header
    Decode,
    /// Decompressing the payload
    Decompress,
    /// Creating the output directory or writing the file
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Decode => "decode",
            Self::Decompress => "decompress",
            Self::Write => "write",
        })
    }
}

/// A single record's failure, tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct RecordError {
    /// Stage the record failed in
    pub stage: Stage,
    /// Underlying failure
    #[source]
    pub source: Error,
}

impl RecordError {
    /// Tag `source` with the stage it happened in.
    pub fn new(stage: Stage, source: impl Into<Error>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// What happened to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "outcome", rename_all = "lowercase"))]
pub enum Outcome {
    /// The record was written to `path`.
    Extracted {
        /// Detected type, also the file extension
        file_type: FileType,
        /// Output file
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },
    /// The record was skipped.
    Failed {
        /// Stage the record failed in
        stage: Stage,
        /// Error message
        error: String,
    },
}

impl Outcome {
    /// True if the record was written.
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }
}

/// Structured report for one processed record.
///
/// Header fields are `None` when the record failed before they were known.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtractionEvent {
    /// 1-based position in the index
    pub sequence: u64,
    /// Resource count declared by the index header
    pub total: u32,
    /// Token as 16 uppercase hex digits
    pub token: String,
    /// Virtual offset from the locator
    pub offset: i64,
    /// Byte-run length from the locator
    pub source_length: i32,
    /// Shard the run was read from
    pub shard: Option<u32>,
    /// Payload length from the record header
    pub raw_length: Option<i32>,
    /// Payload compression from the record header
    pub compression: Option<CompressionType>,
    /// Declared length after decompression
    pub decompressed_length: Option<i32>,
    /// What happened to the record
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub outcome: Outcome,
}

impl ExtractionEvent {
    pub(crate) fn new(sequence: u64, total: u32, locator: &ResourceLocator) -> Self {
        Self {
            sequence,
            total,
            token: locator.file_stem(),
            offset: locator.offset,
            source_length: locator.length,
            shard: None,
            raw_length: None,
            compression: None,
            decompressed_length: None,
            outcome: Outcome::Failed {
                stage: Stage::Read,
                error: String::new(),
            },
        }
    }

    pub(crate) fn set_record(&mut self, record: &Record<'_>) {
        self.raw_length = Some(record.raw_length);
        self.compression = Some(record.compression);
        self.decompressed_length = Some(record.decompressed_length);
    }
}

/// Lifecycle of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Locators are being dispatched to workers.
    Running,
    /// The index is exhausted; in-flight records are finishing.
    Draining,
    /// Every dispatched record has completed.
    Done,
}

/// Receives progress from an extraction run.
///
/// Callbacks may arrive concurrently from several worker threads.
pub trait ExtractionObserver: Sync {
    /// Called once before any record is dispatched.
    fn on_start(&self, _total_declared: u32) {}

    /// Called after every record, whatever its outcome.
    fn on_record(&self, _event: &ExtractionEvent) {}

    /// Called on every run state transition.
    fn on_state(&self, _state: RunState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExtractionObserver for NoopObserver {}

impl<F> ExtractionObserver for F
where
    F: Fn(&ExtractionEvent) + Sync,
{
    fn on_record(&self, event: &ExtractionEvent) {
        self(event)
    }
}

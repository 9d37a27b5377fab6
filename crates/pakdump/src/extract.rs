//! Parallel extraction of every record an index lists.
//!
//! Each record runs through the same pipeline on a worker thread: read the
//! byte run from its shard, decode the header, decompress the payload,
//! classify the content and write it to
//! `<output_root>/<shard>/<TOKEN>.<TAG>`. A failing record is logged,
//! counted and skipped; it never stops the run.
//!
//! Two schedules are available:
//!
//! - [`Schedule::Streaming`] reads the index on the calling thread and feeds
//!   a bounded queue drained by a fixed set of worker threads.
//! - [`Schedule::Materialized`] reads the whole index first, then processes
//!   the locators on a fixed-size rayon pool.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pakdump_archive::{IndexEnd, IndexReader, Record, ResourceLocator, ShardStore};
use pakdump_sniff::{ContentSniffer, FileType};
use rayon::prelude::*;

use crate::event::{ExtractionEvent, ExtractionObserver, Outcome, RecordError, RunState, Stage};
use crate::{Error, Result};

/// Queue slots per worker when no depth is configured.
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// How locators are handed to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Producer thread plus a bounded queue; memory stays flat for any index size.
    #[default]
    Streaming,
    /// Read every locator up front, then process them on a rayon pool.
    Materialized,
}

/// Options for an extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Directory receiving one subdirectory per shard
    pub output_root: PathBuf,
    /// Number of worker threads, at least 1
    pub workers: usize,
    /// Bounded queue capacity for [`Schedule::Streaming`]; 0 picks a default
    pub queue_depth: usize,
    /// How locators are handed to workers
    pub schedule: Schedule,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("out"),
            workers: default_workers(),
            queue_depth: 0,
            schedule: Schedule::default(),
        }
    }
}

impl ExtractOptions {
    /// Default options writing below `output_root`.
    pub fn new<P: Into<PathBuf>>(output_root: P) -> Self {
        Self {
            output_root: output_root.into(),
            ..Self::default()
        }
    }

    /// Set the worker thread count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the streaming queue capacity; 0 restores the default.
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Set the schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Worker count with the lower bound applied.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Queue capacity with the default applied.
    pub fn effective_queue_depth(&self) -> usize {
        match self.queue_depth {
            0 => self.effective_workers() * QUEUE_SLOTS_PER_WORKER,
            depth => depth,
        }
    }
}

/// Number of hardware threads, or 1 if unknown.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtractionStats {
    /// Resource count from the index header
    pub total_declared: u32,
    /// Locators handed to workers
    pub dispatched: u64,
    /// Records written to disk
    pub extracted: u64,
    /// Records skipped after a failure
    pub failed: u64,
    /// Bytes written across all output files
    pub bytes_written: u64,
    /// How the locator table ended
    pub index_end: Option<IndexEnd>,
    /// Extracted records per detected type
    pub by_type: BTreeMap<FileType, u64>,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl ExtractionStats {
    /// True if every dispatched record was extracted.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.extracted == self.dispatched
    }
}

/// Counters shared by all workers of a run.
#[derive(Default)]
struct Tally {
    dispatched: AtomicU64,
    extracted: AtomicU64,
    failed: AtomicU64,
    bytes_written: AtomicU64,
    by_type: Mutex<BTreeMap<FileType, u64>>,
}

impl Tally {
    /// Count one handed-out locator, returning the new total.
    fn dispatch(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record(&self, event: &ExtractionEvent) {
        match &event.outcome {
            Outcome::Extracted {
                file_type, bytes, ..
            } => {
                self.extracted.fetch_add(1, Ordering::Relaxed);
                self.bytes_written.fetch_add(*bytes, Ordering::Relaxed);
                *self.by_type.lock().entry(*file_type).or_insert(0) += 1;
            }
            Outcome::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn finish(
        self,
        total_declared: u32,
        index_end: Option<IndexEnd>,
        elapsed: Duration,
    ) -> ExtractionStats {
        ExtractionStats {
            total_declared,
            dispatched: self.dispatched.into_inner(),
            extracted: self.extracted.into_inner(),
            failed: self.failed.into_inner(),
            bytes_written: self.bytes_written.into_inner(),
            index_end,
            by_type: self.by_type.into_inner(),
            elapsed,
        }
    }
}

/// Drives records from an index through the extraction pipeline.
pub struct Extractor<'a> {
    shards: &'a ShardStore,
    sniffer: ContentSniffer,
    options: ExtractOptions,
}

impl<'a> Extractor<'a> {
    /// Create an extractor using the standard content signatures.
    pub fn new(shards: &'a ShardStore, options: ExtractOptions) -> Self {
        Self {
            shards,
            sniffer: ContentSniffer::default(),
            options,
        }
    }

    /// Replace the content sniffer.
    pub fn with_sniffer(mut self, sniffer: ContentSniffer) -> Self {
        self.sniffer = sniffer;
        self
    }

    /// Options this extractor runs with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every record the index lists.
    ///
    /// Returns only after every dispatched record has completed. Errors are
    /// returned for failures of the run itself: the output root cannot be
    /// created, the index stream fails, or the worker pool cannot start.
    pub fn run<R: Read>(
        &self,
        mut index: IndexReader<R>,
        observer: &dyn ExtractionObserver,
    ) -> Result<ExtractionStats> {
        let start = Instant::now();
        let total = index.header().resource_count;
        fs::create_dir_all(&self.options.output_root)?;

        tracing::info!(
            total,
            shards = self.shards.shard_count(),
            workers = self.options.effective_workers(),
            schedule = ?self.options.schedule,
            output = %self.options.output_root.display(),
            "starting extraction"
        );
        observer.on_start(total);
        observer.on_state(RunState::Running);

        let tally = Tally::default();
        let index_end = match self.options.schedule {
            Schedule::Streaming => self.run_streaming(&mut index, total, &tally, observer)?,
            Schedule::Materialized => self.run_materialized(&mut index, total, &tally, observer)?,
        };
        observer.on_state(RunState::Done);

        if let Some(IndexEnd::Truncated { remainder }) = index_end {
            tracing::warn!(
                remainder,
                locators = index.locators_read(),
                "index ended with a partial locator"
            );
        }

        let stats = tally.finish(total, index_end, start.elapsed());
        tracing::info!(
            dispatched = stats.dispatched,
            extracted = stats.extracted,
            failed = stats.failed,
            bytes = stats.bytes_written,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "extraction finished"
        );
        Ok(stats)
    }

    /// Producer on the calling thread, workers on scoped threads.
    ///
    /// Dropping the sender is the exhausted signal: every worker sees the
    /// channel disconnect once the queue is empty. The scope joins all
    /// workers before returning.
    fn run_streaming<R: Read>(
        &self,
        index: &mut IndexReader<R>,
        total: u32,
        tally: &Tally,
        observer: &dyn ExtractionObserver,
    ) -> Result<Option<IndexEnd>> {
        let workers = self.options.effective_workers();
        let depth = self.options.effective_queue_depth();

        thread::scope(|scope| -> Result<Option<IndexEnd>> {
            let (sender, receiver) = crossbeam_channel::bounded::<(u64, ResourceLocator)>(depth);

            let mut handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let receiver = receiver.clone();
                let handle = thread::Builder::new()
                    .name(format!("pakdump-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        for (sequence, locator) in receiver {
                            let event = self.extract_one(sequence, total, &locator);
                            tally.record(&event);
                            observer.on_record(&event);
                        }
                    })?;
                handles.push(handle);
            }
            drop(receiver);

            let mut sequence = 0u64;
            let produced = loop {
                match index.read_next() {
                    Ok(Some(locator)) => {
                        sequence += 1;
                        tally.dispatch();
                        if sender.send((sequence, locator)).is_err() {
                            break Err(Error::WorkerPanicked);
                        }
                    }
                    Ok(None) => break Ok(index.end()),
                    Err(e) => break Err(Error::from(e)),
                }
            };
            drop(sender);
            observer.on_state(RunState::Draining);

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                return Err(Error::WorkerPanicked);
            }
            produced
        })
    }

    /// Read all locators, then fan out on a dedicated rayon pool.
    fn run_materialized<R: Read>(
        &self,
        index: &mut IndexReader<R>,
        total: u32,
        tally: &Tally,
        observer: &dyn ExtractionObserver,
    ) -> Result<Option<IndexEnd>> {
        let locators = index.read_all()?;
        tracing::debug!(count = locators.len(), "index materialized");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.effective_workers())
            .thread_name(|id| format!("pakdump-worker-{id}"))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        // The worker claiming the last locator announces the drain; the
        // remaining in-flight records finish after it.
        let count = locators.len() as u64;
        if count == 0 {
            observer.on_state(RunState::Draining);
        }
        pool.install(|| {
            locators.par_iter().enumerate().for_each(|(i, locator)| {
                if tally.dispatch() == count {
                    observer.on_state(RunState::Draining);
                }
                let event = self.extract_one(i as u64 + 1, total, locator);
                tally.record(&event);
                observer.on_record(&event);
            });
        });

        Ok(index.end())
    }

    /// Run one record through the pipeline and report what happened.
    pub fn extract_one(&self, sequence: u64, total: u32, locator: &ResourceLocator) -> ExtractionEvent {
        let mut event = ExtractionEvent::new(sequence, total, locator);

        match self.process(locator, &mut event) {
            Ok((file_type, path, bytes)) => {
                tracing::debug!(
                    sequence,
                    total,
                    token = %event.token,
                    offset = locator.offset,
                    source_length = locator.length,
                    raw_length = event.raw_length,
                    compression = ?event.compression,
                    decompressed_length = event.decompressed_length,
                    outcome = %file_type,
                    "extracted"
                );
                event.outcome = Outcome::Extracted {
                    file_type,
                    path,
                    bytes,
                };
            }
            Err(e) => {
                tracing::warn!(
                    sequence,
                    total,
                    token = %event.token,
                    offset = locator.offset,
                    source_length = locator.length,
                    stage = %e.stage,
                    error = %e.source,
                    "record failed"
                );
                event.outcome = Outcome::Failed {
                    stage: e.stage,
                    error: e.source.to_string(),
                };
            }
        }
        event
    }

    fn process(
        &self,
        locator: &ResourceLocator,
        event: &mut ExtractionEvent,
    ) -> std::result::Result<(FileType, PathBuf, u64), RecordError> {
        let (raw, shard) = self
            .shards
            .get_data(locator.offset, locator.length.into())
            .map_err(|e| RecordError::new(Stage::Read, e))?;
        event.shard = Some(shard);

        let record = Record::decode(&raw).map_err(|e| RecordError::new(Stage::Decode, e))?;
        event.set_record(&record);

        let data = record
            .decompress()
            .map_err(|e| RecordError::new(Stage::Decompress, e))?;

        let file_type = self.sniffer.classify(&data);
        let path = output_path(&self.options.output_root, shard, locator, file_type);
        write_output(&path, &data).map_err(|e| RecordError::new(Stage::Write, e))?;

        Ok((file_type, path, data.len() as u64))
    }
}

/// `<root>/<shard>/<TOKEN>.<TAG>`
pub fn output_path(root: &Path, shard: u32, locator: &ResourceLocator, file_type: FileType) -> PathBuf {
    root.join(shard.to_string())
        .join(format!("{}.{}", locator.file_stem(), file_type))
}

fn write_output(path: &Path, data: &[u8]) -> std::io::Result<()> {
    // create_dir_all treats a directory created concurrently as success.
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, data)
}

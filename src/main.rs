//! pakdump CLI - command-line tool for extracting sharded PakV3 archives.
//!
//! This is the main entry point for the pakdump command-line application.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use pakdump::archive::{IndexEnd, DEFAULT_SHARD_PATTERN};
use pakdump::prelude::*;
use pakdump::RunState;

/// pakdump - PakV3 archive extraction tool
#[derive(Parser)]
#[command(name = "pakdump")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter, e.g. `debug` or `pakdump=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every resource listed in an index
    Extract {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Output directory
        #[arg(short, long, env = "PAKDUMP_OUTPUT")]
        output: PathBuf,

        /// Number of worker threads
        #[arg(short, long, env = "PAKDUMP_WORKERS")]
        workers: Option<usize>,

        /// Pending locators allowed in the work queue (default: workers * 4)
        #[arg(long, env = "PAKDUMP_QUEUE_DEPTH")]
        queue_depth: Option<usize>,

        /// How locators are handed to workers
        #[arg(long, value_enum, default_value_t = ScheduleArg::Streaming)]
        schedule: ScheduleArg,

        /// Write one JSON line per processed record to this file
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// List the locators in an index
    List {
        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Detect the type of local files
    Identify {
        /// Files to classify
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the shard files of an archive
    Shards {
        /// Directory holding the shard files
        #[arg(short, long, env = "PAKDUMP_SHARDS")]
        dir: PathBuf,

        /// Shard file name pattern; the first capture group is the ordinal
        #[arg(long, default_value = DEFAULT_SHARD_PATTERN)]
        shard_pattern: String,
    },
}

#[derive(Args)]
struct ArchiveArgs {
    /// Path to the index file (TRUNK.DIR)
    #[arg(short, long, env = "PAKDUMP_INDEX")]
    index: PathBuf,

    /// Directory holding the shard files (default: the index's directory)
    #[arg(short, long, env = "PAKDUMP_SHARDS")]
    shards: Option<PathBuf>,

    /// Shard file name pattern; the first capture group is the ordinal
    #[arg(long, default_value = DEFAULT_SHARD_PATTERN)]
    shard_pattern: String,
}

impl ArchiveArgs {
    fn shard_dir(&self) -> PathBuf {
        match &self.shards {
            Some(dir) => dir.clone(),
            None => self
                .index
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf(),
        }
    }

    fn open(&self) -> Result<(IndexReader<io::BufReader<File>>, ShardStore)> {
        let index = IndexReader::open_path(&self.index)
            .with_context(|| format!("Failed to open index {}", self.index.display()))?;
        let dir = self.shard_dir();
        let shards = ShardStore::open_with_pattern(&dir, &self.shard_pattern)
            .with_context(|| format!("Failed to open shards in {}", dir.display()))?;
        Ok((index, shards))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScheduleArg {
    Streaming,
    Materialized,
}

impl From<ScheduleArg> for Schedule {
    fn from(arg: ScheduleArg) -> Self {
        match arg {
            ScheduleArg::Streaming => Schedule::Streaming,
            ScheduleArg::Materialized => Schedule::Materialized,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_level.as_deref(), cli.log_file.as_deref())?;

    match cli.command {
        Commands::Extract {
            archive,
            output,
            workers,
            queue_depth,
            schedule,
            events,
        } => {
            let options = ExtractOptions::new(output)
                .with_workers(workers.unwrap_or_else(pakdump::default_workers))
                .with_queue_depth(queue_depth.unwrap_or(0))
                .with_schedule(schedule.into());
            cmd_extract(&archive, options, events.as_deref())?;
        }
        Commands::List { archive } => {
            cmd_list(&archive)?;
        }
        Commands::Identify { files } => {
            cmd_identify(&files)?;
        }
        Commands::Shards { dir, shard_pattern } => {
            cmd_shards(&dir, &shard_pattern)?;
        }
    }

    Ok(())
}

/// Console logging plus an optional non-blocking file layer.
///
/// The returned guard flushes the file layer when dropped.
fn init_logging(level: Option<&str>, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("Invalid log level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

/// Drives the progress bar and the optional JSON-lines event file.
struct CliObserver {
    progress: ProgressBar,
    events: Option<Mutex<BufWriter<File>>>,
}

impl CliObserver {
    fn write_event(&self, event: &ExtractionEvent) -> io::Result<()> {
        let Some(sink) = &self.events else {
            return Ok(());
        };
        let mut writer = sink.lock();
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")
    }

    fn finish(self) -> io::Result<()> {
        self.progress.finish_and_clear();
        match self.events {
            Some(sink) => sink.into_inner().flush(),
            None => Ok(()),
        }
    }
}

impl ExtractionObserver for CliObserver {
    fn on_start(&self, total_declared: u32) {
        self.progress.set_length(u64::from(total_declared));
    }

    fn on_record(&self, event: &ExtractionEvent) {
        self.progress.inc(1);
        if let Err(e) = self.write_event(event) {
            tracing::warn!(sequence = event.sequence, error = %e, "failed to write event");
        }
    }

    fn on_state(&self, state: RunState) {
        if state == RunState::Draining {
            self.progress.set_message("draining");
        }
    }
}

fn cmd_extract(archive: &ArchiveArgs, options: ExtractOptions, events: Option<&Path>) -> Result<()> {
    println!("Opening index: {}", archive.index.display());

    let start = Instant::now();
    let (index, shards) = archive.open()?;
    println!(
        "Found {} shards ({} bytes), index declares {} resources",
        shards.shard_count(),
        shards.total_len(),
        index.header().resource_count
    );

    let events = match events {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create events file {}", path.display()))?;
            Some(Mutex::new(BufWriter::new(file)))
        }
        None => None,
    };

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    let observer = CliObserver { progress, events };

    println!(
        "Extracting to {} with {} workers...",
        options.output_root.display(),
        options.effective_workers()
    );
    let stats = Extractor::new(&shards, options)
        .run(index, &observer)
        .context("Extraction failed")?;
    observer.finish().context("Failed to flush events file")?;

    if let Some(IndexEnd::Truncated { remainder }) = stats.index_end {
        println!("Index ended with a partial {remainder}-byte locator");
    }
    for (file_type, count) in &stats.by_type {
        println!("  {file_type:<5} {count}");
    }
    println!(
        "Extracted {} of {} records ({} failed, {} bytes) in {:?}",
        stats.extracted,
        stats.dispatched,
        stats.failed,
        stats.bytes_written,
        start.elapsed()
    );

    Ok(())
}

fn cmd_list(archive: &ArchiveArgs) -> Result<()> {
    let (mut index, shards) = archive.open()?;
    println!("Declared resources: {}", index.header().resource_count);

    while let Some(locator) = index.read_next().context("Failed to read index")? {
        let shard = u64::try_from(locator.offset)
            .ok()
            .and_then(|offset| shards.locate(offset))
            .map_or_else(|| "-".to_string(), |shard| shard.ordinal().to_string());
        println!(
            "{}  {:>12}  {:>10}  {}",
            locator.file_stem(),
            locator.offset,
            locator.length,
            shard
        );
    }

    println!("\nTotal: {} locators", index.locators_read());
    if let Some(IndexEnd::Truncated { remainder }) = index.end() {
        println!("Index ended with a partial {remainder}-byte locator");
    }

    Ok(())
}

fn cmd_identify(files: &[PathBuf]) -> Result<()> {
    let sniffer = ContentSniffer::new();

    for path in files {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let sniffed = sniffer.sniff(&data);
        let encoding = sniffed
            .encoding
            .map_or_else(|| "binary".to_string(), |e| e.to_string());
        println!("{:<5} {:<9} {}", sniffed.file_type, encoding, path.display());
    }

    Ok(())
}

fn cmd_shards(dir: &Path, pattern: &str) -> Result<()> {
    let shards = ShardStore::open_with_pattern(dir, pattern)
        .with_context(|| format!("Failed to open shards in {}", dir.display()))?;

    for shard in shards.shards() {
        let name = shard
            .path()
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        println!(
            "{:>4}  {:<20} {:>12}  base {:>12}",
            shard.ordinal(),
            name,
            shard.size(),
            shard.base()
        );
    }

    println!("\nTotal: {} shards, {} bytes", shards.shard_count(), shards.total_len());
    Ok(())
}

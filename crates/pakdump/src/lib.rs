//! pakdump - extraction of sharded PakV3 game archives.
//!
//! This crate ties the pakdump library crates together and adds the
//! parallel extraction driver.
//!
//! # Crates
//!
//! - [`pakdump_common`] - Bounds-checked binary reading
//! - [`pakdump_archive`] - Index, shard and record readers, LZO decompression
//! - [`pakdump_sniff`] - Content-based file type detection
//!
//! # Example
//!
//! ```no_run
//! use pakdump::prelude::*;
//!
//! let index = IndexReader::open_path("PakV3/TRUNK.DIR")?;
//! let shards = ShardStore::open("PakV3")?;
//!
//! let options = ExtractOptions::new("out").with_workers(8);
//! let stats = Extractor::new(&shards, options).run(index, &NoopObserver)?;
//! println!("{} extracted, {} failed", stats.extracted, stats.failed);
//! # Ok::<(), pakdump::Error>(())
//! ```

#![warn(missing_docs)]

mod error;
mod event;
mod extract;

// Re-export all sub-crates
pub use pakdump_archive as archive;
pub use pakdump_common as common;
pub use pakdump_sniff as sniff;

pub use error::{Error, Result};
pub use event::{
    ExtractionEvent, ExtractionObserver, NoopObserver, Outcome, RecordError, RunState, Stage,
};
pub use extract::{
    default_workers, output_path, ExtractOptions, ExtractionStats, Extractor, Schedule,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        ExtractOptions, ExtractionEvent, ExtractionObserver, ExtractionStats, Extractor,
        NoopObserver, Outcome, Schedule,
    };
    pub use pakdump_archive::{IndexReader, Record, ResourceLocator, ShardStore};
    pub use pakdump_common::BinaryReader;
    pub use pakdump_sniff::{classify, ContentSniffer, FileType};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

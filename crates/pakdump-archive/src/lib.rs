//! Readers for sharded PakV3 archives.
//!
//! A PakV3 archive is split into two parts:
//!
//! - An index (`TRUNK.DIR`) listing every resource as a 64-bit token plus a
//!   virtual offset and length
//! - A set of numbered shard files (`Package0.DAT`, `Package1.DAT`, ...)
//!   whose concatenation in ordinal order forms the virtual address space
//!
//! Each addressed byte run is a record: a fixed 56-byte header followed by
//! a stored or LZO1X-compressed payload.
//!
//! # Example
//!
//! ```no_run
//! use pakdump_archive::{IndexReader, Record, ShardStore};
//!
//! let mut index = IndexReader::open_path("PakV3/TRUNK.DIR")?;
//! let shards = ShardStore::open("PakV3")?;
//!
//! while let Some(locator) = index.read_next()? {
//!     let (raw, shard) = shards.get_data(locator.offset, locator.length.into())?;
//!     let record = Record::decode(&raw)?;
//!     let data = record.decompress()?;
//!     println!("{} in shard {}: {} bytes", locator.file_stem(), shard, data.len());
//! }
//! # Ok::<(), pakdump_archive::Error>(())
//! ```

mod decompress;
mod error;
mod index;
mod record;
mod shard;

pub use decompress::{decompress, decompress_lzo};
pub use error::{Error, Result};
pub use index::{
    IndexEnd, IndexHeader, IndexReader, ResourceLocator, COUNT_OFFSET, LOCATOR_SIZE,
    RECORDS_OFFSET,
};
pub use record::{CompressionType, Record, RecordHeader, RECORD_HEADER_SIZE};
pub use shard::{Shard, ShardStore, DEFAULT_SHARD_PATTERN};

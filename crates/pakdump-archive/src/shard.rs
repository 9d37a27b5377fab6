//! Shard store: numbered `PackageN.DAT` files viewed as one address space.
//!
//! Shards are concatenated in ordinal order. A virtual offset is resolved
//! to the shard whose `[base, base + size)` range contains it and then read
//! with a local seek. Each shard handle sits behind its own lock so the
//! seek and the read happen as one step; reads against different shards do
//! not contend.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use regex::Regex;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Default shard naming convention. The first capture group is the ordinal.
pub const DEFAULT_SHARD_PATTERN: &str = r"(?i)^package(\d+)\.dat$";

/// One physical shard file.
#[derive(Debug)]
pub struct Shard {
    ordinal: u32,
    path: PathBuf,
    size: u64,
    base: u64,
    file: Mutex<File>,
}

impl Shard {
    /// Ordinal parsed from the file name.
    #[inline]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Path to the shard file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the shard in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Virtual offset of the first byte of this shard.
    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Virtual offset one past the last byte of this shard.
    #[inline]
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    fn read_local(&self, local: u64, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(local))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Ordered set of shards forming the virtual address space.
#[derive(Debug)]
pub struct ShardStore {
    shards: Vec<Shard>,
    total: u64,
}

impl ShardStore {
    /// Open every shard in `dir` matching [`DEFAULT_SHARD_PATTERN`].
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_pattern(dir, DEFAULT_SHARD_PATTERN)
    }

    /// Open every shard in `dir` whose file name matches `pattern`.
    ///
    /// The pattern's first capture group must hold the decimal ordinal.
    pub fn open_with_pattern<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let regex = Regex::new(pattern).map_err(|e| Error::InvalidShardPattern(e.to_string()))?;
        if regex.captures_len() < 2 {
            return Err(Error::InvalidShardPattern(format!(
                "{pattern:?} has no capture group for the shard ordinal"
            )));
        }

        let mut found: BTreeMap<u32, PathBuf> = BTreeMap::new();
        // Symlinked shards count; `file_type` then reports the target.
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(ordinal) = regex
                .captures(name)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };

            if let Some(first) = found.insert(ordinal, entry.path().to_path_buf()) {
                return Err(Error::DuplicateShard {
                    ordinal,
                    first,
                    second: entry.into_path(),
                });
            }
        }

        if found.is_empty() {
            return Err(Error::NoShards {
                dir: dir.to_path_buf(),
            });
        }

        let mut shards = Vec::with_capacity(found.len());
        let mut base = 0u64;
        for (ordinal, path) in found {
            let file = File::open(&path)?;
            let size = file.metadata()?.len();
            tracing::debug!(ordinal, size, base, path = %path.display(), "opened shard");
            shards.push(Shard {
                ordinal,
                path,
                size,
                base,
                file: Mutex::new(file),
            });
            base += size;
        }

        Ok(Self {
            shards,
            total: base,
        })
    }

    /// Total length of the virtual address space.
    #[inline]
    pub fn total_len(&self) -> u64 {
        self.total
    }

    /// Number of shards.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shards in ordinal order.
    #[inline]
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Find the shard holding the byte at virtual offset `start`.
    pub fn locate(&self, start: u64) -> Option<&Shard> {
        let index = self.shards.partition_point(|s| s.end() <= start);
        self.shards.get(index)
    }

    /// Read `length` bytes at virtual offset `start`.
    ///
    /// Returns the bytes and the ordinal of the shard they came from. A run
    /// that does not fit inside a single shard is rejected with
    /// [`Error::CrossesShardBoundary`].
    pub fn get_data(&self, start: i64, length: i64) -> Result<(Vec<u8>, u32)> {
        let out_of_range = || Error::OutOfRange {
            start,
            length,
            total: self.total,
        };

        let (Ok(begin), Ok(len)) = (u64::try_from(start), u64::try_from(length)) else {
            return Err(out_of_range());
        };
        let end = begin.checked_add(len).ok_or_else(out_of_range)?;
        if begin > self.total || end > self.total {
            return Err(out_of_range());
        }

        if len == 0 {
            let shard = self
                .locate(begin)
                .or_else(|| self.shards.last())
                .ok_or_else(out_of_range)?;
            return Ok((Vec::new(), shard.ordinal));
        }

        let shard = self.locate(begin).ok_or_else(out_of_range)?;
        if end > shard.end() {
            return Err(Error::CrossesShardBoundary {
                start: begin,
                length: len,
                shard: shard.ordinal,
            });
        }

        let length = usize::try_from(len).map_err(|_| out_of_range())?;
        let data = shard.read_local(begin - shard.base, length)?;
        Ok((data, shard.ordinal))
    }
}

//! Index (`TRUNK.DIR`) reader.
//!
//! The index is a fixed-layout binary stream: a 32-bit little-endian
//! resource count at [`COUNT_OFFSET`] and a packed table of 20-byte
//! locators starting at [`RECORDS_OFFSET`]. The table has no terminator;
//! it simply runs until the stream ends.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use pakdump_common::BinaryReader;

use crate::{Error, Result};

/// Byte offset of the 32-bit resource count.
pub const COUNT_OFFSET: u64 = 0x0C;

/// Byte offset of the first locator record.
pub const RECORDS_OFFSET: u64 = 0x200;

/// Size of one locator record in bytes.
pub const LOCATOR_SIZE: usize = 20;

/// Location of one resource in the virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResourceLocator {
    /// Opaque resource identifier
    pub token: u64,
    /// Virtual byte offset of the raw record
    pub offset: i64,
    /// Length of the raw record in bytes
    pub length: i32,
}

impl ResourceLocator {
    /// Decode a locator from its on-disk form.
    ///
    /// The token is stored byte-reversed, so it reads as big-endian.
    pub fn from_bytes(bytes: &[u8; LOCATOR_SIZE]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        Ok(Self {
            token: reader.read_u64_be()?,
            offset: reader.read_i64()?,
            length: reader.read_i32()?,
        })
    }

    /// The token as 16 uppercase hex digits, used as the output file stem.
    pub fn file_stem(&self) -> String {
        format!("{:016X}", self.token)
    }
}

/// Fixed index header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Declared number of resources
    pub resource_count: u32,
}

/// How the locator table ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum IndexEnd {
    /// The stream ended exactly on a record boundary.
    Clean,
    /// The stream ended with a partial record that was discarded.
    Truncated { remainder: usize },
    /// A read failed; the error was returned to the caller.
    Failed,
}

/// Sequential reader over the index locator table.
///
/// Once the end of the table is reached every further call to
/// [`IndexReader::read_next`] returns `Ok(None)`.
pub struct IndexReader<R> {
    inner: R,
    header: IndexHeader,
    end: Option<IndexEnd>,
    read: u64,
}

impl IndexReader<BufReader<File>> {
    /// Open an index file from disk.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> IndexReader<R> {
    /// Read the header and position the cursor at the first locator.
    pub fn open(mut inner: R) -> Result<Self> {
        inner.seek(SeekFrom::Start(COUNT_OFFSET))?;
        let resource_count = match inner.read_u32::<LittleEndian>() {
            Ok(count) => count,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Error::IndexTooShort {
                    offset: COUNT_OFFSET,
                })
            }
            Err(e) => return Err(e.into()),
        };
        inner.seek(SeekFrom::Start(RECORDS_OFFSET))?;

        Ok(Self {
            inner,
            header: IndexHeader { resource_count },
            end: None,
            read: 0,
        })
    }
}

impl<R: Read> IndexReader<R> {
    /// Get the index header.
    #[inline]
    pub fn header(&self) -> IndexHeader {
        self.header
    }

    /// How the table ended, once it has.
    #[inline]
    pub fn end(&self) -> Option<IndexEnd> {
        self.end
    }

    /// Number of complete locators returned so far.
    #[inline]
    pub fn locators_read(&self) -> u64 {
        self.read
    }

    /// Read the next locator.
    ///
    /// A read that yields fewer than [`LOCATOR_SIZE`] bytes ends the
    /// sequence; the partial tail is discarded and reported through
    /// [`IndexReader::end`].
    pub fn read_next(&mut self) -> Result<Option<ResourceLocator>> {
        if self.end.is_some() {
            return Ok(None);
        }

        let mut buf = [0u8; LOCATOR_SIZE];
        let filled = match fill(&mut self.inner, &mut buf) {
            Ok(n) => n,
            Err(e) => {
                self.end = Some(IndexEnd::Failed);
                return Err(e.into());
            }
        };

        if filled < LOCATOR_SIZE {
            self.end = Some(match filled {
                0 => IndexEnd::Clean,
                remainder => IndexEnd::Truncated { remainder },
            });
            return Ok(None);
        }

        self.read += 1;
        ResourceLocator::from_bytes(&buf).map(Some)
    }

    /// Read every remaining locator into memory.
    pub fn read_all(&mut self) -> Result<Vec<ResourceLocator>> {
        // The declared count is untrusted; cap the up-front reservation.
        let hint = (self.header.resource_count as usize).min(1 << 20);
        let mut locators = Vec::with_capacity(hint);
        while let Some(locator) = self.read_next()? {
            locators.push(locator);
        }
        Ok(locators)
    }
}

impl<R: Read> Iterator for IndexReader<R> {
    type Item = Result<ResourceLocator>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

/// Read until `buf` is full or the stream ends, returning the byte count.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build an index image with the given locators and trailing garbage.
    fn build_index(locators: &[ResourceLocator], tail: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; RECORDS_OFFSET as usize];
        data[COUNT_OFFSET as usize..COUNT_OFFSET as usize + 4]
            .copy_from_slice(&(locators.len() as u32).to_le_bytes());
        for locator in locators {
            data.extend_from_slice(&locator.token.to_be_bytes());
            data.extend_from_slice(&locator.offset.to_le_bytes());
            data.extend_from_slice(&locator.length.to_le_bytes());
        }
        data.extend_from_slice(tail);
        data
    }

    fn locator(token: u64, offset: i64, length: i32) -> ResourceLocator {
        ResourceLocator {
            token,
            offset,
            length,
        }
    }

    #[test]
    fn test_reads_header_and_locators() {
        let expected = [
            locator(0x0123_4567_89AB_CDEF, 0, 100),
            locator(0xFEDC_BA98_7654_3210, 100, 64),
        ];
        let data = build_index(&expected, &[]);
        let mut reader = IndexReader::open(Cursor::new(data)).unwrap();

        assert_eq!(reader.header().resource_count, 2);
        assert_eq!(reader.read_next().unwrap(), Some(expected[0]));
        assert_eq!(reader.read_next().unwrap(), Some(expected[1]));
        assert_eq!(reader.read_next().unwrap(), None);
        assert_eq!(reader.end(), Some(IndexEnd::Clean));
    }

    #[test]
    fn test_token_is_byte_reversed() {
        let mut data = vec![0u8; RECORDS_OFFSET as usize];
        data.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        data.extend_from_slice(&16i64.to_le_bytes());
        data.extend_from_slice(&8i32.to_le_bytes());

        let mut reader = IndexReader::open(Cursor::new(data)).unwrap();
        let first = reader.read_next().unwrap().unwrap();

        assert_eq!(first.token, 0x0102030405060708);
        assert_eq!(first.file_stem(), "0102030405060708");
        assert_eq!(first.offset, 16);
        assert_eq!(first.length, 8);
    }

    #[test]
    fn test_truncated_tail_ends_sequence() {
        let expected = [locator(1, 0, 10), locator(2, 10, 10), locator(3, 20, 10)];
        let data = build_index(&expected, &[0xAA; 7]);
        let mut reader = IndexReader::open(Cursor::new(data)).unwrap();

        let read: Vec<_> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(read, expected);
        assert_eq!(reader.end(), Some(IndexEnd::Truncated { remainder: 7 }));
        assert_eq!(reader.locators_read(), 3);
    }

    #[test]
    fn test_end_is_idempotent() {
        let data = build_index(&[locator(1, 0, 1)], &[]);
        let mut reader = IndexReader::open(Cursor::new(data)).unwrap();

        assert!(reader.read_next().unwrap().is_some());
        for _ in 0..3 {
            assert_eq!(reader.read_next().unwrap(), None);
        }
    }

    #[test]
    fn test_short_table_region_is_empty() {
        // Count is present but the stream stops before the table begins.
        let mut data = vec![0u8; 0x40];
        data[0x0C..0x10].copy_from_slice(&5u32.to_le_bytes());
        let mut reader = IndexReader::open(Cursor::new(data)).unwrap();

        assert_eq!(reader.header().resource_count, 5);
        assert!(reader.read_all().unwrap().is_empty());
        assert_eq!(reader.end(), Some(IndexEnd::Clean));
    }

    #[test]
    fn test_missing_count_is_fatal() {
        let result = IndexReader::open(Cursor::new(vec![0u8; 0x0E]));
        assert!(matches!(result, Err(Error::IndexTooShort { offset: 0x0C })));
    }
}

//! Bounds-checked cursor over a byte slice.
//!
//! Reads borrow from the underlying slice and never panic: a read that runs
//! past the end fails with [`Error::UnexpectedEof`] and leaves the cursor
//! where it was.

use zerocopy::FromBytes;

use crate::{Error, Result};

/// Cursor reading little-endian values from a borrowed slice.
///
/// # Example
///
/// ```
/// use pakdump_common::BinaryReader;
///
/// let mut reader = BinaryReader::new(b"\x2A\0\0\0ABCD");
/// assert_eq!(reader.read_i32().unwrap(), 42);
/// assert_eq!(reader.read_bytes(4).unwrap(), b"ABCD");
/// assert_eq!(reader.remaining(), 0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

macro_rules! read_int {
    ($($name:ident: $ty:ty => $conv:ident;)*) => {
        $(
            #[inline]
            pub fn $name(&mut self) -> Result<$ty> {
                self.take::<{ std::mem::size_of::<$ty>() }>().map(<$ty>::$conv)
            }
        )*
    };
}

impl<'a> BinaryReader<'a> {
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    /// Reader whose cursor starts at `cursor`.
    #[inline]
    pub const fn new_at(data: &'a [u8], cursor: usize) -> Self {
        Self { data, cursor }
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes left after the cursor.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }

    /// `count` bytes at absolute `offset`, independent of the cursor.
    pub fn peek_at(&self, offset: usize, count: usize) -> Result<&'a [u8]> {
        match offset.checked_add(count) {
            Some(end) if end <= self.data.len() => Ok(&self.data[offset..end]),
            _ => Err(Error::UnexpectedEof {
                needed: count,
                available: self.data.len().saturating_sub(offset),
            }),
        }
    }

    /// Whether `pattern` sits at absolute `offset`. Short buffers never match.
    pub fn matches_at(&self, offset: usize, pattern: &[u8]) -> bool {
        matches!(self.peek_at(offset, pattern.len()), Ok(found) if found == pattern)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_at(self.cursor, count)?;
        self.cursor += count;
        Ok(bytes)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    read_int! {
        read_u32: u32 => from_le_bytes;
        read_i32: i32 => from_le_bytes;
        read_i64: i64 => from_le_bytes;
        read_u32_be: u32 => from_be_bytes;
        read_u64_be: u64 => from_be_bytes;
    }

    /// Copy a plain-old-data struct out of the buffer.
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(std::mem::size_of::<T>())?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            needed: std::mem::size_of::<T>(),
            available: bytes.len(),
        })
    }
}

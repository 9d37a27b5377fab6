//! Raw record decoding.
//!
//! Every byte run addressed by a locator starts with a fixed 56-byte
//! header followed by the (possibly compressed) payload.

use std::borrow::Cow;
use std::fmt;

use pakdump_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::decompress;
use crate::{Error, Result};

/// Size of the fixed record header.
pub const RECORD_HEADER_SIZE: usize = 56;

/// Fixed record header.
///
/// Only the length and compression fields are understood; the rest is
/// carried through untouched.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RecordHeader {
    /// Opaque leading value
    pub reserved: u64,
    /// Unknown, bytes 8..12
    pub unknown_08: u32,
    /// Length of the payload after decompression
    pub decompressed_length: i32,
    /// Unknown, bytes 16..28
    pub unknown_10: [u32; 3],
    /// Length of the stored payload
    pub raw_length: i32,
    /// Unknown, bytes 32..36
    pub unknown_20: u32,
    /// Compression code, see [`CompressionType`]
    pub compression_type: i32,
    /// Unknown, bytes 40..56
    pub unknown_28: [u32; 4],
}

const _: () = assert!(std::mem::size_of::<RecordHeader>() == RECORD_HEADER_SIZE);

/// Payload compression.
///
/// Every code other than [`CompressionType::LZO_CODE`] is stored data and is
/// passed through unchanged, including the two known-but-undocumented codes
/// 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CompressionType {
    /// Stored (code 0)
    None,
    /// Raw LZO1X stream (code 3)
    Lzo,
    /// Any other code; treated as stored
    Unknown(i32),
}

impl CompressionType {
    pub const NONE_CODE: i32 = 0;
    pub const LZO_CODE: i32 = 3;

    /// Map a header code to a compression type.
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::NONE_CODE => Self::None,
            Self::LZO_CODE => Self::Lzo,
            other => Self::Unknown(other),
        }
    }

    /// The header code for this type.
    pub fn code(self) -> i32 {
        match self {
            Self::None => Self::NONE_CODE,
            Self::Lzo => Self::LZO_CODE,
            Self::Unknown(code) => code,
        }
    }

    /// Whether the payload is stored as-is.
    pub fn is_passthrough(self) -> bool {
        !matches!(self, Self::Lzo)
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Lzo => f.write_str("lzo"),
            Self::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// A decoded record borrowing its payload from the raw run.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Declared length after decompression
    pub decompressed_length: i32,
    /// Declared length of the stored payload
    pub raw_length: i32,
    /// Payload compression
    pub compression: CompressionType,
    /// Stored payload, exactly `raw_length` bytes
    pub payload: &'a [u8],
}

impl<'a> Record<'a> {
    /// Decode the header and payload from a raw byte run.
    ///
    /// The header's `raw_length` decides how much of the trailing data is
    /// payload; bytes beyond it are ignored.
    pub fn decode(raw: &'a [u8]) -> Result<Self> {
        if raw.len() < RECORD_HEADER_SIZE {
            return Err(Error::MalformedRecord(format!(
                "{} bytes is shorter than the {RECORD_HEADER_SIZE}-byte header",
                raw.len()
            )));
        }

        let mut reader = BinaryReader::new(raw);
        let header: RecordHeader = reader.read_struct()?;
        let raw_length = header.raw_length;
        let available = reader.remaining();

        let payload_len = usize::try_from(raw_length)
            .map_err(|_| Error::MalformedRecord(format!("negative payload length {raw_length}")))?;
        if payload_len > available {
            return Err(Error::MalformedRecord(format!(
                "header declares {payload_len} payload bytes but only {available} follow"
            )));
        }

        Ok(Self {
            decompressed_length: header.decompressed_length,
            raw_length,
            compression: CompressionType::from_code(header.compression_type),
            payload: reader.read_bytes(payload_len)?,
        })
    }

    /// Decompress the payload according to the header.
    pub fn decompress(&self) -> Result<Cow<'a, [u8]>> {
        decompress::decompress(self.compression, self.payload, self.decompressed_length)
    }
}

//! Content-based file type detection.
//!
//! Extracted resources carry no type information, so their extension is
//! inferred from the bytes alone, in two phases:
//!
//! 1. **Binary or text.** Content with no zero byte is text. Content with a
//!    zero byte is text only when it opens with a byte-order mark.
//! 2. **Signatures.** Text is decoded and tested against the text table;
//!    binary content is tested against the binary table. The first matching
//!    signature wins; otherwise the result is `TXT` or `BIN`.
//!
//! Classification is total: every buffer, including an empty one, gets a tag.
//!
//! # Example
//!
//! ```
//! use pakdump_sniff::{classify, FileType};
//!
//! assert_eq!(classify(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), FileType::PNG);
//! assert_eq!(classify(br#"{"a":1}"#), FileType::JSON);
//! assert_eq!(classify(b""), FileType::TXT);
//! ```

pub mod binary;
mod encoding;
pub mod text;

use std::fmt;

pub use binary::BINARY_SIGNATURES;
pub use encoding::TextEncoding;
pub use text::TEXT_SIGNATURES;

/// A detected file type, used verbatim as the output file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileType(&'static str);

impl FileType {
    pub const BIN: Self = Self("BIN");
    pub const TXT: Self = Self("TXT");

    pub const JSON: Self = Self("JSON");
    pub const XML: Self = Self("XML");
    pub const INI: Self = Self("INI");
    pub const CPP: Self = Self("CPP");
    pub const LUA: Self = Self("LUA");

    pub const ANI: Self = Self("ANI");
    pub const AVI: Self = Self("AVI");
    pub const WAV: Self = Self("WAV");
    pub const FSB: Self = Self("FSB");
    pub const MP3: Self = Self("MP3");
    pub const OGG: Self = Self("OGG");
    pub const MP4: Self = Self("MP4");
    pub const PNG: Self = Self("PNG");
    pub const JPEG: Self = Self("JPEG");
    pub const BMP: Self = Self("BMP");
    pub const TGA: Self = Self("TGA");
    pub const DDS: Self = Self("DDS");
    pub const PSD: Self = Self("PSD");
    pub const IFF: Self = Self("IFF");
    pub const CUR: Self = Self("CUR");
    pub const ICO: Self = Self("ICO");
    pub const TTF: Self = Self("TTF");
    pub const RAR: Self = Self("RAR");
    pub const ZIP: Self = Self("ZIP");

    /// Create a custom file type. The tag should be short and uppercase.
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    /// The tag, e.g. `"PNG"`.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One entry of a signature table: a file type and its predicate.
///
/// Predicates must not panic on short input.
pub struct Signature<T: ?Sized> {
    pub file_type: FileType,
    pub matches: fn(&T) -> bool,
}

impl<T: ?Sized> Signature<T> {
    pub const fn new(file_type: FileType, matches: fn(&T) -> bool) -> Self {
        Self { file_type, matches }
    }
}

impl<T: ?Sized> Clone for Signature<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Signature<T> {}

impl<T: ?Sized> fmt::Debug for Signature<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature").field(&self.file_type).finish()
    }
}

/// Result of classifying a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Classification {
    pub file_type: FileType,
    /// Encoding the content was read as, or `None` for binary content
    pub encoding: Option<TextEncoding>,
}

/// Classifier over ordered text and binary signature tables.
///
/// Signatures are evaluated in registration order; the first match wins.
#[derive(Debug, Clone)]
pub struct ContentSniffer {
    text: Vec<Signature<str>>,
    binary: Vec<Signature<[u8]>>,
}

impl Default for ContentSniffer {
    fn default() -> Self {
        Self {
            text: TEXT_SIGNATURES.to_vec(),
            binary: BINARY_SIGNATURES.to_vec(),
        }
    }
}

impl ContentSniffer {
    /// A sniffer with the standard signature tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sniffer with no signatures; everything is `TXT` or `BIN`.
    pub fn empty() -> Self {
        Self {
            text: Vec::new(),
            binary: Vec::new(),
        }
    }

    /// Append a text signature after the existing ones.
    pub fn with_text(mut self, file_type: FileType, matches: fn(&str) -> bool) -> Self {
        self.text.push(Signature::new(file_type, matches));
        self
    }

    /// Append a binary signature after the existing ones.
    pub fn with_binary(mut self, file_type: FileType, matches: fn(&[u8]) -> bool) -> Self {
        self.binary.push(Signature::new(file_type, matches));
        self
    }

    /// Classify a buffer.
    pub fn classify(&self, data: &[u8]) -> FileType {
        self.sniff(data).file_type
    }

    /// Classify a buffer and report the encoding used for text.
    pub fn sniff(&self, data: &[u8]) -> Classification {
        sniff_with(&self.text, &self.binary, data)
    }
}

/// Classify a buffer with the standard signature tables.
pub fn classify(data: &[u8]) -> FileType {
    sniff(data).file_type
}

/// Classify a buffer with the standard signature tables, reporting encoding.
pub fn sniff(data: &[u8]) -> Classification {
    sniff_with(TEXT_SIGNATURES, BINARY_SIGNATURES, data)
}

fn sniff_with(text: &[Signature<str>], binary: &[Signature<[u8]>], data: &[u8]) -> Classification {
    match TextEncoding::detect(data) {
        Some(encoding) => {
            let decoded = encoding.decode(data);
            let file_type = first_match(text, &*decoded).unwrap_or(FileType::TXT);
            Classification {
                file_type,
                encoding: Some(encoding),
            }
        }
        None => Classification {
            file_type: first_match(binary, data).unwrap_or(FileType::BIN),
            encoding: None,
        },
    }
}

fn first_match<T: ?Sized>(signatures: &[Signature<T>], data: &T) -> Option<FileType> {
    signatures
        .iter()
        .find(|sig| (sig.matches)(data))
        .map(|sig| sig.file_type)
}

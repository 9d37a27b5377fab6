//! Binary-versus-text detection and text decoding.
//!
//! Content without a single zero byte is text in the default encoding.
//! Content with a zero byte is text only if it opens with a byte-order mark.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8};

/// Text encoding assumed for content classified as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TextEncoding {
    /// No zero byte and no mark; decoded as lossy UTF-8
    Default,
    Utf7,
    Utf8,
    Utf16Le,
    Utf16Be,
    /// Little-endian 32-bit code units, marked by `00 00 FE FF`
    Utf32Le,
}

/// Marks recognized when the content contains a zero byte, in test order.
const MARKED: [TextEncoding; 5] = [
    TextEncoding::Utf7,
    TextEncoding::Utf8,
    TextEncoding::Utf16Le,
    TextEncoding::Utf16Be,
    TextEncoding::Utf32Le,
];

impl TextEncoding {
    /// The byte-order mark announcing this encoding.
    pub const fn bom(self) -> &'static [u8] {
        match self {
            Self::Default => &[],
            Self::Utf7 => &[0x2B, 0x2F, 0x76],
            Self::Utf8 => &[0xEF, 0xBB, 0xBF],
            Self::Utf16Le => &[0xFF, 0xFE],
            Self::Utf16Be => &[0xFE, 0xFF],
            Self::Utf32Le => &[0x00, 0x00, 0xFE, 0xFF],
        }
    }

    /// Detect the encoding, or `None` if the content is binary.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if memchr::memchr(0, data).is_none() {
            return Some(Self::Default);
        }
        MARKED.into_iter().find(|enc| data.starts_with(enc.bom()))
    }

    /// Decode `data` to text, dropping a leading byte-order mark.
    ///
    /// Malformed sequences become U+FFFD.
    pub fn decode(self, data: &[u8]) -> Cow<'_, str> {
        match self {
            Self::Default | Self::Utf8 => UTF_8.decode_with_bom_removal(data).0,
            Self::Utf16Le => UTF_16LE.decode_with_bom_removal(data).0,
            Self::Utf16Be => UTF_16BE.decode_with_bom_removal(data).0,
            // Signature markers are all direct characters in UTF-7, which
            // share their encoding with ASCII.
            Self::Utf7 => UTF_8.decode_without_bom_handling(strip_utf7_bom(data)).0,
            Self::Utf32Le => Cow::Owned(decode_utf32_le(
                data.strip_prefix(self.bom()).unwrap_or(data),
            )),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Utf7 => "utf-7",
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Utf32Le => "utf-32le",
        })
    }
}

/// The UTF-7 mark is `+/v` followed by one of `8 9 + /` and an optional `-`.
fn strip_utf7_bom(data: &[u8]) -> &[u8] {
    let rest = data.strip_prefix(TextEncoding::Utf7.bom()).unwrap_or(data);
    let rest = match rest.first() {
        Some(b'8' | b'9' | b'+' | b'/') => &rest[1..],
        _ => rest,
    };
    rest.strip_prefix(b"-").unwrap_or(rest)
}

fn decode_utf32_le(data: &[u8]) -> String {
    let mut text = String::with_capacity(data.len() / 4);
    let mut units = data.chunks_exact(4);
    for unit in &mut units {
        let code = u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]);
        text.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    if !units.remainder().is_empty() {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_zero_byte_is_default_text() {
        assert_eq!(TextEncoding::detect(b"plain text"), Some(TextEncoding::Default));
        assert_eq!(TextEncoding::detect(b""), Some(TextEncoding::Default));
    }

    #[test]
    fn test_zero_byte_without_mark_is_binary() {
        assert_eq!(TextEncoding::detect(b"abc\0def"), None);
    }

    #[test]
    fn test_marks_with_zero_bytes() {
        let cases: [(&[u8], TextEncoding, &str); 5] = [
            (b"+/v8-a\0", TextEncoding::Utf7, "a\0"),
            (b"\xEF\xBB\xBFa\0", TextEncoding::Utf8, "a\0"),
            (b"\xFF\xFEa\0", TextEncoding::Utf16Le, "a"),
            (b"\xFE\xFF\0a", TextEncoding::Utf16Be, "a"),
            (b"\0\0\xFE\xFFa\0\0\0", TextEncoding::Utf32Le, "a"),
        ];
        for (data, expected, text) in cases {
            assert_eq!(TextEncoding::detect(data), Some(expected));
            assert_eq!(expected.decode(data), text);
        }
    }

    #[test]
    fn test_decode_utf16() {
        let data = b"\xFF\xFE{\0}\0";
        assert_eq!(TextEncoding::Utf16Le.decode(data), "{}");

        let data = b"\xFE\xFF\0[\0]";
        assert_eq!(TextEncoding::Utf16Be.decode(data), "[]");
    }

    #[test]
    fn test_decode_utf32_little_endian_units() {
        let data = b"\0\0\xFE\xFF{\0\0\0}\0\0\0";
        assert_eq!(TextEncoding::Utf32Le.decode(data), "{}");

        let data = b"\0\0\xFE\xFFx\0\0\0\0\0";
        assert_eq!(TextEncoding::Utf32Le.decode(data), "x\u{FFFD}");
    }

    #[test]
    fn test_default_strips_utf8_mark() {
        assert_eq!(TextEncoding::Default.decode(b"\xEF\xBB\xBF{}"), "{}");
    }
}

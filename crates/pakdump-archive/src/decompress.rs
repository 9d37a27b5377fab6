//! Payload decompression.

use std::borrow::Cow;

use rust_lzo::{LZOContext, LZOError};

use crate::record::CompressionType;
use crate::{Error, Result};

/// Decompress a payload according to its compression type.
///
/// Stored payloads ([`CompressionType::None`] and every
/// [`CompressionType::Unknown`] code) are returned unchanged without
/// consulting `expected_length`. LZO payloads must expand to exactly
/// `expected_length` bytes.
pub fn decompress(
    compression: CompressionType,
    data: &[u8],
    expected_length: i32,
) -> Result<Cow<'_, [u8]>> {
    match compression {
        CompressionType::None | CompressionType::Unknown(_) => Ok(Cow::Borrowed(data)),
        CompressionType::Lzo => {
            let expected = usize::try_from(expected_length).map_err(|_| Error::DataIntegrity {
                expected: expected_length.into(),
                found: "which is negative".to_string(),
            })?;
            decompress_lzo(data, expected).map(Cow::Owned)
        }
    }
}

/// Decompress a raw LZO1X stream with known output size.
pub fn decompress_lzo(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if expected_size == 0 && data.is_empty() {
        return Ok(Vec::new());
    }

    let mut output = vec![0u8; expected_size];
    let (written, err) = LZOContext::decompress_to_slice(data, &mut output);
    let written = written.len();

    match err {
        LZOError::OK => {}
        LZOError::OUTPUT_OVERRUN => {
            return Err(Error::DataIntegrity {
                expected: expected_size as i64,
                found: "output overran it".to_string(),
            })
        }
        LZOError::INPUT_OVERRUN => {
            return Err(Error::Decompression("LZO input overrun".to_string()))
        }
        LZOError::LOOKBEHIND_OVERRUN => {
            return Err(Error::Decompression("LZO lookbehind overrun".to_string()))
        }
        _ => return Err(Error::Decompression("malformed LZO stream".to_string())),
    }

    if written != expected_size {
        return Err(Error::DataIntegrity {
            expected: expected_size as i64,
            found: format!("got {written}"),
        });
    }

    Ok(output)
}

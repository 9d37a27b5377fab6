//! Binary signatures.
//!
//! Every test reads through [`BinaryReader`] lookups, so a buffer that is
//! too short for a signature simply does not match it.

use pakdump_common::BinaryReader;

use crate::{FileType, Signature};

/// Standard binary signatures in evaluation order.
///
/// Order matters where signatures share a prefix: TGA's eight-byte header
/// begins with CUR's four-byte header, so TGA must be tested first.
pub const BINARY_SIGNATURES: &[Signature<[u8]>] = &[
    Signature::new(FileType::ANI, is_ani),
    Signature::new(FileType::AVI, is_avi),
    Signature::new(FileType::WAV, is_wav),
    Signature::new(FileType::FSB, is_fsb),
    Signature::new(FileType::MP3, is_mp3),
    Signature::new(FileType::OGG, is_ogg),
    Signature::new(FileType::MP4, is_mp4),
    Signature::new(FileType::PNG, is_png),
    Signature::new(FileType::JPEG, is_jpeg),
    Signature::new(FileType::BMP, is_bmp),
    Signature::new(FileType::TGA, is_tga),
    Signature::new(FileType::DDS, is_dds),
    Signature::new(FileType::PSD, is_psd),
    Signature::new(FileType::IFF, is_iff),
    Signature::new(FileType::CUR, is_cur),
    Signature::new(FileType::ICO, is_ico),
    Signature::new(FileType::TTF, is_ttf),
    Signature::new(FileType::RAR, is_rar),
    Signature::new(FileType::ZIP, is_zip),
];

const TGA_HEADER: [u8; 8] = [0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
const CUR_HEADER: [u8; 4] = [0x00, 0x00, 0x02, 0x00];
const ICO_HEADER: [u8; 4] = [0x00, 0x00, 0x01, 0x00];
const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// TrueType `head` table magic, found at this offset in game fonts.
const TTF_MAGIC: [u8; 4] = [0x5F, 0x0F, 0x3C, 0xF5];
const TTF_MAGIC_OFFSET: usize = 264;

/// ID3v1 tags occupy the last 128 bytes.
const ID3V1_SIZE: usize = 128;

fn riff(data: &[u8], form: &[u8; 4]) -> bool {
    let reader = BinaryReader::new(data);
    reader.matches_at(0, b"RIFF") && reader.matches_at(8, form)
}

pub fn is_ani(data: &[u8]) -> bool {
    riff(data, b"ACON")
}

pub fn is_avi(data: &[u8]) -> bool {
    riff(data, b"AVI ")
}

pub fn is_wav(data: &[u8]) -> bool {
    riff(data, b"WAVE")
}

pub fn is_fsb(data: &[u8]) -> bool {
    data.starts_with(b"FSB5")
}

pub fn is_mp3(data: &[u8]) -> bool {
    // ID3v2
    if data.starts_with(b"ID3") {
        return true;
    }

    // ID3v1
    if let Some(start) = data.len().checked_sub(ID3V1_SIZE) {
        if data[start..].starts_with(b"TAG") {
            return true;
        }
    }

    is_mpeg_audio_frame(data)
}

/// MPEG-1 Layer III frame header: 11 sync bits, version `11`, layer `01`.
fn is_mpeg_audio_frame(data: &[u8]) -> bool {
    let Ok(head) = BinaryReader::new(data).read_u32_be() else {
        return false;
    };
    let sync = head & 0xFFE0_0000 == 0xFFE0_0000;
    let version = (head >> 19) & 0b11;
    let layer = (head >> 17) & 0b11;
    sync && version == 0b11 && layer == 0b01
}

pub fn is_ogg(data: &[u8]) -> bool {
    data.starts_with(b"OggS")
}

pub fn is_mp4(data: &[u8]) -> bool {
    BinaryReader::new(data).matches_at(4, b"ftyp")
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_MAGIC)
}

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8]) && data.ends_with(&[0xFF, 0xD9])
}

/// `BM` followed by a file size that matches the buffer.
pub fn is_bmp(data: &[u8]) -> bool {
    if !data.starts_with(b"BM") {
        return false;
    }
    BinaryReader::new_at(data, 2)
        .read_i32()
        .map_or(false, |size| i64::from(size) == data.len() as i64)
}

pub fn is_tga(data: &[u8]) -> bool {
    data.starts_with(&TGA_HEADER)
}

pub fn is_dds(data: &[u8]) -> bool {
    data.starts_with(b"DDS ")
}

pub fn is_psd(data: &[u8]) -> bool {
    data.starts_with(b"8BPS")
}

pub fn is_iff(data: &[u8]) -> bool {
    let reader = BinaryReader::new(data);
    reader.matches_at(0, b"FOR4") && reader.matches_at(8, b"CIMG")
}

/// Must be tested after [`is_tga`].
pub fn is_cur(data: &[u8]) -> bool {
    data.starts_with(&CUR_HEADER)
}

pub fn is_ico(data: &[u8]) -> bool {
    data.starts_with(&ICO_HEADER)
}

pub fn is_ttf(data: &[u8]) -> bool {
    BinaryReader::new(data).matches_at(TTF_MAGIC_OFFSET, &TTF_MAGIC)
}

pub fn is_rar(data: &[u8]) -> bool {
    data.starts_with(b"Rar!")
}

pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(&ZIP_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_riff_forms() {
        assert!(is_wav(b"RIFF\0\0\0\0WAVEfmt "));
        assert!(is_avi(b"RIFF\0\0\0\0AVI LIST"));
        assert!(is_ani(b"RIFF\0\0\0\0ACONanih"));
        assert!(!is_wav(b"RIFF\0\0\0\0WAV"));
        assert!(!is_wav(b"RIFF"));
    }

    #[test]
    fn test_mp3_variants() {
        assert!(is_mp3(b"ID3\x04\0\0\0\0"));
        assert!(is_mp3(&[0xFF, 0xFB, 0x90, 0x00]));

        let mut tagged = vec![0u8; 300];
        tagged[300 - 128..300 - 125].copy_from_slice(b"TAG");
        assert!(is_mp3(&tagged));

        // Layer bits 00 are reserved.
        assert!(!is_mp3(&[0xFF, 0xF9, 0x90, 0x00]));
        // MPEG-2 version bits.
        assert!(!is_mp3(&[0xFF, 0xF3, 0x90, 0x00]));
        assert!(!is_mp3(&[0xFF, 0xFB]));
        assert!(!is_mp3(b""));
    }

    #[test]
    fn test_jpeg_needs_trailer() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0xFF, 0xD9]));
        assert!(!is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
    }

    #[test]
    fn test_bmp_size_field() {
        let mut bmp = vec![0u8; 54];
        bmp[..2].copy_from_slice(b"BM");
        bmp[2..6].copy_from_slice(&54i32.to_le_bytes());
        assert!(is_bmp(&bmp));

        bmp[2..6].copy_from_slice(&53i32.to_le_bytes());
        assert!(!is_bmp(&bmp));
        assert!(!is_bmp(b"BM\0"));
    }

    #[test]
    fn test_tga_and_cur_share_prefix() {
        assert!(is_tga(&TGA_HEADER));
        assert!(is_cur(&TGA_HEADER));
        assert!(!is_tga(&[0x00, 0x00, 0x02, 0x00, 0x01, 0x00]));
    }

    #[test]
    fn test_offset_signatures() {
        assert!(is_mp4(b"\0\0\0\x18ftypmp42"));
        assert!(is_iff(b"FOR4\0\0\0\x10CIMG"));

        let mut font = vec![0u8; 400];
        font[264..268].copy_from_slice(&TTF_MAGIC);
        assert!(is_ttf(&font));
        assert!(!is_ttf(&font[..266]));
    }
}

//! Built-in signature table and the structural predicates behind it.
//!
//! Order matters: the classifier takes the first rule that fires, so cheap
//! and specific rules come first and nested formats precede the formats
//! that contain them (WebM before Matroska).

use crate::signatures::{ExactSignature, FnMatcher, MaskedSignature};
use crate::traits::{Matcher, MediaSource};
use crate::types::mime;
use memchr::memmem;
use std::io::SeekFrom;

const EBML_MAGIC: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];

/// Largest `ftyp` box read back from the stream when it overruns the prefix.
pub const MAX_FTYP_BOX: usize = 64 * 1024;

const RIFF_MASK: &[u8] = b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF";

/// Builds the default rule list in precedence order.
#[must_use]
pub fn builtin_matchers() -> Vec<Box<dyn Matcher>> {
    vec![
        // Most common inputs first. More expensive checks sit lower.
        Box::new(ExactSignature::new("jpg", mime::JPEG, &b"\xFF\xD8\xFF"[..])),
        Box::new(ExactSignature::new(
            "png",
            mime::PNG,
            &b"\x89PNG\x0D\x0A\x1A\x0A"[..],
        )),
        Box::new(ExactSignature::new("gif", mime::GIF, &b"GIF87a"[..])),
        Box::new(ExactSignature::new("gif", mime::GIF, &b"GIF89a"[..])),
        Box::new(MaskedSignature::new(
            "webp",
            mime::WEBP,
            &b"RIFF\x00\x00\x00\x00WEBPVP"[..],
            &b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF"[..],
        )),
        Box::new(MaskedSignature::new(
            "ogg",
            mime::OGG,
            &b"OggS\x00"[..],
            &b"\xFF\xFF\xFF\xFF\xFF"[..],
        )),
        Box::new(FnMatcher::new(mime::WEBM, "webm", |prefix, _| {
            is_matroska_doc_type(prefix, b"webm")
        })),
        Box::new(FnMatcher::new(mime::MKV, "mkv", |prefix, _| {
            is_matroska_doc_type(prefix, b"matroska")
        })),
        Box::new(ExactSignature::new("pdf", mime::PDF, &b"%PDF-"[..])),
        Box::new(MaskedSignature::new(
            "mp3",
            mime::MP3,
            &b"ID3"[..],
            &b"\xFF\xFF\xFF"[..],
        )),
        Box::new(FnMatcher::new(mime::MP4, "mp4", is_mp4)),
        // ADTS sync word, MPEG-4 and MPEG-2 variants
        Box::new(ExactSignature::new("aac", mime::AAC, &b"\xFF\xF1"[..])),
        Box::new(ExactSignature::new("aac", mime::AAC, &b"\xFF\xF9"[..])),
        Box::new(ExactSignature::new("bmp", mime::BMP, &b"BM"[..])),
        Box::new(MaskedSignature::new(
            "wav",
            mime::WAV,
            &b"RIFF\x00\x00\x00\x00WAVE"[..],
            RIFF_MASK,
        )),
        Box::new(MaskedSignature::new(
            "avi",
            mime::AVI,
            &b"RIFF\x00\x00\x00\x00AVI "[..],
            RIFF_MASK,
        )),
        Box::new(ExactSignature::new("psd", mime::PSD, &b"8BPS"[..])),
        Box::new(ExactSignature::new("flac", mime::FLAC, &b"fLaC"[..])),
        Box::new(ExactSignature::new("tiff", mime::TIFF, &b"II*\x00"[..])),
        Box::new(ExactSignature::new("tiff", mime::TIFF, &b"MM\x00*"[..])),
        Box::new(ExactSignature::new(
            "mov",
            mime::MOV,
            &b"\x00\x00\x00\x14ftyp"[..],
        )),
        Box::new(ExactSignature::new(
            "wmv",
            mime::WMV,
            &[0x30u8, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9][..],
        )),
        Box::new(ExactSignature::new("flv", mime::FLV, &b"FLV\x01"[..])),
        Box::new(ExactSignature::new("ico", mime::ICO, &b"\x00\x00\x01\x00"[..])),
        Box::new(MaskedSignature::new(
            "midi",
            mime::MIDI,
            &b"MThd\x00\x00\x00\x06"[..],
            &b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF"[..],
        )),
        Box::new(ExactSignature::new("zip", mime::ZIP, &b"PK\x03\x04"[..])),
        Box::new(ExactSignature::new(
            "rar",
            mime::RAR,
            &b"Rar!\x1A\x07\x00"[..],
        )),
        Box::new(ExactSignature::new(
            "rar",
            mime::RAR,
            &b"Rar!\x1A\x07\x01\x00"[..],
        )),
    ]
}

/// EBML header followed somewhere in the prefix by the given DocType.
pub fn is_matroska_doc_type(prefix: &[u8], doc_type: &[u8]) -> bool {
    prefix.len() > 8
        && prefix.starts_with(EBML_MAGIC)
        && memmem::find(&prefix[4..], doc_type).is_some()
}

/// ISO base media file with an MP4 family brand in its `ftyp` box.
///
/// The box is length-prefixed. When it extends past the sniffed prefix it is
/// read back from the stream, up to [`MAX_FTYP_BOX`] bytes.
pub fn is_mp4(prefix: &[u8], stream: &mut dyn MediaSource) -> bool {
    if prefix.len() < 12 || &prefix[4..8] != b"ftyp" {
        return false;
    }
    let box_size = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if box_size % 4 != 0 || box_size < 12 {
        return false;
    }

    if box_size <= prefix.len() {
        return has_mp4_brand(&prefix[..box_size]);
    }
    if box_size > MAX_FTYP_BOX {
        return false;
    }

    let mut ftyp = vec![0u8; box_size];
    let read = stream
        .seek(SeekFrom::Start(0))
        .and_then(|_| stream.read_exact(&mut ftyp));
    read.is_ok() && has_mp4_brand(&ftyp)
}

fn has_mp4_brand(ftyp: &[u8]) -> bool {
    // Major brand, then the minor version word, then compatible brands.
    ftyp[8..]
        .chunks_exact(4)
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .any(|(_, brand)| is_mp4_brand(brand))
}

fn is_mp4_brand(brand: &[u8]) -> bool {
    const FAMILIES: [&[u8]; 6] = [b"mp4", b"iso", b"avc1", b"M4V", b"M4A", b"dash"];
    FAMILIES.iter().any(|family| brand.starts_with(family))
}

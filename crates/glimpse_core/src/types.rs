use serde::{Deserialize, Serialize};

/// Canonical MIME strings of the built-in formats.
pub mod mime {
    pub const OCTET_STREAM: &str = "application/octet-stream";

    pub const JPEG: &str = "image/jpeg";
    pub const PNG: &str = "image/png";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const BMP: &str = "image/bmp";
    pub const PSD: &str = "image/photoshop";
    pub const TIFF: &str = "image/tiff";
    pub const ICO: &str = "image/x-icon";
    pub const PDF: &str = "application/pdf";

    pub const MP3: &str = "audio/mpeg";
    pub const AAC: &str = "audio/aac";
    pub const WAV: &str = "audio/wave";
    pub const FLAC: &str = "audio/x-flac";
    pub const MIDI: &str = "audio/midi";
    pub const OGG: &str = "application/ogg";

    pub const WEBM: &str = "video/webm";
    pub const MKV: &str = "video/x-matroska";
    pub const AVI: &str = "video/avi";
    pub const MP4: &str = "video/mp4";
    pub const MOV: &str = "video/quicktime";
    pub const WMV: &str = "video/x-ms-wmv";
    pub const FLV: &str = "video/x-flv";

    pub const ZIP: &str = "application/zip";
    pub const RAR: &str = "application/x-rar-compressed";
    pub const CBZ: &str = "application/vnd.comicbook+zip";
    pub const CBR: &str = "application/vnd.comicbook-rar";
}

/// Default bound applied to a thumbnail axis left at zero.
pub const DEFAULT_THUMB_EDGE: u32 = 150;

/// A width/height pair. Zero means unknown or unconstrained, depending on
/// where the value appears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Requested thumbnail bounds with zero axes replaced by the default.
    #[must_use]
    pub const fn or_default_thumb(self) -> Self {
        Self {
            width: if self.width == 0 {
                DEFAULT_THUMB_EDGE
            } else {
                self.width
            },
            height: if self.height == 0 {
                DEFAULT_THUMB_EDGE
            } else {
                self.height
            },
        }
    }

    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of a successful classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub mime: String,
    pub extension: String,
}

impl Detection {
    pub fn new(mime: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            extension: extension.into(),
        }
    }
}

/// Processing path a MIME type is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    AudioVideo,
    Archive,
    Unknown,
}

impl MediaKind {
    #[must_use]
    pub fn of(mime_type: &str) -> Self {
        use mime::*;
        match mime_type {
            JPEG | PNG | GIF | WEBP | PDF | BMP | PSD | TIFF | ICO => Self::Image,
            MP3 | AAC | WAV | FLAC | MIDI | OGG | WEBM | MKV | AVI | MP4 | MOV | WMV | FLV => {
                Self::AudioVideo
            }
            ZIP | RAR => Self::Archive,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::AudioVideo => "audio/video",
            Self::Archive => "archive",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

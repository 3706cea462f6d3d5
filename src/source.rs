use bytes::Bytes;
use glimpse_core::{Detection, Dims};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// What was learned about an input while processing it.
///
/// The MIME type and extension are fixed at construction; every other field
/// is filled in by whichever processing path ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Source {
    mime: String,
    extension: String,
    pub dims: Dims,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub has_audio: bool,
    pub has_video: bool,
    pub has_cover_art: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub codec: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub artist: String,
}

impl Source {
    pub fn new(detection: Detection) -> Self {
        Self {
            mime: detection.mime,
            extension: detection.extension,
            ..Self::default()
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Encoding of a finished thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbFormat {
    Jpeg,
    Png,
}

impl ThumbFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub const fn is_lossless(&self) -> bool {
        matches!(self, Self::Png)
    }
}

impl fmt::Display for ThumbFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An encoded thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub data: Bytes,
    pub format: ThumbFormat,
    pub dims: Dims,
}

/// Raw RGBA pixels, row-major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    pub pixels: Vec<u8>,
    pub dims: Dims,
}

impl RasterFrame {
    /// Expected pixel buffer length for `dims`.
    pub fn byte_len(dims: Dims) -> usize {
        dims.pixel_count() as usize * 4
    }

    pub fn is_opaque(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == u8::MAX)
    }
}

/// Outcome of a processing call.
///
/// `thumbnail` is `None` when the input is valid but has nothing to preview,
/// such as audio without cover art.
#[derive(Debug, Clone)]
pub struct Processed {
    pub source: Source,
    pub thumbnail: Option<Thumbnail>,
}

//! Per-call options and per-thumbnailer tool configuration.

use glimpse_core::Dims;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default JPEG quality used when [`Options::jpeg_quality`] is zero.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Options for a single processing call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Largest accepted source. Zero axes are unbounded.
    pub max_source_dims: Dims,
    /// Thumbnail bounding box. Zero axes default to 150.
    pub thumb_dims: Dims,
    /// MIME types to process. `None` accepts everything classifiable.
    pub accepted_mime_types: Option<HashSet<String>>,
    /// JPEG quality from 1 to 100. Zero means 75.
    pub jpeg_quality: u8,
    /// Lossy PNG recompression through pngquant.
    pub png_quantize: Option<PngQuantize>,
}

impl Options {
    pub fn accept<I, S>(mut self, mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_mime_types = Some(mimes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn jpeg_quality(&self) -> u8 {
        match self.jpeg_quality {
            0 => DEFAULT_JPEG_QUALITY,
            q => q.min(100),
        }
    }

    /// Options for a sub-document: same bounds, every type accepted.
    #[must_use]
    pub(crate) fn relaxed(&self) -> Self {
        Self {
            accepted_mime_types: None,
            ..self.clone()
        }
    }
}

/// pngquant quality range, each end from 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PngQuantize {
    pub min_quality: u8,
    pub max_quality: u8,
}

impl Default for PngQuantize {
    fn default() -> Self {
        Self {
            min_quality: 65,
            max_quality: 80,
        }
    }
}

/// External programs used by the default toolkits.
///
/// Entries are bare names resolved through `PATH` unless configured as paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub ffprobe: String,
    pub ffmpeg: String,
    pub unrar: String,
    pub gs: String,
    pub pngquant: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".into(),
            ffmpeg: "ffmpeg".into(),
            unrar: "unrar".into(),
            gs: "gs".into(),
            pngquant: "pngquant".into(),
        }
    }
}

//! File type detection and thumbnail generation.
//!
//! A [`Thumbnailer`] classifies an input by its leading bytes, routes it to
//! the image, audio/video or archive path and returns what it learned about
//! the input together with a small JPEG or PNG preview.
//!
//! ```ignore
//! use glimpse::{Options, Thumbnailer};
//!
//! let thumbnailer = Thumbnailer::new();
//! let processed = thumbnailer.process_path("cover.png", &Options::default())?;
//! if let Some(thumb) = processed.thumbnail {
//!     std::fs::write(format!("thumb.{}", thumb.format), &thumb.data)?;
//! }
//! ```

pub mod archive;
pub mod error;
pub mod input;
pub mod media;
pub mod options;
pub mod pipeline;
pub mod probe;
pub mod processor;
pub mod raster;
pub mod source;

pub use error::{PipelineError, Result, ThumbnailError};
pub use input::InputFile;
pub use media::{FfmpegToolkit, MediaContext, MediaToolkit};
pub use options::{Options, PngQuantize, ToolConfig};
pub use pipeline::{Pipeline, Stage, run_command};
pub use probe::{FfprobeMp3Probe, MediaReport};
pub use processor::{MAX_NESTING_DEPTH, Processor, Thumbnailer, ThumbnailerBuilder};
pub use raster::{ImageToolkit, NativeImageToolkit};
pub use source::{Processed, RasterFrame, Source, ThumbFormat, Thumbnail};

pub use glimpse_core::{
    BufferPool, CoreError, Detection, Dims, ExactSignature, FallbackProbe, FnMatcher,
    MaskedSignature, Matcher, MatcherSet, MediaKind, MediaSource, SNIFF_SIZE, SourceLimit, mime,
    plan_thumbnail,
};

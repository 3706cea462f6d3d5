//! The [`Thumbnailer`] facade: classify, dispatch, thumbnail.

use crate::archive::{ArchiveReader, RarScanner, ZipScanner};
use crate::error::{Result, ThumbnailError};
use crate::input::InputFile;
use crate::media::{FfmpegToolkit, MediaContext, MediaToolkit};
use crate::options::{Options, ToolConfig};
use crate::probe::FfprobeMp3Probe;
use crate::raster::{ImageToolkit, NativeImageToolkit};
use crate::source::{Processed, Source, Thumbnail};
use glimpse_core::{
    BufferPool, Detection, FallbackProbe, FormatClassifier, Matcher, MatcherSet, MediaKind,
    MediaSource, SourceLimit, mime, plan_thumbnail,
};
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Sub-documents (archive members, cover art) nested deeper than this are
/// rejected. Allows one archive inside another.
pub const MAX_NESTING_DEPTH: usize = 2;

/// Custom handling for one MIME type, replacing the built-in path.
pub trait Processor: Send + Sync {
    /// Fills in `source` and produces a thumbnail, or `None` when the input
    /// has nothing to preview.
    fn process(
        &self,
        input: &mut dyn MediaSource,
        source: &mut Source,
        opts: &Options,
    ) -> Result<Option<Thumbnail>>;
}

/// Classifies inputs and produces thumbnails.
///
/// Registries are fixed while any call is in flight: registration takes
/// `&mut self`, processing takes `&self`. Share a configured `Thumbnailer`
/// between threads behind an `Arc`.
pub struct Thumbnailer {
    matchers: MatcherSet,
    processors: HashMap<String, Arc<dyn Processor>>,
    fallback: Option<Box<dyn FallbackProbe>>,
    media: Box<dyn MediaToolkit>,
    images: Box<dyn ImageToolkit>,
    tools: ToolConfig,
    pool: &'static BufferPool,
}

impl Thumbnailer {
    /// A thumbnailer with the built-in table and the default toolkits.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ThumbnailerBuilder {
        ThumbnailerBuilder::default()
    }

    /// Appends a signature rule after every rule already registered.
    ///
    /// # Errors
    ///
    /// Rejects a byte-pattern rule identical to a registered one.
    pub fn register_matcher(&mut self, matcher: Box<dyn Matcher>) -> Result<()> {
        Ok(self.matchers.register(matcher)?)
    }

    /// Routes `mime` to `processor` instead of the built-in path. Returns the
    /// processor previously registered for `mime`.
    ///
    /// Comic types are matched after the archive scan reclassifies a zip or
    /// rar, and the processor then receives the whole rewound archive.
    pub fn register_processor(
        &mut self,
        mime: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> Option<Arc<dyn Processor>> {
        self.processors.insert(mime.into(), processor)
    }

    /// Classifies `input` without processing it.
    pub fn detect(&self, input: &mut dyn MediaSource, opts: &Options) -> Result<Detection> {
        let mut classifier = FormatClassifier::new(&self.matchers).with_pool(self.pool);
        if let Some(fallback) = self.fallback.as_deref() {
            classifier = classifier.with_fallback(fallback);
        }
        Ok(classifier.classify(input, opts.accepted_mime_types.as_ref())?)
    }

    /// Classifies `input` and thumbnails it.
    ///
    /// # Errors
    ///
    /// Classification failures, dimension limits, toolkit and pipeline
    /// failures. Valid inputs without anything to preview are not errors:
    /// they return [`Processed`] with no thumbnail.
    #[instrument(level = "debug", skip_all)]
    pub fn process(&self, input: &mut dyn MediaSource, opts: &Options) -> Result<Processed> {
        self.process_at(input, opts, 0)
    }

    /// Opens `path` and processes it.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn process_path(&self, path: impl AsRef<Path>, opts: &Options) -> Result<Processed> {
        let mut input = InputFile::open(path.as_ref())?;
        self.process_at(&mut input, opts, 0)
    }

    fn process_at(
        &self,
        input: &mut dyn MediaSource,
        opts: &Options,
        depth: usize,
    ) -> Result<Processed> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ThumbnailError::NestingTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        let detection = self.detect(input, opts)?;
        debug!(mime = %detection.mime, depth, "classified");

        if let Some(processor) = self.processors.get(&detection.mime) {
            let mut source = Source::new(detection);
            let thumbnail = processor.process(input, &mut source, opts)?;
            return Ok(Processed { source, thumbnail });
        }

        match MediaKind::of(&detection.mime) {
            MediaKind::Image => {
                let mut source = Source::new(detection);
                let thumbnail = self.process_image(input, &mut source, opts)?;
                Ok(Processed { source, thumbnail })
            }
            MediaKind::AudioVideo => {
                let mut source = Source::new(detection);
                let thumbnail = self.process_media(input, &mut source, opts, depth)?;
                Ok(Processed { source, thumbnail })
            }
            MediaKind::Archive => self.process_archive(input, detection, opts, depth),
            MediaKind::Unknown => Err(glimpse_core::CoreError::Unsupported {
                mime: detection.mime,
            }
            .into()),
        }
    }

    fn process_image(
        &self,
        input: &mut dyn MediaSource,
        source: &mut Source,
        opts: &Options,
    ) -> Result<Option<Thumbnail>> {
        let data = self.pool.read_all(input)?;
        let limit = if source.mime() == mime::PDF {
            SourceLimit::PassThrough
        } else {
            SourceLimit::Enforce
        };

        // Reject oversized inputs before decoding them.
        let header = self.images.dimensions(&data, source.mime())?;
        let limit = if header.is_unknown() {
            limit
        } else {
            plan_thumbnail(header, opts.max_source_dims, opts.thumb_dims, limit)?;
            SourceLimit::PassThrough
        };

        let frame = self.images.decode(&data, source.mime())?;
        drop(data);
        source.dims = frame.dims;

        let planned = plan_thumbnail(frame.dims, opts.max_source_dims, opts.thumb_dims, limit)?;
        self.images.encode(frame, planned, opts).map(Some)
    }

    fn process_media(
        &self,
        input: &mut dyn MediaSource,
        source: &mut Source,
        opts: &Options,
        depth: usize,
    ) -> Result<Option<Thumbnail>> {
        let mut ctx = self.media.open(input)?;
        let report = ctx.report().clone();
        source.has_audio = report.has_audio;
        source.has_video = report.has_video;
        source.has_cover_art = report.cover_art_stream.is_some();
        source.duration = report.duration;
        source.codec = report.codec.clone();
        source.title = report.title.clone();
        source.artist = report.artist.clone();
        source.dims = report.dims;

        if source.has_cover_art {
            match self.cover_art(ctx.as_mut(), opts, depth) {
                Ok(Some(thumbnail)) => return Ok(Some(thumbnail)),
                Ok(None) => {}
                Err(e) if report.has_video => {
                    debug!(error = %e, "cover art failed, using a video frame");
                }
                Err(e) => {
                    warn!(error = %e, "cover art failed");
                    return Ok(None);
                }
            }
        }
        if !report.has_video {
            return Ok(None);
        }
        if report.dims.is_unknown() {
            return Err(ThumbnailError::GetFrame("unknown video dimensions".into()));
        }

        let planned = plan_thumbnail(
            report.dims,
            opts.max_source_dims,
            opts.thumb_dims,
            SourceLimit::Enforce,
        )?;
        let frame = ctx.frame(planned)?;
        self.images.encode(frame, planned, opts).map(Some)
    }

    /// Thumbnails embedded cover art as an independent document.
    fn cover_art(
        &self,
        ctx: &mut dyn MediaContext,
        opts: &Options,
        depth: usize,
    ) -> Result<Option<Thumbnail>> {
        let art = ctx.cover_art().map_err(ThumbnailError::cover_art)?;
        let Some(art) = art else {
            return Ok(None);
        };
        let mut art = Cursor::new(art);
        self.process_at(&mut art, &opts.relaxed(), depth + 1)
            .map(|processed| processed.thumbnail)
            .map_err(ThumbnailError::cover_art)
    }

    fn process_archive(
        &self,
        input: &mut dyn MediaSource,
        detection: Detection,
        opts: &Options,
        depth: usize,
    ) -> Result<Processed> {
        let mut reader: Box<dyn ArchiveReader + '_> = if detection.mime == mime::RAR {
            Box::new(RarScanner::open(input, self.tools.unrar.as_str())?)
        } else {
            Box::new(ZipScanner::open(input)?)
        };

        let scan = reader.scan()?;
        let detection = if scan.is_comic() {
            let (mime, extension) = reader.comic_type();
            Detection::new(mime, extension)
        } else {
            detection
        };
        debug!(
            mime = %detection.mime,
            images = scan.images,
            total = scan.total,
            "scanned archive"
        );

        // A comic reclassification can route to a processor registered for
        // the comic type.
        if let Some(processor) = self.processors.get(&detection.mime) {
            drop(reader);
            input.seek(SeekFrom::Start(0))?;
            let mut source = Source::new(detection);
            let thumbnail = processor.process(input, &mut source, opts)?;
            return Ok(Processed { source, thumbnail });
        }
        let source = Source::new(detection);

        let Some(entry) = scan.candidate else {
            return Ok(Processed {
                source,
                thumbnail: None,
            });
        };

        let mut member = reader
            .extract(&entry)
            .map_err(ThumbnailError::archive_member)?;
        let inner = self
            .process_at(&mut member, &opts.relaxed(), depth + 1)
            .map_err(ThumbnailError::archive_member)?;
        Ok(Processed {
            source,
            thumbnail: inner.thumbnail,
        })
    }
}

impl Default for Thumbnailer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Thumbnailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnailer")
            .field("matchers", &self.matchers)
            .field("processors", &self.processors.keys().collect::<Vec<_>>())
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

/// Configures a [`Thumbnailer`].
#[derive(Default)]
pub struct ThumbnailerBuilder {
    tools: ToolConfig,
    media: Option<Box<dyn MediaToolkit>>,
    images: Option<Box<dyn ImageToolkit>>,
    fallback: Option<Option<Box<dyn FallbackProbe>>>,
    pool: Option<&'static BufferPool>,
}

impl ThumbnailerBuilder {
    #[must_use]
    pub fn tools(mut self, tools: ToolConfig) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn media_toolkit(mut self, media: impl MediaToolkit + 'static) -> Self {
        self.media = Some(Box::new(media));
        self
    }

    #[must_use]
    pub fn image_toolkit(mut self, images: impl ImageToolkit + 'static) -> Self {
        self.images = Some(Box::new(images));
        self
    }

    /// Replaces the ffprobe MP3 probe. `None` disables the fallback.
    #[must_use]
    pub fn fallback_probe(mut self, probe: Option<Box<dyn FallbackProbe>>) -> Self {
        self.fallback = Some(probe);
        self
    }

    #[must_use]
    pub fn pool(mut self, pool: &'static BufferPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Thumbnailer {
        let tools = self.tools;
        let fallback = self.fallback.unwrap_or_else(|| {
            Some(Box::new(FfprobeMp3Probe::new(tools.ffprobe.as_str())) as Box<dyn FallbackProbe>)
        });
        Thumbnailer {
            matchers: MatcherSet::builtin(),
            processors: HashMap::new(),
            fallback,
            media: self
                .media
                .unwrap_or_else(|| Box::new(FfmpegToolkit::new(tools.clone()))),
            images: self
                .images
                .unwrap_or_else(|| Box::new(NativeImageToolkit::new(tools.clone()))),
            pool: self.pool.unwrap_or_else(BufferPool::global),
            tools,
        }
    }
}

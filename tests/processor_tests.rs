//! Processor tests
//!
//! End-to-end processing through the [`Thumbnailer`] facade with the native
//! image toolkit and a scripted media toolkit standing in for ffmpeg.

use glimpse::{
    CoreError, Dims, ExactSignature, MediaContext, MediaReport, MediaSource, MediaToolkit,
    Options, Processor, RasterFrame, Source, ThumbFormat, Thumbnail, Thumbnailer, ThumbnailError,
    mime,
};
use image::{ImageFormat, Rgba, RgbaImage};
use rstest::*;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;

// ============================================================================
// Fixtures
// ============================================================================

fn encode(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn opaque_png(width: u32, height: u32) -> Vec<u8> {
    encode(&RgbaImage::from_pixel(width, height, Rgba([90, 160, 40, 255])))
}

/// An `ftyp` box with MP4 brands followed by filler.
fn mp4_header() -> Vec<u8> {
    let mut data = vec![0, 0, 0, 24];
    data.extend_from_slice(b"ftypisom\x00\x00\x02\x00isomavc1");
    data.resize(256, 0);
    data
}

fn flac_header() -> Vec<u8> {
    let mut data = b"fLaC".to_vec();
    data.resize(256, 0);
    data
}

fn mp3_header() -> Vec<u8> {
    let mut data = b"ID3\x04\x00".to_vec();
    data.resize(256, 0);
    data
}

/// Media toolkit returning a fixed report and solid frames.
#[derive(Clone, Default)]
struct ScriptedMedia {
    report: MediaReport,
    cover_art: Option<Vec<u8>>,
    frames: Arc<AtomicUsize>,
}

impl MediaToolkit for ScriptedMedia {
    fn open(&self, _input: &mut dyn MediaSource) -> glimpse::Result<Box<dyn MediaContext>> {
        if !self.report.has_audio && !self.report.has_video && self.report.cover_art_stream.is_none() {
            return Err(ThumbnailError::NoStreams);
        }
        Ok(Box::new(self.clone()))
    }
}

impl MediaContext for ScriptedMedia {
    fn report(&self) -> &MediaReport {
        &self.report
    }

    fn cover_art(&mut self) -> glimpse::Result<Option<Vec<u8>>> {
        Ok(self.cover_art.clone())
    }

    fn frame(&mut self, dims: Dims) -> glimpse::Result<RasterFrame> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(RasterFrame {
            pixels: [10, 20, 30, 255].repeat(RasterFrame::byte_len(dims) / 4),
            dims,
        })
    }
}

fn audio_report() -> MediaReport {
    MediaReport {
        has_audio: true,
        duration: Duration::from_secs(214),
        codec: "flac".into(),
        title: "Track".into(),
        artist: "Band".into(),
        ..MediaReport::default()
    }
}

fn video_report() -> MediaReport {
    MediaReport {
        has_audio: true,
        has_video: true,
        duration: Duration::from_secs(60),
        codec: "h264".into(),
        dims: Dims::new(1280, 720),
        video_stream: Some(0),
        ..MediaReport::default()
    }
}

fn with_media(media: ScriptedMedia) -> Thumbnailer {
    Thumbnailer::builder()
        .media_toolkit(media)
        .fallback_probe(None)
        .build()
}

#[fixture]
fn thumbnailer() -> Thumbnailer {
    with_media(ScriptedMedia::default())
}

// ============================================================================
// Images
// ============================================================================

#[rstest]
fn test_landscape_png_to_jpeg(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(opaque_png(1280, 720));
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processed.source.mime(), mime::PNG);
    assert_eq!(processed.source.dims, Dims::new(1280, 720));
    let thumb = processed.thumbnail.unwrap();
    assert_eq!(thumb.format, ThumbFormat::Jpeg);
    assert_eq!(thumb.dims, Dims::new(150, 84));
    assert!(thumb.data.starts_with(b"\xFF\xD8\xFF"));
}

#[rstest]
fn test_transparent_png_stays_png(thumbnailer: Thumbnailer) {
    let mut image = RgbaImage::from_pixel(400, 400, Rgba([255, 255, 255, 255]));
    image.put_pixel(10, 10, Rgba([0, 0, 0, 0]));
    let mut input = Cursor::new(encode(&image));

    let thumb = thumbnailer
        .process(&mut input, &Options::default())
        .unwrap()
        .thumbnail
        .unwrap();
    assert_eq!(thumb.format, ThumbFormat::Png);
    assert_eq!(thumb.dims, Dims::new(150, 150));
}

#[rstest]
fn test_custom_bounds(thumbnailer: Thumbnailer) {
    let opts = Options {
        thumb_dims: Dims::new(320, 0),
        ..Options::default()
    };
    let mut input = Cursor::new(opaque_png(640, 1280));
    let thumb = thumbnailer.process(&mut input, &opts).unwrap().thumbnail.unwrap();

    assert_eq!(thumb.dims, Dims::new(75, 150));
}

#[rstest]
fn test_process_path(thumbnailer: Thumbnailer) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&opaque_png(300, 200)).unwrap();
    file.flush().unwrap();

    let processed = thumbnailer
        .process_path(file.path(), &Options::default())
        .unwrap();
    assert_eq!(processed.thumbnail.unwrap().dims, Dims::new(150, 100));
}

#[rstest]
fn test_too_wide_is_rejected(thumbnailer: Thumbnailer) {
    let opts = Options {
        max_source_dims: Dims::new(1000, 0),
        ..Options::default()
    };
    let mut input = Cursor::new(opaque_png(1280, 720));
    let err = thumbnailer.process(&mut input, &opts).unwrap_err();

    assert!(matches!(
        err.as_core(),
        Some(CoreError::TooWide {
            width: 1280,
            max: 1000
        })
    ));
}

#[rstest]
fn test_not_accepted(thumbnailer: Thumbnailer) {
    let opts = Options::default().accept([mime::JPEG]);
    let mut input = Cursor::new(opaque_png(10, 10));
    let err = thumbnailer.process(&mut input, &opts).unwrap_err();

    assert!(matches!(
        err.as_core(),
        Some(CoreError::NotAccepted { mime: rejected }) if rejected == mime::PNG
    ));
}

#[rstest]
fn test_plain_text_is_unsupported(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(b"just some words\n".to_vec());
    let err = thumbnailer
        .process(&mut input, &Options::default())
        .unwrap_err();

    assert!(matches!(
        err.as_core(),
        Some(CoreError::Unsupported { mime: found }) if found == mime::OCTET_STREAM
    ));
}

#[rstest]
fn test_detect_leaves_input_rewound(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(opaque_png(8, 8));
    let detection = thumbnailer.detect(&mut input, &Options::default()).unwrap();

    assert_eq!(detection.extension, "png");
    let mut rest = Vec::new();
    input.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, opaque_png(8, 8));
}

// ============================================================================
// Audio and video
// ============================================================================

#[test]
fn test_audio_without_cover_art() {
    let thumbnailer = with_media(ScriptedMedia {
        report: audio_report(),
        ..ScriptedMedia::default()
    });
    let mut input = Cursor::new(flac_header());
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert!(processed.thumbnail.is_none());
    assert_eq!(processed.source.mime(), mime::FLAC);
    assert!(processed.source.has_audio);
    assert!(!processed.source.has_video);
    assert_eq!(processed.source.duration, Duration::from_secs(214));
    assert_eq!(processed.source.title, "Track");
    assert_eq!(processed.source.artist, "Band");
}

#[test]
fn test_audio_cover_art() {
    let thumbnailer = with_media(ScriptedMedia {
        report: MediaReport {
            cover_art_stream: Some(1),
            ..audio_report()
        },
        cover_art: Some(opaque_png(300, 300)),
        ..ScriptedMedia::default()
    });
    let mut input = Cursor::new(mp3_header());
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert!(processed.source.has_cover_art);
    let thumb = processed.thumbnail.unwrap();
    assert_eq!(thumb.format, ThumbFormat::Jpeg);
    assert_eq!(thumb.dims, Dims::new(150, 150));
}

#[test]
fn test_broken_audio_cover_art_is_not_an_error() {
    let thumbnailer = with_media(ScriptedMedia {
        report: MediaReport {
            cover_art_stream: Some(1),
            ..audio_report()
        },
        cover_art: Some(b"not a picture".to_vec()),
        ..ScriptedMedia::default()
    });
    let mut input = Cursor::new(flac_header());
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert!(processed.source.has_cover_art);
    assert!(processed.thumbnail.is_none());
}

#[test]
fn test_video_frame() {
    let media = ScriptedMedia {
        report: video_report(),
        ..ScriptedMedia::default()
    };
    let frames = Arc::clone(&media.frames);
    let thumbnailer = with_media(media);
    let mut input = Cursor::new(mp4_header());
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processed.source.mime(), mime::MP4);
    assert_eq!(processed.source.codec, "h264");
    assert_eq!(processed.thumbnail.unwrap().dims, Dims::new(150, 84));
    assert_eq!(frames.load(Ordering::SeqCst), 1);
}

#[test]
fn test_video_with_broken_cover_art_uses_frame() {
    let media = ScriptedMedia {
        report: MediaReport {
            cover_art_stream: Some(2),
            ..video_report()
        },
        cover_art: Some(b"garbage".to_vec()),
        ..ScriptedMedia::default()
    };
    let frames = Arc::clone(&media.frames);
    let thumbnailer = with_media(media);
    let mut input = Cursor::new(mp4_header());
    let thumb = thumbnailer
        .process(&mut input, &Options::default())
        .unwrap()
        .thumbnail
        .unwrap();

    assert_eq!(thumb.dims, Dims::new(150, 84));
    assert_eq!(frames.load(Ordering::SeqCst), 1);
}

#[test]
fn test_video_limits_apply() {
    let thumbnailer = with_media(ScriptedMedia {
        report: video_report(),
        ..ScriptedMedia::default()
    });
    let opts = Options {
        max_source_dims: Dims::new(0, 480),
        ..Options::default()
    };
    let mut input = Cursor::new(mp4_header());
    let err = thumbnailer.process(&mut input, &opts).unwrap_err();

    assert!(matches!(
        err.as_core(),
        Some(CoreError::TooTall { height: 720, .. })
    ));
}

#[rstest]
fn test_media_without_streams(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(flac_header());
    let err = thumbnailer
        .process(&mut input, &Options::default())
        .unwrap_err();

    assert!(matches!(err, ThumbnailError::NoStreams));
}

// ============================================================================
// Extension points
// ============================================================================

struct CountingProcessor {
    calls: AtomicUsize,
}

impl Processor for CountingProcessor {
    fn process(
        &self,
        input: &mut dyn MediaSource,
        source: &mut Source,
        _opts: &Options,
    ) -> glimpse::Result<Option<Thumbnail>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        source.title = format!("{} bytes", data.len());
        Ok(None)
    }
}

#[test]
fn test_processor_override() {
    let mut thumbnailer = with_media(ScriptedMedia::default());
    let processor = Arc::new(CountingProcessor {
        calls: AtomicUsize::new(0),
    });
    assert!(
        thumbnailer
            .register_processor(mime::PNG, processor.clone())
            .is_none()
    );

    let png = opaque_png(20, 20);
    let mut input = Cursor::new(png.clone());
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    assert!(processed.thumbnail.is_none());
    assert_eq!(processed.source.title, format!("{} bytes", png.len()));
}

#[test]
fn test_custom_matcher_and_processor() {
    let mut thumbnailer = with_media(ScriptedMedia::default());
    thumbnailer
        .register_matcher(Box::new(ExactSignature::new(
            "ff",
            "image/x-farbfeld",
            &b"farbfeld"[..],
        )))
        .unwrap();

    let mut input = Cursor::new(b"farbfeld\x00\x00\x00\x01\x00\x00\x00\x01".to_vec());
    let err = thumbnailer
        .process(&mut input, &Options::default())
        .unwrap_err();
    assert!(matches!(
        err.as_core(),
        Some(CoreError::Unsupported { mime: found }) if found == "image/x-farbfeld"
    ));

    thumbnailer.register_processor(
        "image/x-farbfeld",
        Arc::new(CountingProcessor {
            calls: AtomicUsize::new(0),
        }),
    );
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();
    assert_eq!(processed.source.extension(), "ff");
    assert_eq!(processed.source.title, "16 bytes");
}

#[test]
fn test_duplicate_signature_is_rejected() {
    let mut thumbnailer = with_media(ScriptedMedia::default());
    let err = thumbnailer
        .register_matcher(Box::new(ExactSignature::new(
            "png2",
            "image/x-other-png",
            &b"\x89PNG\x0D\x0A\x1A\x0A"[..],
        )))
        .unwrap_err();

    assert!(matches!(
        err.as_core(),
        Some(CoreError::DuplicateSignature { existing, .. }) if existing == mime::PNG
    ));
}

#[test]
fn test_shared_between_threads() {
    let thumbnailer = Arc::new(with_media(ScriptedMedia::default()));
    let png = opaque_png(500, 250);

    std::thread::scope(|s| {
        for _ in 0..4 {
            let thumbnailer = Arc::clone(&thumbnailer);
            let png = png.clone();
            s.spawn(move || {
                let mut input = Cursor::new(png);
                let thumb = thumbnailer
                    .process(&mut input, &Options::default())
                    .unwrap()
                    .thumbnail
                    .unwrap();
                assert_eq!(thumb.dims, Dims::new(150, 75));
            });
        }
    });
}

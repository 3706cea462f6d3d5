//! Archive tests
//!
//! Comic-book detection, member extraction limits and nested documents,
//! using zip fixtures built in memory.

use glimpse::archive::{ArchiveReader, ZIP_EXTRACT_FACTOR, ZipScanner};
use glimpse::{
    CoreError, MediaSource, Options, Processor, Source, ThumbFormat, Thumbnail, Thumbnailer,
    ThumbnailError, mime,
};
use image::{ImageFormat, Rgba, RgbaImage};
use rstest::*;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

// ============================================================================
// Fixtures
// ============================================================================

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([30, 120, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A zip with `images` pages followed by `others` text entries.
fn comic_zip(images: usize, others: usize) -> Vec<u8> {
    let page = png(64, 96);
    let names: Vec<(String, Vec<u8>)> = (0..images)
        .map(|i| (format!("page{i:03}.png"), page.clone()))
        .chain((0..others).map(|i| (format!("notes{i:03}.txt"), b"words".to_vec())))
        .collect();
    let entries: Vec<(&str, &[u8])> = names
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();
    build_zip(&entries)
}

#[fixture]
fn thumbnailer() -> Thumbnailer {
    Thumbnailer::builder().fallback_probe(None).build()
}

// ============================================================================
// Scanning
// ============================================================================

#[rstest]
#[case(9, 1, true)]
#[case(8, 2, false)]
#[case(3, 97, false)]
#[case(12, 0, true)]
fn test_comic_detection(#[case] images: usize, #[case] others: usize, #[case] comic: bool) {
    let mut input = Cursor::new(comic_zip(images, others));
    let mut scanner = ZipScanner::open(&mut input).unwrap();
    let scan = scanner.scan().unwrap();

    assert_eq!(scan.total, images + others);
    assert_eq!(scan.is_comic(), comic);
    assert_eq!(
        scan.candidate.map(|entry| entry.name).as_deref(),
        Some("page000.png")
    );
}

#[rstest]
fn test_comic_zip_is_reported_as_cbz(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(comic_zip(9, 1));
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processed.source.mime(), mime::CBZ);
    assert_eq!(processed.source.extension(), "cbz");
    let thumb = processed.thumbnail.expect("first page thumbnail");
    assert_eq!(thumb.format, ThumbFormat::Jpeg);
    assert_eq!((thumb.dims.width, thumb.dims.height), (64, 96));
}

#[rstest]
fn test_plain_zip_keeps_zip_type(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(comic_zip(3, 97));
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processed.source.mime(), mime::ZIP);
    assert!(processed.thumbnail.is_some());
}

#[rstest]
fn test_zip_without_images_has_no_thumbnail(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(build_zip(&[("a.txt", b"a"), ("b.txt", b"b")]));
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processed.source.mime(), mime::ZIP);
    assert!(processed.thumbnail.is_none());
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_decompression_bomb_is_truncated() {
    let zeros = vec![0u8; 10 << 20];
    let bytes = build_zip(&[("bomb.png", &zeros)]);
    let container = bytes.len() as u64;
    assert!(container * ZIP_EXTRACT_FACTOR < zeros.len() as u64);

    let mut input = Cursor::new(bytes);
    let mut scanner = ZipScanner::open(&mut input).unwrap();
    assert_eq!(scanner.limit(), container * ZIP_EXTRACT_FACTOR);

    let scan = scanner.scan().unwrap();
    let entry = scan.candidate.unwrap();
    let mut member = scanner.extract(&entry).unwrap();

    let mut extracted = Vec::new();
    member.read_to_end(&mut extracted).unwrap();
    assert_eq!(extracted.len() as u64, container * ZIP_EXTRACT_FACTOR);
}

#[rstest]
fn test_member_failure_is_wrapped(thumbnailer: Thumbnailer) {
    let mut input = Cursor::new(build_zip(&[("page.png", b"this is not an image")]));
    let err = thumbnailer
        .process(&mut input, &Options::default())
        .unwrap_err();

    assert!(matches!(err, ThumbnailError::ArchiveMember { .. }));
    assert!(matches!(err.as_core(), Some(CoreError::Unsupported { .. })));
}

#[rstest]
fn test_member_ignores_accepted_types(thumbnailer: Thumbnailer) {
    let opts = Options::default().accept([mime::ZIP]);
    let mut input = Cursor::new(comic_zip(1, 0));
    let processed = thumbnailer.process(&mut input, &opts).unwrap();

    assert_eq!(processed.source.mime(), mime::CBZ);
    assert!(processed.thumbnail.is_some());
}

#[rstest]
fn test_nesting_is_bounded(thumbnailer: Thumbnailer) {
    let page = png(16, 16);
    let level2 = build_zip(&[("a.png", &page)]);
    let level1 = build_zip(&[("a.png", &level2)]);
    let level0 = build_zip(&[("a.png", &level1)]);

    let mut input = Cursor::new(level1.clone());
    assert!(
        thumbnailer
            .process(&mut input, &Options::default())
            .unwrap()
            .thumbnail
            .is_some()
    );

    let mut input = Cursor::new(level0);
    let err = thumbnailer
        .process(&mut input, &Options::default())
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        ThumbnailError::NestingTooDeep { .. }
    ));
}

// ============================================================================
// Processor overrides
// ============================================================================

/// Records the size of whatever it is handed.
#[derive(Default)]
struct WholeArchive {
    calls: AtomicUsize,
}

impl Processor for WholeArchive {
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

#[rstest]
fn test_comic_type_routes_to_registered_processor(mut thumbnailer: Thumbnailer) {
    let processor = Arc::new(WholeArchive::default());
    thumbnailer.register_processor(mime::CBZ, processor.clone());

    let bytes = comic_zip(9, 1);
    let mut input = Cursor::new(bytes.clone());
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(processed.source.mime(), mime::CBZ);
    assert_eq!(processed.source.title, format!("{} bytes", bytes.len()));
    assert!(processed.thumbnail.is_none());
}

#[rstest]
fn test_plain_zip_skips_comic_processor(mut thumbnailer: Thumbnailer) {
    let processor = Arc::new(WholeArchive::default());
    thumbnailer.register_processor(mime::CBZ, processor.clone());

    let mut input = Cursor::new(comic_zip(3, 97));
    let processed = thumbnailer.process(&mut input, &Options::default()).unwrap();

    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(processed.source.mime(), mime::ZIP);
    assert!(processed.thumbnail.is_some());
}

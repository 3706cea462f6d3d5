//! Still-image decoding, resampling and encoding.

use crate::error::{Result, ThumbnailError};
use crate::options::{Options, ToolConfig};
use crate::pipeline::{Stage, run_command};
use crate::source::{RasterFrame, ThumbFormat, Thumbnail};
use bytes::Bytes;
use glimpse_core::{BufferPool, Dims, mime, sniff_dimensions};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageError, ImageReader,
    RgbaImage,
};
use std::io::Cursor;
use tracing::{debug, warn};

/// Resolution PDF pages are rasterized at.
pub const PDF_DPI: u32 = 96;

/// Decodes and encodes still images.
pub trait ImageToolkit: Send + Sync {
    /// Dimensions read from the header, without decoding pixels.
    ///
    /// Returns unknown (zero) dimensions for formats whose raster size is
    /// only known after rendering.
    fn dimensions(&self, data: &[u8], mime: &str) -> Result<Dims>;

    /// Decodes to RGBA with any EXIF orientation applied.
    fn decode(&self, data: &[u8], mime: &str) -> Result<RasterFrame>;

    /// Scales `frame` to `target` and encodes it.
    fn encode(&self, frame: RasterFrame, target: Dims, opts: &Options) -> Result<Thumbnail>;
}

/// [`ImageToolkit`] built on the `image` crate.
///
/// PDF pages go through Ghostscript and Photoshop documents through ffmpeg
/// before decoding.
#[derive(Debug, Clone, Default)]
pub struct NativeImageToolkit {
    tools: ToolConfig,
}

impl NativeImageToolkit {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    fn rasterize(&self, data: &[u8], mime_type: &str) -> Result<Option<RasterFrame>> {
        let stage = match mime_type {
            mime::PDF => Stage::new(self.tools.gs.as_str())
                .args([
                    "-q",
                    "-dSAFER",
                    "-dBATCH",
                    "-dNOPAUSE",
                    "-sDEVICE=pngalpha",
                    "-dFirstPage=1",
                    "-dLastPage=1",
                ])
                .arg(format!("-r{PDF_DPI}"))
                .args(["-sOutputFile=-", "-"]),
            mime::PSD => Stage::new(self.tools.ffmpeg.as_str()).args([
                "-v",
                "error",
                "-f",
                "psd_pipe",
                "-i",
                "-",
                "-frames:v",
                "1",
                "-c:v",
                "png",
                "-f",
                "image2pipe",
                "-",
            ]),
            _ => return Ok(None),
        };
        debug!(mime = mime_type, program = stage.program(), "rasterizing");
        let png = run_command(&mut Cursor::new(data), stage, BufferPool::global())?;
        decode_native(&png).map(Some)
    }

    fn quantize(&self, png: Vec<u8>, opts: &Options) -> Vec<u8> {
        let Some(range) = opts.png_quantize else {
            return png;
        };
        let stage = Stage::new(self.tools.pngquant.as_str())
            .arg(format!("--quality={}-{}", range.min_quality, range.max_quality))
            .args(["--speed", "4", "-"]);
        let quantized = run_command(&mut Cursor::new(&png), stage, BufferPool::global());
        match quantized {
            Ok(smaller) if !smaller.is_empty() && smaller.len() < png.len() => smaller.into_vec(),
            Ok(_) => png,
            Err(e) => {
                warn!(error = %e, "pngquant failed, keeping lossless PNG");
                png
            }
        }
    }
}

impl ImageToolkit for NativeImageToolkit {
    fn dimensions(&self, data: &[u8], mime_type: &str) -> Result<Dims> {
        if mime_type == mime::PDF {
            return Ok(Dims::default());
        }
        if let Some(dims) = sniff_dimensions(data) {
            return Ok(dims);
        }
        let (width, height) = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Dims::new(width, height))
    }

    fn decode(&self, data: &[u8], mime_type: &str) -> Result<RasterFrame> {
        if let Some(frame) = self.rasterize(data, mime_type)? {
            return Ok(frame);
        }
        decode_native(data)
    }

    fn encode(&self, frame: RasterFrame, target: Dims, opts: &Options) -> Result<Thumbnail> {
        let opaque = frame.is_opaque();
        let source = RgbaImage::from_raw(frame.dims.width, frame.dims.height, frame.pixels)
            .ok_or_else(|| {
                ImageError::Parameter(ParameterError::from_kind(
                    ParameterErrorKind::DimensionMismatch,
                ))
            })?;
        let resized = if target == frame.dims {
            source
        } else {
            imageops::resize(&source, target.width, target.height, FilterType::Lanczos3)
        };
        let dims = Dims::new(resized.width(), resized.height());

        let mut out = Vec::new();
        let format = if opaque {
            let rgb = DynamicImage::ImageRgba8(resized).into_rgb8();
            JpegEncoder::new_with_quality(&mut out, opts.jpeg_quality()).write_image(
                rgb.as_raw(),
                dims.width,
                dims.height,
                ExtendedColorType::Rgb8,
            )?;
            ThumbFormat::Jpeg
        } else {
            PngEncoder::new(&mut out).write_image(
                resized.as_raw(),
                dims.width,
                dims.height,
                ExtendedColorType::Rgba8,
            )?;
            out = self.quantize(out, opts);
            ThumbFormat::Png
        };

        Ok(Thumbnail {
            data: Bytes::from(out),
            format,
            dims,
        })
    }
}

fn decode_native(data: &[u8]) -> Result<RasterFrame> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    let rgba = image.into_rgba8();
    let dims = Dims::new(rgba.width(), rgba.height());
    if dims.is_unknown() {
        return Err(ThumbnailError::Image(ImageError::Parameter(
            ParameterError::from_kind(ParameterErrorKind::DimensionMismatch),
        )));
    }
    Ok(RasterFrame {
        pixels: rgba.into_raw(),
        dims,
    })
}

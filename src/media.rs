//! Audio and video through an external multimedia toolkit.
//!
//! The toolkit is consumed only through [`MediaToolkit`] and
//! [`MediaContext`]: open a stream and report what it holds, hand out the
//! embedded cover art, and extract one representative frame at a given size.

use crate::error::{Result, ThumbnailError};
use crate::options::ToolConfig;
use crate::pipeline::{Stage, run_command};
use crate::probe::MediaReport;
use crate::source::RasterFrame;
use glimpse_core::{BufferPool, Dims, MediaSource};
use std::io::{self, SeekFrom};
use tempfile::NamedTempFile;
use tracing::debug;

/// Candidate frames the representative-frame filter picks from.
pub const FRAME_CANDIDATES: u32 = 10;

/// Opens media streams.
pub trait MediaToolkit: Send + Sync {
    /// Inspects `input`.
    ///
    /// # Errors
    ///
    /// [`ThumbnailError::NoStreams`] when the container holds neither audio,
    /// video nor an attached picture.
    fn open(&self, input: &mut dyn MediaSource) -> Result<Box<dyn MediaContext>>;
}

/// An opened media input. Dropping it releases everything it holds.
pub trait MediaContext {
    fn report(&self) -> &MediaReport;

    /// Encoded bytes of the embedded cover art, if any.
    fn cover_art(&mut self) -> Result<Option<Vec<u8>>>;

    /// One representative frame of the best video stream scaled to `dims`.
    fn frame(&mut self, dims: Dims) -> Result<RasterFrame>;
}

/// [`MediaToolkit`] backed by the `ffprobe` and `ffmpeg` programs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    tools: ToolConfig,
}

impl FfmpegToolkit {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }
}

impl MediaToolkit for FfmpegToolkit {
    fn open(&self, input: &mut dyn MediaSource) -> Result<Box<dyn MediaContext>> {
        // Containers with a trailing index need random access, which stdin
        // cannot give the toolkit.
        let mut spool = NamedTempFile::new()?;
        input.seek(SeekFrom::Start(0))?;
        io::copy(input, spool.as_file_mut())?;

        let probe = Stage::new(self.tools.ffprobe.as_str())
            .args(["-v", "error", "-of", "json", "-show_format", "-show_streams"])
            .arg(spool.path());
        let json = run_command(&mut io::empty(), probe, BufferPool::global())?;
        let report = MediaReport::from_ffprobe_json(&json)
            .map_err(|e| ThumbnailError::Probe(e.to_string()))?;
        drop(json);

        if !report.has_streams() {
            return Err(ThumbnailError::NoStreams);
        }
        debug!(
            codec = %report.codec,
            has_audio = report.has_audio,
            has_video = report.has_video,
            "opened media"
        );

        Ok(Box::new(FfmpegContext {
            ffmpeg: self.tools.ffmpeg.clone(),
            spool,
            report,
        }))
    }
}

struct FfmpegContext {
    ffmpeg: String,
    spool: NamedTempFile,
    report: MediaReport,
}

impl FfmpegContext {
    fn stage(&self, stream: usize) -> Stage {
        Stage::new(self.ffmpeg.as_str())
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(self.spool.path())
            .arg("-map")
            .arg(format!("0:{stream}"))
    }
}

impl MediaContext for FfmpegContext {
    fn report(&self) -> &MediaReport {
        &self.report
    }

    fn cover_art(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(stream) = self.report.cover_art_stream else {
            return Ok(None);
        };
        let stage = self
            .stage(stream)
            .args(["-c", "copy", "-frames:v", "1", "-f", "image2pipe", "-"]);
        let art = run_command(&mut io::empty(), stage, BufferPool::global())?;
        if art.is_empty() {
            return Ok(None);
        }
        Ok(Some(art.into_vec()))
    }

    fn frame(&mut self, dims: Dims) -> Result<RasterFrame> {
        let Some(stream) = self.report.video_stream else {
            return Err(ThumbnailError::GetFrame("no video stream".into()));
        };
        let stage = self.stage(stream).args([
            "-vf".to_string(),
            format!("thumbnail={FRAME_CANDIDATES},scale={}:{}", dims.width, dims.height),
            "-frames:v".into(),
            "1".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "-".into(),
        ]);
        let pixels = run_command(&mut io::empty(), stage, BufferPool::global())
            .map_err(|e| ThumbnailError::GetFrame(e.to_string()))?;

        let expected = RasterFrame::byte_len(dims);
        if pixels.len() != expected {
            return Err(ThumbnailError::GetFrame(format!(
                "expected {expected} bytes of {dims} RGBA, got {}",
                pixels.len()
            )));
        }
        Ok(RasterFrame {
            pixels: pixels.into_vec(),
            dims,
        })
    }
}

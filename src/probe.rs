//! Media stream reports from ffprobe.

use crate::pipeline::{Stage, run_command};
use glimpse_core::{BufferPool, Dims, FallbackProbe, MediaSource, mime};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// What the media toolkit found in a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaReport {
    pub has_audio: bool,
    /// True only for real video streams. Attached pictures do not count.
    pub has_video: bool,
    pub duration: Duration,
    /// Codec of the best stream: the first video stream, else the first audio.
    pub codec: String,
    pub dims: Dims,
    pub video_stream: Option<usize>,
    pub cover_art_stream: Option<usize>,
    pub title: String,
    pub artist: String,
}

impl MediaReport {
    /// Parses `ffprobe -of json -show_format -show_streams` output.
    pub fn from_ffprobe_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        let output: FfprobeOutput = serde_json::from_slice(json)?;
        Ok(Self::from_output(output))
    }

    fn from_output(output: FfprobeOutput) -> Self {
        let mut report = Self::default();
        let mut audio_codec = None;

        for stream in &output.streams {
            match stream.codec_type.as_deref() {
                Some("video") if stream.disposition.attached_pic != 0 => {
                    report.cover_art_stream.get_or_insert(stream.index);
                }
                Some("video") => {
                    report.has_video = true;
                    if report.video_stream.is_none() {
                        report.video_stream = Some(stream.index);
                        report.dims = Dims::new(
                            stream.width.unwrap_or_default(),
                            stream.height.unwrap_or_default(),
                        );
                        report.codec = stream.codec_name.clone().unwrap_or_default();
                    }
                }
                Some("audio") => {
                    report.has_audio = true;
                    audio_codec.get_or_insert_with(|| stream.codec_name.clone().unwrap_or_default());
                }
                _ => {}
            }
        }
        if !report.has_video {
            report.codec = audio_codec.unwrap_or_default();
        }

        if let Some(format) = output.format {
            report.duration = format
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or_default();
            report.title = tag(&format.tags, "title");
            report.artist = tag(&format.tags, "artist");
        }
        report
    }

    pub fn has_streams(&self) -> bool {
        self.has_audio || self.has_video || self.cover_art_stream.is_some()
    }
}

/// Tag keys differ in case between containers (ID3 vs Vorbis comments).
fn tag(tags: &HashMap<String, String>, key: &str) -> String {
    tags.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().to_string())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    disposition: Disposition,
}

#[derive(Debug, Default, Deserialize)]
struct Disposition {
    #[serde(default)]
    attached_pic: u8,
}

/// Confirms headerless MP3 streams by asking ffprobe for the demuxer name.
#[derive(Debug, Clone)]
pub struct FfprobeMp3Probe {
    ffprobe: String,
}

impl FfprobeMp3Probe {
    pub fn new(ffprobe: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

impl FallbackProbe for FfprobeMp3Probe {
    fn mime(&self) -> &str {
        mime::MP3
    }

    fn extension(&self) -> &str {
        "mp3"
    }

    fn probe(&self, stream: &mut dyn MediaSource) -> bool {
        let stage = Stage::new(self.ffprobe.as_str()).args([
            "-hide_banner",
            "-v",
            "fatal",
            "-of",
            "compact",
            "-show_entries",
            "format=format_name",
            "-",
        ]);
        match run_command(stream, stage, BufferPool::global()) {
            Ok(out) => out.trim_ascii() == b"format|format_name=mp3",
            Err(e) => {
                debug!(error = %e, "mp3 probe failed");
                false
            }
        }
    }
}

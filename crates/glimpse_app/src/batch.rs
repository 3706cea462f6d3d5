use glimpse::{Options, Source, Thumbnail, Thumbnailer};
use humansize::{BINARY, format_size};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One output line per input file.
#[derive(Debug, Serialize)]
pub struct Report {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct ThumbnailReport {
    pub path: PathBuf,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size: String,
}

/// Processes every input in parallel. Reports come back in input order.
pub fn run(
    thumbnailer: &Thumbnailer,
    inputs: &[PathBuf],
    options: &Options,
    out_dir: Option<&Path>,
) -> Vec<Report> {
    inputs
        .par_iter()
        .map(|path| process_one(thumbnailer, path, options, out_dir))
        .collect()
}

pub fn process_one(
    thumbnailer: &Thumbnailer,
    path: &Path,
    options: &Options,
    out_dir: Option<&Path>,
) -> Report {
    let mut report = Report {
        path: path.to_path_buf(),
        source: None,
        thumbnail: None,
        error: None,
    };

    let processed = match thumbnailer.process_path(path, options) {
        Ok(processed) => processed,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "processing failed");
            report.error = Some(e.to_string());
            return report;
        }
    };
    report.source = Some(processed.source);

    if let (Some(thumb), Some(dir)) = (processed.thumbnail, out_dir) {
        let target = thumbnail_path(dir, path, &thumb);
        match std::fs::write(&target, &thumb.data) {
            Ok(()) => {
                info!(
                    path = %target.display(),
                    size = %format_size(thumb.data.len(), BINARY),
                    "wrote thumbnail"
                );
                report.thumbnail = Some(ThumbnailReport {
                    path: target,
                    format: thumb.format.to_string(),
                    width: thumb.dims.width,
                    height: thumb.dims.height,
                    size: format_size(thumb.data.len(), BINARY),
                });
            }
            Err(e) => {
                report.error = Some(format!("Failed to write {}: {e}", target.display()));
            }
        }
    }
    report
}

/// `<out_dir>/<input stem>.thumb.<jpg|png>`
pub fn thumbnail_path(out_dir: &Path, input: &Path, thumb: &Thumbnail) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    out_dir.join(format!("{stem}.thumb.{}", thumb.format.extension()))
}

//! Glimpse - thumbnails for images, audio, video and comic archives.
//!
//! Prints one JSON line per input describing what was found, and writes
//! thumbnails to `--out-dir` when given.

mod batch;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use glimpse::Thumbnailer;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use config::{Config, Overrides};

#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files to process
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON file with `tools` and `options` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory thumbnails are written to
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Thumbnail bounding box width
    #[arg(long)]
    width: Option<u32>,

    /// Thumbnail bounding box height
    #[arg(long)]
    height: Option<u32>,

    /// Reject sources wider than this
    #[arg(long)]
    max_width: Option<u32>,

    /// Reject sources taller than this
    #[arg(long)]
    max_height: Option<u32>,

    /// Only process these MIME types (repeatable)
    #[arg(long = "accept", value_name = "MIME")]
    accept: Vec<String>,

    /// JPEG quality, 1-100
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let overrides = Overrides {
        thumb_width: args.width,
        thumb_height: args.height,
        max_width: args.max_width,
        max_height: args.max_height,
        quality: args.quality,
        accept: args.accept.clone(),
    };
    let options = overrides.apply(config.options);

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let thumbnailer = Thumbnailer::builder().tools(config.tools).build();
    let reports = batch::run(&thumbnailer, &args.inputs, &options, args.out_dir.as_deref());

    let mut stdout = std::io::stdout().lock();
    let mut failures = 0usize;
    for report in &reports {
        failures += usize::from(report.is_failure());
        serde_json::to_writer(&mut stdout, report)?;
        writeln!(stdout)?;
    }

    tracing::info!(total = reports.len(), failures, "done");
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

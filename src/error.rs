use glimpse_core::CoreError;
use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Failure of one stage of a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("stage {index} ({program}): failed to start: {source}")]
    Spawn {
        index: usize,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("stage {index} ({program}): {status}: {stderr}")]
    Stage {
        index: usize,
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("stage {index} ({program}): I/O error: {source}")]
    Io {
        index: usize,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("pipeline has no stages")]
    Empty,
}

impl PipelineError {
    /// Index of the failing stage, if a stage failed.
    pub fn stage(&self) -> Option<usize> {
        match self {
            Self::Spawn { index, .. } | Self::Stage { index, .. } | Self::Io { index, .. } => {
                Some(*index)
            }
            Self::Empty => None,
        }
    }

    /// Diagnostic text the failing stage wrote to stderr.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Stage { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("no audio or video streams")]
    NoStreams,

    #[error("failed to get frame: {0}")]
    GetFrame(String),

    #[error("media probe failed: {0}")]
    Probe(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("cover art: {source}")]
    CoverArt {
        #[source]
        source: Box<ThumbnailError>,
    },

    #[error("archive member: {source}")]
    ArchiveMember {
        #[source]
        source: Box<ThumbnailError>,
    },

    #[error("documents nested deeper than {max} levels")]
    NestingTooDeep { max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ThumbnailError {
    pub fn cover_art(source: ThumbnailError) -> Self {
        Self::CoverArt {
            source: Box::new(source),
        }
    }

    pub fn archive_member(source: ThumbnailError) -> Self {
        Self::ArchiveMember {
            source: Box::new(source),
        }
    }

    /// Innermost error, looking through cover-art and archive wrappers.
    pub fn root_cause(&self) -> &ThumbnailError {
        match self {
            Self::CoverArt { source } | Self::ArchiveMember { source } => source.root_cause(),
            other => other,
        }
    }

    /// The wrapped classification or dimension error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self.root_cause() {
            Self::Core(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;

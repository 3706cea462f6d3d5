use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported MIME type: {mime}")]
    Unsupported { mime: String },

    #[error("MIME type not accepted: {mime}")]
    NotAccepted { mime: String },

    #[error("invalid image: too wide ({width} > {max})")]
    TooWide { width: u32, max: u32 },

    #[error("invalid image: too tall ({height} > {max})")]
    TooTall { height: u32, max: u32 },

    #[error("signature for {mime} duplicates the one registered for {existing}")]
    DuplicateSignature { mime: String, existing: String },
}

impl CoreError {
    /// Whether the input was rejected by classification rather than failing
    /// while being read.
    #[must_use]
    pub fn is_classification(&self) -> bool {
        matches!(self, Self::Unsupported { .. } | Self::NotAccepted { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

pub mod classifier;
pub mod dims;
mod error;
pub mod formats;
pub mod pool;
pub mod signatures;
mod traits;
mod types;

pub use classifier::{FallbackProbe, FormatClassifier, MatcherSet, is_accepted};
pub use dims::{SourceLimit, plan_thumbnail};
pub use error::{CoreError, Result};
pub use pool::{BufferPool, PooledBuffer};
pub use signatures::{ExactSignature, FnMatcher, MaskedSignature, SNIFF_SIZE};
pub use traits::{Matcher, MediaSource};
pub use types::{DEFAULT_THUMB_EDGE, Detection, Dims, MediaKind, mime};

/// Reads image dimensions from a header without decoding pixels.
pub fn sniff_dimensions(data: &[u8]) -> Option<Dims> {
    let size = imagesize::blob_size(data).ok()?;
    Some(Dims::new(
        u32::try_from(size.width).ok()?,
        u32::try_from(size.height).ok()?,
    ))
}

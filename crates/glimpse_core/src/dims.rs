//! Thumbnail dimension planning.

use crate::error::{CoreError, Result};
use crate::types::Dims;

/// Whether the source size limit applies to an input.
///
/// Vector inputs such as PDF are rasterized at whatever size the renderer
/// picks, so their nominal dimensions are never checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceLimit {
    #[default]
    Enforce,
    PassThrough,
}

/// Computes thumbnail dimensions for a source image.
///
/// # Arguments
///
/// * `source` - Decoded source dimensions
/// * `max_source` - Largest accepted source; a zero axis is unbounded
/// * `target` - Bounding box of the thumbnail; a zero axis means 150
/// * `limit` - Whether `max_source` is enforced
///
/// # Returns
///
/// The source itself when it already fits, otherwise the largest size
/// within `target` that keeps the aspect ratio, with each axis at least 1.
///
/// # Errors
///
/// [`CoreError::TooWide`] when the width exceeds its bound, checked before
/// [`CoreError::TooTall`].
pub fn plan_thumbnail(
    source: Dims,
    max_source: Dims,
    target: Dims,
    limit: SourceLimit,
) -> Result<Dims> {
    if limit == SourceLimit::Enforce {
        check_source(source, max_source)?;
    }

    let target = target.or_default_thumb();
    if source.width <= target.width && source.height <= target.height {
        return Ok(source);
    }

    let (sw, sh) = (u64::from(source.width), u64::from(source.height));
    let (tw, th) = (u64::from(target.width), u64::from(target.height));

    // sw/sh >= tw/th, cross-multiplied to stay in integers
    let planned = if sw * th >= sh * tw {
        Dims::new(target.width, scale(sh, tw, sw))
    } else {
        Dims::new(scale(sw, th, sh), target.height)
    };
    Ok(planned)
}

fn check_source(source: Dims, max_source: Dims) -> Result<()> {
    if max_source.width != 0 && source.width > max_source.width {
        return Err(CoreError::TooWide {
            width: source.width,
            max: max_source.width,
        });
    }
    if max_source.height != 0 && source.height > max_source.height {
        return Err(CoreError::TooTall {
            height: source.height,
            max: max_source.height,
        });
    }
    Ok(())
}

/// `value * numerator / denominator`, rounded down and clamped to 1.
fn scale(value: u64, numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 1;
    }
    let scaled = value * numerator / denominator;
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

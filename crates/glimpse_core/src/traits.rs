//! Core traits defining the seams between classification and its inputs.
//!
//! Matchers and input streams are expressed as traits so embedders can
//! supply their own signatures and their own seekable byte sources.

use std::io::{Read, Seek};

/// A seekable byte stream that can be handed between threads.
///
/// Anything that is `Read + Seek + Send` qualifies: files, `Cursor`s over
/// in-memory buffers, memory maps, or custom readers.
///
/// Cancellation is not part of this contract. A caller that needs to abort an
/// in-flight call must close or interrupt the underlying stream itself.
pub trait MediaSource: Read + Seek + Send {}

impl<T: Read + Seek + Send + ?Sized> MediaSource for T {}

/// Format signature rule used by the classifier.
///
/// Implementations are immutable and stateless. The classifier hands each
/// matcher a fixed-size prefix of the input and, for matchers that need more
/// context, the stream itself.
///
/// # Thread Safety
///
/// Matchers are shared by every processing call, so they must be
/// `Send + Sync`.
///
/// # Example
///
/// ```ignore
/// use glimpse_core::{Matcher, MediaSource};
///
/// struct Farbfeld;
///
/// impl Matcher for Farbfeld {
///     fn matches(&self, prefix: &[u8], _stream: &mut dyn MediaSource) -> bool {
///         prefix.starts_with(b"farbfeld")
///     }
///
///     fn mime(&self) -> &str {
///         "image/x-farbfeld"
///     }
///
///     fn extension(&self) -> &str {
///         "ff"
///     }
/// }
/// ```
pub trait Matcher: Send + Sync {
    /// Tests the input against this rule.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Up to the first [`SNIFF_SIZE`](crate::SNIFF_SIZE) bytes
    ///   of the input; shorter when the input itself is shorter
    /// * `stream` - The whole input. Implementations may seek and read freely;
    ///   the classifier rewinds it before the next matcher runs
    fn matches(&self, prefix: &[u8], stream: &mut dyn MediaSource) -> bool;

    /// MIME type reported when this rule matches.
    fn mime(&self) -> &str;

    /// Canonical file extension, without the leading dot.
    fn extension(&self) -> &str;

    /// Fixed byte signature and optional mask, for byte-pattern rules.
    ///
    /// Used to reject registrations that could never fire because an
    /// identical pattern is already registered.
    fn signature(&self) -> Option<(&[u8], Option<&[u8]>)> {
        None
    }
}

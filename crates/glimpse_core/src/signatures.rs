use crate::traits::{Matcher, MediaSource};
use std::borrow::Cow;
use std::fmt;

/// Number of leading bytes handed to every matcher.
pub const SNIFF_SIZE: usize = 4096;

/// Matches when the input starts with a fixed byte sequence.
#[derive(Debug, Clone)]
pub struct ExactSignature {
    mime: Cow<'static, str>,
    extension: Cow<'static, str>,
    signature: Cow<'static, [u8]>,
}

impl ExactSignature {
    pub fn new(
        extension: impl Into<Cow<'static, str>>,
        mime: impl Into<Cow<'static, str>>,
        signature: impl Into<Cow<'static, [u8]>>,
    ) -> Self {
        Self {
            mime: mime.into(),
            extension: extension.into(),
            signature: signature.into(),
        }
    }
}

impl Matcher for ExactSignature {
    #[inline]
    fn matches(&self, prefix: &[u8], _stream: &mut dyn MediaSource) -> bool {
        prefix.starts_with(self.signature.as_ref())
    }

    fn mime(&self) -> &str {
        &self.mime
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn signature(&self) -> Option<(&[u8], Option<&[u8]>)> {
        Some((self.signature.as_ref(), None))
    }
}

/// Matches when `prefix[i] & mask[i] == signature[i]` for every mask byte.
///
/// Zero mask bytes mark "don't care" positions, such as the size field of a
/// RIFF header.
#[derive(Debug, Clone)]
pub struct MaskedSignature {
    exact: ExactSignature,
    mask: Cow<'static, [u8]>,
}

impl MaskedSignature {
    /// # Panics
    ///
    /// Panics if `signature` and `mask` differ in length.
    pub fn new(
        extension: impl Into<Cow<'static, str>>,
        mime: impl Into<Cow<'static, str>>,
        signature: impl Into<Cow<'static, [u8]>>,
        mask: impl Into<Cow<'static, [u8]>>,
    ) -> Self {
        let exact = ExactSignature::new(extension, mime, signature);
        let mask = mask.into();
        assert_eq!(
            exact.signature.len(),
            mask.len(),
            "Signature and mask must have the same length"
        );
        Self { exact, mask }
    }
}

impl Matcher for MaskedSignature {
    fn matches(&self, prefix: &[u8], _stream: &mut dyn MediaSource) -> bool {
        if prefix.len() < self.mask.len() {
            return false;
        }
        prefix
            .iter()
            .zip(self.mask.iter())
            .zip(self.exact.signature.iter())
            .all(|((&data, &mask), &sig)| data & mask == sig)
    }

    fn mime(&self) -> &str {
        &self.exact.mime
    }

    fn extension(&self) -> &str {
        &self.exact.extension
    }

    fn signature(&self) -> Option<(&[u8], Option<&[u8]>)> {
        Some((self.exact.signature.as_ref(), Some(self.mask.as_ref())))
    }
}

type MatchFn = dyn Fn(&[u8], &mut dyn MediaSource) -> bool + Send + Sync;

/// Matches with an arbitrary predicate.
///
/// Used for structurally verified formats and for formats with no magic
/// number at all.
pub struct FnMatcher {
    mime: Cow<'static, str>,
    extension: Cow<'static, str>,
    predicate: Box<MatchFn>,
}

impl FnMatcher {
    pub fn new<F>(
        mime: impl Into<Cow<'static, str>>,
        extension: impl Into<Cow<'static, str>>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&[u8], &mut dyn MediaSource) -> bool + Send + Sync + 'static,
    {
        Self {
            mime: mime.into(),
            extension: extension.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl fmt::Debug for FnMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMatcher")
            .field("mime", &self.mime)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl Matcher for FnMatcher {
    fn matches(&self, prefix: &[u8], stream: &mut dyn MediaSource) -> bool {
        (self.predicate)(prefix, stream)
    }

    fn mime(&self) -> &str {
        &self.mime
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}

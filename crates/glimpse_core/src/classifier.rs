//! Two-phase format classification.
//!
//! The cheap phase runs every registered [`Matcher`] over a fixed-size prefix
//! of the input. Only when nothing fires does the expensive phase hand the
//! whole stream to a [`FallbackProbe`], for formats without a reliable magic
//! number.

use crate::error::{CoreError, Result};
use crate::formats::builtin_matchers;
use crate::pool::BufferPool;
use crate::signatures::SNIFF_SIZE;
use crate::traits::{Matcher, MediaSource};
use crate::types::{mime, Detection};
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, SeekFrom};
use tracing::debug;

/// Last-resort detector consulted when no signature matched.
pub trait FallbackProbe: Send + Sync {
    /// MIME type this probe can confirm. The probe is skipped when the
    /// caller's acceptance filter excludes it.
    fn mime(&self) -> &str;

    fn extension(&self) -> &str;

    /// Inspects the whole stream. Failures to run the probe count as "no".
    fn probe(&self, stream: &mut dyn MediaSource) -> bool;
}

/// Ordered, append-only list of signature rules.
///
/// Built once and then shared read-only by every classification. Appending
/// needs `&mut self`, so the borrow checker keeps registration apart from
/// in-flight matching.
pub struct MatcherSet {
    matchers: Vec<Box<dyn Matcher>>,
}

impl MatcherSet {
    /// Creates an empty set.
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Creates a set holding the built-in table.
    pub fn builtin() -> Self {
        Self {
            matchers: builtin_matchers(),
        }
    }

    /// Appends a rule after every rule registered so far.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateSignature`] if a byte-pattern rule with
    /// the same signature and mask is already registered: the new rule could
    /// never fire.
    pub fn register(&mut self, matcher: Box<dyn Matcher>) -> Result<()> {
        if let Some(signature) = matcher.signature() {
            if let Some(existing) = self
                .matchers
                .iter()
                .find(|m| m.signature() == Some(signature))
            {
                return Err(CoreError::DuplicateSignature {
                    mime: matcher.mime().to_string(),
                    existing: existing.mime().to_string(),
                });
            }
        }
        self.matchers.push(matcher);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Matcher> {
        self.matchers.iter().map(|m| m.as_ref())
    }
}

impl Default for MatcherSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for MatcherSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.matchers.iter().map(|m| m.mime()))
            .finish()
    }
}

/// Whether `mime_type` passes an optional acceptance filter.
#[inline]
pub fn is_accepted(accepted: Option<&HashSet<String>>, mime_type: &str) -> bool {
    accepted.is_none_or(|set| set.contains(mime_type))
}

/// Drives a [`MatcherSet`] and an optional [`FallbackProbe`].
pub struct FormatClassifier<'a> {
    matchers: &'a MatcherSet,
    fallback: Option<&'a dyn FallbackProbe>,
    pool: &'a BufferPool,
}

impl<'a> FormatClassifier<'a> {
    pub fn new(matchers: &'a MatcherSet) -> Self {
        Self {
            matchers,
            fallback: None,
            pool: BufferPool::global(),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: &'a dyn FallbackProbe) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: &'a BufferPool) -> Self {
        self.pool = pool;
        self
    }

    /// Classifies `stream` from its first [`SNIFF_SIZE`] bytes.
    ///
    /// Rules run strictly in registration order and the first match wins. A
    /// rule whose MIME type is outside `accepted` is skipped; if nothing
    /// accepted fires afterwards the call fails with
    /// [`CoreError::NotAccepted`] naming the first rejected type. When no
    /// rule fires at all, the fallback probe runs if its MIME type is
    /// acceptable, and otherwise the call fails with
    /// [`CoreError::Unsupported`].
    ///
    /// The stream is rewound before returning.
    ///
    /// # Errors
    ///
    /// I/O failures while reading the prefix, and the classification
    /// failures above.
    pub fn classify(
        &self,
        stream: &mut dyn MediaSource,
        accepted: Option<&HashSet<String>>,
    ) -> Result<Detection> {
        stream.seek(SeekFrom::Start(0))?;
        let mut prefix = self.pool.take_with_capacity(SNIFF_SIZE);
        (&mut *stream)
            .take(SNIFF_SIZE as u64)
            .read_to_end(&mut prefix)?;

        let result = self.classify_prefix(&prefix, stream, accepted);
        stream.seek(SeekFrom::Start(0))?;
        result
    }

    fn classify_prefix(
        &self,
        prefix: &[u8],
        stream: &mut dyn MediaSource,
        accepted: Option<&HashSet<String>>,
    ) -> Result<Detection> {
        let mut rejected: Option<String> = None;

        for matcher in self.matchers.iter() {
            let fired = matcher.matches(prefix, stream);
            stream.seek(SeekFrom::Start(0))?;
            if !fired {
                continue;
            }
            if is_accepted(accepted, matcher.mime()) {
                return Ok(Detection::new(matcher.mime(), matcher.extension()));
            }
            debug!(mime = matcher.mime(), "signature matched but not accepted");
            rejected.get_or_insert_with(|| matcher.mime().to_string());
        }

        if let Some(mime) = rejected {
            return Err(CoreError::NotAccepted { mime });
        }

        if let Some(fallback) = self.fallback {
            if is_accepted(accepted, fallback.mime()) {
                debug!(mime = fallback.mime(), "no signature matched, probing stream");
                let confirmed = fallback.probe(stream);
                stream.seek(SeekFrom::Start(0))?;
                if confirmed {
                    return Ok(Detection::new(fallback.mime(), fallback.extension()));
                }
            }
        }

        Err(CoreError::Unsupported {
            mime: mime::OCTET_STREAM.to_string(),
        })
    }
}

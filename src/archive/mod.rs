//! Comic-book detection and member extraction for zip and rar archives.
//!
//! Only the first [`SCAN_WINDOW`] entries are looked at, by name alone. If
//! image-like names make up at least 90% of the archive's total entry count
//! the archive is a comic book. The first image-like entry is extracted
//! through [`copy_limited`] and thumbnailed as an independent document.

mod rar;
mod zip;

pub use self::rar::{RAR_EXTRACT_LIMIT, RarScanner};
pub use self::zip::{ZIP_EXTRACT_FACTOR, ZipScanner};

use crate::error::Result;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// Entries examined when scanning for images.
pub const SCAN_WINDOW: usize = 10;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// An entry of an archive, as listed by its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in enumeration order.
    pub index: usize,
    pub name: String,
    pub compressed_size: Option<u64>,
}

/// Result of scanning an archive's first entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveScan {
    /// Total number of entries in the archive.
    pub total: usize,
    /// Image-like entries within the scan window.
    pub images: usize,
    /// First image-like entry within the scan window.
    pub candidate: Option<ArchiveEntry>,
}

impl ArchiveScan {
    /// Scans the first [`SCAN_WINDOW`] of `entries`.
    pub fn from_entries<I>(entries: I, total: usize) -> Self
    where
        I: IntoIterator<Item = ArchiveEntry>,
    {
        let mut scan = Self {
            total,
            ..Self::default()
        };
        for entry in entries.into_iter().take(SCAN_WINDOW) {
            if !is_image_name(&entry.name) {
                continue;
            }
            scan.images += 1;
            scan.candidate.get_or_insert(entry);
        }
        scan
    }

    /// At least 90% of all entries are images.
    pub fn is_comic(&self) -> bool {
        self.total > 0 && self.images * 10 >= self.total * 9
    }
}

/// Whether an entry name ends in a raster image extension, ignoring case.
pub fn is_image_name(name: &str) -> bool {
    let Some((stem, extension)) = name.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && !stem.ends_with('/')
        && IMAGE_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known))
}

/// Access to an opened archive.
pub trait ArchiveReader {
    fn scan(&mut self) -> Result<ArchiveScan>;

    /// Decompresses `entry` into an anonymous temporary file, truncated at
    /// the reader's size limit. The file is rewound and removed on drop.
    fn extract(&mut self, entry: &ArchiveEntry) -> Result<File>;

    /// MIME type and extension of the comic-book variant.
    fn comic_type(&self) -> (&'static str, &'static str);
}

/// Copies at most `limit` bytes of `reader` into an anonymous temporary file.
pub fn copy_limited<R: Read + ?Sized>(reader: &mut R, limit: u64) -> io::Result<File> {
    let mut file = tempfile::tempfile()?;
    io::copy(&mut reader.take(limit), &mut file)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}

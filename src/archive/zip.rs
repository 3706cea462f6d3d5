use super::{ArchiveEntry, ArchiveReader, ArchiveScan, SCAN_WINDOW, copy_limited};
use crate::error::Result;
use crate::input::stream_len;
use ::zip::ZipArchive;
use glimpse_core::{MediaSource, mime};
use std::fs::File;
use std::io::SeekFrom;

/// Members are truncated at this multiple of the archive's own size.
pub const ZIP_EXTRACT_FACTOR: u64 = 4;

/// Zip archive read in place through its central directory.
pub struct ZipScanner<'a> {
    archive: ZipArchive<&'a mut dyn MediaSource>,
    limit: u64,
}

impl<'a> ZipScanner<'a> {
    pub fn open(input: &'a mut dyn MediaSource) -> Result<Self> {
        let size = stream_len(input)?;
        input.seek(SeekFrom::Start(0))?;
        let archive = ZipArchive::new(input)?;
        Ok(Self {
            archive,
            limit: size.saturating_mul(ZIP_EXTRACT_FACTOR),
        })
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl ArchiveReader for ZipScanner<'_> {
    fn scan(&mut self) -> Result<ArchiveScan> {
        let total = self.archive.len();
        let mut entries = Vec::with_capacity(total.min(SCAN_WINDOW));
        for index in 0..total.min(SCAN_WINDOW) {
            let file = self.archive.by_index_raw(index)?;
            entries.push(ArchiveEntry {
                index,
                name: file.name().to_string(),
                compressed_size: Some(file.compressed_size()),
            });
        }
        Ok(ArchiveScan::from_entries(entries, total))
    }

    fn extract(&mut self, entry: &ArchiveEntry) -> Result<File> {
        let mut member = self.archive.by_index(entry.index)?;
        Ok(copy_limited(&mut member, self.limit)?)
    }

    fn comic_type(&self) -> (&'static str, &'static str) {
        (mime::CBZ, "cbz")
    }
}

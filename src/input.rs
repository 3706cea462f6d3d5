//! File-backed inputs.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// A seekable view of a file on disk.
///
/// Regular non-empty files are memory-mapped. Anything that cannot be mapped
/// (empty files, pipes, some network filesystems) is read through the file
/// handle instead.
pub enum InputFile {
    Mapped(Cursor<Mmap>),
    Disk(File),
}

impl InputFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        if size > 0 {
            // SAFETY: the mapping is read-only. Concurrent truncation by another
            // process is outside what this reader guards against.
            match unsafe { Mmap::map(&file) } {
                Ok(mmap) if !mmap.is_empty() => {
                    #[cfg(target_os = "linux")]
                    {
                        let _ = mmap.advise(memmap2::Advice::Sequential);
                    }
                    return Ok(Self::Mapped(Cursor::new(mmap)));
                }
                Ok(_) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "mmap failed, reading from disk"),
            }
        }

        Self::from_file(file)
    }

    /// Wraps an already open file without mapping it.
    pub fn from_file(file: File) -> io::Result<Self> {
        #[cfg(target_os = "linux")]
        {
            use rustix::fs::{Advice, fadvise};

            let _ = fadvise(&file, 0, None, Advice::Sequential);
        }
        Ok(Self::Disk(file))
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }

    /// Total size in bytes.
    pub fn size(&self) -> io::Result<u64> {
        match self {
            Self::Mapped(cursor) => Ok(cursor.get_ref().len() as u64),
            Self::Disk(file) => Ok(file.metadata()?.len()),
        }
    }
}

impl Read for InputFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Mapped(cursor) => cursor.read(buf),
            Self::Disk(file) => file.read(buf),
        }
    }
}

impl Seek for InputFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Mapped(cursor) => cursor.seek(pos),
            Self::Disk(file) => file.seek(pos),
        }
    }
}

/// Byte length of a seekable stream. The read position is restored.
pub fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let position = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(position))?;
    Ok(len)
}

use super::{ArchiveEntry, ArchiveReader, ArchiveScan, SCAN_WINDOW, copy_limited, is_image_name};
use crate::error::{PipelineError, Result, ThumbnailError};
use crate::pipeline::{Stage, run_command};
use glimpse_core::{BufferPool, MediaSource, mime};
use std::fs::File;
use std::io::{self, Read, SeekFrom};
use std::process::{Command, Stdio};
use std::thread;
use tempfile::NamedTempFile;
use tracing::debug;

/// Members are truncated at this many bytes. Rar entries are only available
/// as a stream, so there is no container-relative bound.
pub const RAR_EXTRACT_LIMIT: u64 = 100 << 20;

/// Rar archive read through the `unrar` program.
///
/// The input is spooled to a temporary file that lives as long as the
/// scanner.
pub struct RarScanner {
    unrar: String,
    spool: NamedTempFile,
    limit: u64,
    /// Member names from the last scan.
    names: Vec<String>,
}

impl RarScanner {
    pub fn open(input: &mut dyn MediaSource, unrar: impl Into<String>) -> Result<Self> {
        let mut spool = NamedTempFile::new()?;
        input.seek(SeekFrom::Start(0))?;
        io::copy(input, spool.as_file_mut())?;
        Ok(Self {
            unrar: unrar.into(),
            spool,
            limit: RAR_EXTRACT_LIMIT,
            names: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// `unrar` reads member arguments as masks with no escape syntax, so a
    /// name holding `*` or `?` can only be extracted when it selects itself
    /// alone.
    fn is_addressable(&self, name: &str) -> bool {
        !has_wildcards(name)
            || self
                .names
                .iter()
                .filter(|other| mask_matches(name.as_bytes(), other.as_bytes()))
                .count()
                == 1
    }

    fn stage_error(&self, status: std::process::ExitStatus, stderr: &[u8]) -> ThumbnailError {
        ThumbnailError::Pipeline(PipelineError::Stage {
            index: 0,
            program: self.unrar.clone(),
            status,
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        })
    }
}

impl ArchiveReader for RarScanner {
    fn scan(&mut self) -> Result<ArchiveScan> {
        let list = Stage::new(self.unrar.as_str())
            .args(["lb", "-p-", "--"])
            .arg(self.spool.path());
        let listing = run_command(&mut io::empty(), list, BufferPool::global())?;
        self.names = String::from_utf8_lossy(&listing)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let entries: Vec<ArchiveEntry> = self
            .names
            .iter()
            .enumerate()
            .map(|(index, name)| ArchiveEntry {
                index,
                name: name.clone(),
                compressed_size: None,
            })
            .collect();
        let mut scan = ArchiveScan::from_entries(entries.iter().cloned(), entries.len());
        scan.candidate = entries
            .into_iter()
            .take(SCAN_WINDOW)
            .find(|entry| is_image_name(&entry.name) && self.is_addressable(&entry.name));
        Ok(scan)
    }

    fn extract(&mut self, entry: &ArchiveEntry) -> Result<File> {
        if !self.is_addressable(&entry.name) {
            return Err(ThumbnailError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("rar member name matches several entries: {}", entry.name),
            )));
        }

        let mut child = Command::new(&self.unrar)
            .args(["p", "-inul", "-p-", "--"])
            .arg(self.spool.path())
            .arg(&entry.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                ThumbnailError::Pipeline(PipelineError::Spawn {
                    index: 0,
                    program: self.unrar.clone(),
                    source,
                })
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.limit;

        let (copied, diagnostics) = thread::scope(|s| {
            let collector = s.spawn(move || {
                let mut raw = Vec::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_end(&mut raw);
                }
                raw
            });
            let copied = match stdout {
                Some(mut stdout) => copy_limited(&mut stdout, limit).and_then(|file| {
                    // One byte past the limit means unrar still had output.
                    let mut past = [0u8; 1];
                    let truncated =
                        file.metadata()?.len() >= limit && stdout.read(&mut past)? > 0;
                    Ok((file, truncated))
                }),
                None => tempfile::tempfile().map(|file| (file, false)),
            };
            if matches!(copied, Ok((_, true))) {
                let _ = child.kill();
            }
            (copied, collector.join().unwrap_or_default())
        });

        let status = child.wait()?;
        let (file, truncated) = copied?;
        if !status.success() && !truncated {
            return Err(self.stage_error(status, &diagnostics));
        }
        debug!(name = %entry.name, truncated, "extracted rar member");
        Ok(file)
    }

    fn comic_type(&self) -> (&'static str, &'static str) {
        (mime::CBR, "cbr")
    }
}

fn has_wildcards(name: &str) -> bool {
    name.contains(['*', '?'])
}

/// `*` matches any run of bytes and `?` any single byte.
fn mask_matches(mask: &[u8], name: &[u8]) -> bool {
    let (mut m, mut n) = (0, 0);
    let mut backtrack = None;
    while n < name.len() {
        match mask.get(m) {
            Some(b'*') => {
                backtrack = Some((m, n));
                m += 1;
            }
            Some(&c) if c == b'?' || c == name[n] => {
                m += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, from)) => {
                    m = star + 1;
                    n = from + 1;
                    backtrack = Some((star, from + 1));
                }
                None => return false,
            },
        }
    }
    mask[m..].iter().all(|&c| c == b'*')
}

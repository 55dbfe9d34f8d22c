//! Forward-only tar(.gz) member iteration.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::error::{Result, RipError};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Compression layer wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    None,
}

impl Compression {
    /// Pick the compression from the archive's file name.
    ///
    /// Anything that is not recognisably a plain tar is treated as gzip.
    pub fn from_archive_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar") {
            Self::None
        } else {
            Self::Gzip
        }
    }
}

/// Notes when the wrapped stream reports end of file.
///
/// tar reads headers and contents in exact-sized pieces, so it only sees EOF
/// when the stream ends before the end-of-archive blocks.
struct EofWatch<R> {
    inner: R,
    hit: Arc<AtomicBool>,
}

impl<R: Read> Read for EofWatch<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.hit.store(true, Ordering::Relaxed);
        }
        Ok(n)
    }
}

/// A tar archive decoded on the fly from a sequential stream.
pub struct ArchiveReader<R: Read> {
    name: String,
    archive: tar::Archive<EofWatch<R>>,
    eof: Arc<AtomicBool>,
}

impl<'r> ArchiveReader<Box<dyn Read + 'r>> {
    /// Wrap a raw archive stream, adding gzip decoding when the archive name
    /// calls for it.
    pub fn open(name: &str, stream: impl Read + 'r) -> Self {
        let decoded: Box<dyn Read + 'r> = match Compression::from_archive_name(name) {
            Compression::Gzip => Box::new(GzDecoder::new(stream)),
            Compression::None => Box::new(stream),
        };
        Self::new(name, decoded)
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Read an already-decompressed tar stream.
    pub fn new(name: &str, stream: R) -> Self {
        let eof = Arc::new(AtomicBool::new(false));
        Self {
            name: name.to_string(),
            archive: tar::Archive::new(EofWatch {
                inner: stream,
                hit: Arc::clone(&eof),
            }),
            eof,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start iterating over the archive's regular-file members.
    ///
    /// Can only be called once per reader.
    pub fn members(&mut self) -> Result<Members<'_, R>> {
        let Self { name, archive, eof } = self;
        let entries = archive.entries().map_err(|source| RipError::StreamTruncated {
            archive: name.clone(),
            source,
        })?;
        Ok(Members {
            archive: name.as_str(),
            entries,
            current: None,
            eof: Arc::clone(eof),
        })
    }
}

/// Lazy sequence of members.
///
/// This is deliberately not an [`Iterator`]: each [`ArchiveMember`] borrows
/// the sequence mutably, so it has to be read, skipped or dropped before
/// [`Members::next_member`] can be called again.
pub struct Members<'a, R: Read + 'a> {
    archive: &'a str,
    entries: tar::Entries<'a, EofWatch<R>>,
    current: Option<tar::Entry<'a, EofWatch<R>>>,
    eof: Arc<AtomicBool>,
}

impl<'a, R: Read + 'a> Members<'a, R> {
    /// Advance to the next regular file.
    ///
    /// Any unread data of the previous member is drained first. Returns
    /// `Ok(None)` at the end-of-archive marker and
    /// [`RipError::StreamTruncated`] if the stream breaks, including a stream
    /// that stops cleanly on a header boundary before the marker.
    pub fn next_member(&mut self) -> Result<Option<ArchiveMember<'_, 'a, R>>> {
        // Dropping the previous entry lets tar skip past what is left of it.
        self.current = None;

        loop {
            let entry = match self.entries.next() {
                None if self.eof.load(Ordering::Relaxed) => {
                    return Err(truncated(
                        self.archive,
                        "stream ended before the end-of-archive marker",
                    ));
                }
                None => return Ok(None),
                Some(Ok(entry)) => entry,
                Some(Err(source)) => {
                    return Err(RipError::StreamTruncated {
                        archive: self.archive.to_string(),
                        source,
                    });
                }
            };

            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = match entry.path() {
                Ok(path) => normalize_member_name(&path),
                Err(e) => {
                    warn!("Skipping member with unreadable name in {}: {}", self.archive, e);
                    continue;
                }
            };
            let size = entry.size();

            let entry = self.current.insert(entry);
            return Ok(Some(ArchiveMember {
                archive: self.archive,
                name,
                size,
                entry,
            }));
        }
    }
}

/// One member's name and content stream, valid for a single iteration step.
pub struct ArchiveMember<'m, 'a, R: Read + 'a> {
    archive: &'a str,
    name: String,
    size: u64,
    entry: &'m mut tar::Entry<'a, EofWatch<R>>,
}

impl<'m, 'a, R: Read + 'a> ArchiveMember<'m, 'a, R> {
    /// Archive-relative path with any leading `./` removed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content size as recorded in the tar header.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read and discard the content.
    ///
    /// Meant for a member nothing has been read from yet: fewer bytes than
    /// the header size is reported as [`RipError::StreamTruncated`].
    pub fn skip(self) -> Result<u64> {
        let archive = self.archive;
        let skipped = io::copy(self.entry, &mut io::sink()).map_err(|source| {
            RipError::StreamTruncated {
                archive: archive.to_string(),
                source,
            }
        })?;
        if skipped != self.size {
            return Err(short_member(archive, &self.name, skipped, self.size));
        }
        Ok(skipped)
    }

    /// Write the content to `path`, creating parent directories.
    ///
    /// Read failures, and content shorter than the header size, are reported
    /// as [`RipError::StreamTruncated`]; write failures as [`RipError::Io`].
    /// A short file may be left at `path` in either case.
    pub fn write_to(self, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut out = BufWriter::new(File::create(path)?);
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let n = match self.entry.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(RipError::StreamTruncated {
                        archive: self.archive.to_string(),
                        source,
                    });
                }
            };
            out.write_all(&buf[..n])?;
            written += n as u64;
        }

        out.flush()?;
        if written != self.size {
            return Err(short_member(self.archive, &self.name, written, self.size));
        }
        Ok(written)
    }
}

impl<'m, 'a, R: Read + 'a> Read for ArchiveMember<'m, 'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.entry.read(buf)
    }
}

fn truncated(archive: &str, reason: &str) -> RipError {
    RipError::StreamTruncated {
        archive: archive.to_string(),
        source: io::Error::new(io::ErrorKind::UnexpectedEof, reason.to_string()),
    }
}

fn short_member(archive: &str, member: &str, got: u64, expected: u64) -> RipError {
    truncated(
        archive,
        &format!("{member}: stream ended after {got} of {expected} bytes"),
    )
}

fn normalize_member_name(path: &Path) -> String {
    let name = path.to_string_lossy().replace('\\', "/");
    let mut name = name.as_str();
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name.to_string()
}

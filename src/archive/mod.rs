//! Streaming tar archive reading and selective extraction.
//!
//! ## Architecture
//!
//! - [`reader`]: decodes a forward-only byte stream (gzip, then tar) into a
//!   lazy sequence of [`ArchiveMember`]s
//! - [`extractor`]: walks that sequence, writing only targeted members and
//!   stopping once nothing is left to find
//!
//! ## Streaming model
//!
//! A tar.gz archive has no index, so the only way to find a member is to read
//! every header before it. The reader therefore never seeks: it decompresses
//! and parses in one pass and skips unwanted member data as it goes. Members
//! are borrowed from the reader one at a time; the borrow checker rejects
//! code that asks for the next member while still holding the previous one.
//!
//! ## Truncation
//!
//! A stream counts as truncated when reading fails, when a member delivers
//! fewer bytes than its header announces, or when the stream ends before the
//! end-of-archive marker, including a cut that falls exactly on a header
//! boundary. A truncated member is never counted as extracted.
//!
//! ## Limitations
//!
//! - No integrity verification of decompressed bytes
//! - A member interrupted mid-write leaves a truncated output file behind
//! - An archive written without an end-of-archive marker reads as truncated

mod extractor;
mod reader;

pub use extractor::{ExtractionOutcome, SelectiveExtractor};
pub use reader::{ArchiveMember, ArchiveReader, Compression, Members};

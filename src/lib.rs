//! # tarpick
//!
//! Pick a scattered handful of files out of large remote tar.gz archives
//! without downloading the archives in full.
//!
//! Which files to pick comes from metadata CSV files, one per archive. The
//! directory a metadata file sits in names the remote folder, its file name
//! names the archive, and its rows name the members to extract. Each archive
//! is then streamed once over HTTP (or read from a local copy), decompressed
//! and parsed on the fly, and only the listed members are written to disk.
//! Reading stops as soon as the last listed member has been found.
//!
//! ## Features
//!
//! - Streaming gzip + tar decoding from a live HTTP body or a local file
//! - Early exit once every targeted member is extracted
//! - Two metadata layouts: segment rows with reconstructed member names, and
//!   phrase-filtered path rows with verbatim base names
//! - A phrase filter to produce metadata files from larger CSV dumps
//!
//! ## Example
//!
//! ```no_run
//! use tarpick::{HttpArchiveSource, RipConfig, Ripper};
//!
//! fn main() -> anyhow::Result<()> {
//!     let source = HttpArchiveSource::new(
//!         "https://example.com/data/audio",
//!         std::env::var("HF_TOKEN").ok(),
//!     )?;
//!
//!     let ripper = Ripper::new(RipConfig::new("cleaned", "downloaded_audio"), source);
//!     let summary = ripper.run()?;
//!     println!("{summary}");
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod metadata;
pub mod ripper;
pub mod targets;

pub use archive::{ArchiveMember, ArchiveReader, ExtractionOutcome, SelectiveExtractor};
pub use cli::Cli;
pub use config::{FilterConfig, RipConfig};
pub use error::{Result, RipError};
pub use filter::{FilterSummary, PhraseFilter};
pub use io::{ArchiveSource, HttpArchiveSource, LocalArchiveSource};
pub use metadata::{ArchiveDescriptor, CategoryTable, MetadataIndexer, NameMapper, Schema};
pub use ripper::{FileReport, Ripper, RunSummary};
pub use targets::TargetSet;

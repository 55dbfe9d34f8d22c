mod http;
mod local;

pub use http::HttpArchiveSource;
pub use local::LocalArchiveSource;

use std::io::Read;

use crate::error::Result;
use crate::metadata::ArchiveDescriptor;

/// A place archives can be streamed from.
///
/// Implementations hand out a forward-only byte stream positioned at the
/// start of the archive; nothing is seeked or buffered in full.
pub trait ArchiveSource {
    /// Where the archive lives, for log and report lines.
    fn locate(&self, archive: &ArchiveDescriptor) -> String;

    /// Open the raw (still compressed) archive bytes.
    fn open(&self, archive: &ArchiveDescriptor) -> Result<Box<dyn Read + Send>>;
}

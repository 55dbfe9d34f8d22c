use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while picking members out of archives.
///
/// Everything except [`RipError::Unauthorized`] is scoped to a single
/// metadata file or archive; the ripper logs it and moves on.
#[derive(Debug, Error)]
pub enum RipError {
    /// The directory a metadata file lives in is not in the category table.
    #[error("unknown category '{category}' for metadata file {}", path.display())]
    UnknownCategory { category: String, path: PathBuf },

    #[error("cannot read metadata file {}: {source}", path.display())]
    MetadataUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive stream ended or broke before the tar end marker.
    #[error("archive stream for {archive} was truncated: {source}")]
    StreamTruncated {
        archive: String,
        #[source]
        source: io::Error,
    },

    /// Informational only, never returned from a run.
    #[error("member {member} not found in {archive}")]
    MemberNotFound { member: String, archive: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("archive {archive} is unavailable: {reason}")]
    ArchiveUnavailable { archive: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RipError {
    /// Whether the error must abort the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RipError::Unauthorized(_))
    }
}

pub type Result<T, E = RipError> = std::result::Result<T, E>;

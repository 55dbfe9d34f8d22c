use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::ArchiveSource;
use crate::error::{Result, RipError};
use crate::metadata::ArchiveDescriptor;

/// Archives already materialized on disk, laid out as
/// `{root}/{remote_folder}/{archive_name}`.
pub struct LocalArchiveSource {
    root: PathBuf,
}

impl LocalArchiveSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, archive: &ArchiveDescriptor) -> PathBuf {
        self.root
            .join(&archive.remote_folder)
            .join(&archive.archive_name)
    }
}

impl ArchiveSource for LocalArchiveSource {
    fn locate(&self, archive: &ArchiveDescriptor) -> String {
        self.path_for(archive).display().to_string()
    }

    fn open(&self, archive: &ArchiveDescriptor) -> Result<Box<dyn Read + Send>> {
        let path = self.path_for(archive);
        let file = File::open(&path).map_err(|e| RipError::ArchiveUnavailable {
            archive: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

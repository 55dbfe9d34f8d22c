use std::path::PathBuf;

use crate::metadata::{ArchiveNaming, CategoryTable, Schema};

/// Settings for one `rip` run.
#[derive(Debug, Clone)]
pub struct RipConfig {
    /// Root of the metadata tree; its first-level directories are categories.
    pub metadata_dir: PathBuf,
    /// Extracted members are written below this directory.
    pub output_dir: PathBuf,
    pub schema: Schema,
    pub naming: ArchiveNaming,
    pub categories: CategoryTable,
    /// Use this remote folder for every file instead of the category table.
    pub remote_folder: Option<String>,
    pub overwrite: bool,
    /// Index and resolve only; never open an archive.
    pub dry_run: bool,
}

impl RipConfig {
    pub fn new(metadata_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
            output_dir: output_dir.into(),
            schema: Schema::segments(),
            naming: ArchiveNaming::default(),
            categories: CategoryTable::default(),
            remote_folder: None,
            overwrite: false,
            dry_run: false,
        }
    }
}

/// Settings for one `filter` run.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Lines containing this text (case-sensitive) are kept.
    pub phrase: String,
    pub recursive: bool,
}

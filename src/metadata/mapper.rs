use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use super::{MetadataRecord, NamingPolicy, Schema};
use crate::error::{Result, RipError};

/// Identifies one remote archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// File name of the archive, e.g. `xs_chunks_0000.tar.gz`.
    pub archive_name: String,
    /// Folder holding the archive on the remote side.
    pub remote_folder: String,
    /// Archive name without its suffix, e.g. `xs_chunks_0000`.
    pub stem: String,
}

impl ArchiveDescriptor {
    /// Path of the archive relative to the remote base: `{folder}/{name}`.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.remote_folder, self.archive_name)
    }
}

/// Lookup table from category directory names to remote folder names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    folders: BTreeMap<String, String>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (category, folder) in [
            ("xs", "xs_files"),
            ("s-additional", "s_files_additional"),
            ("m-additional", "m_files_additional"),
            ("large-additional", "l_files_additional"),
            ("xl-additional", "xl_files_additional"),
            ("dev", "dev_files"),
            ("test", "test_files"),
        ] {
            table.insert(category, folder);
        }
        table
    }
}

impl CategoryTable {
    pub fn empty() -> Self {
        Self {
            folders: BTreeMap::new(),
        }
    }

    /// Add or replace a mapping.
    pub fn insert(&mut self, category: impl Into<String>, folder: impl Into<String>) {
        self.folders.insert(category.into(), folder.into());
    }

    pub fn lookup(&self, category: &str) -> Option<&str> {
        self.folders.get(category).map(String::as_str)
    }

    /// Parse a `NAME=FOLDER` pair as given on the command line.
    pub fn parse_entry(s: &str) -> std::result::Result<(String, String), String> {
        let (name, folder) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=FOLDER, got '{s}'"))?;
        let (name, folder) = (name.trim(), folder.trim());
        if name.is_empty() || folder.is_empty() {
            return Err(format!("expected NAME=FOLDER, got '{s}'"));
        }
        Ok((name.to_string(), folder.to_string()))
    }
}

/// Suffix tokens linking a metadata file name to its archive name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveNaming {
    pub metadata_suffix: String,
    pub archive_suffix: String,
}

impl Default for ArchiveNaming {
    fn default() -> Self {
        Self {
            metadata_suffix: "_metadata.csv".to_string(),
            archive_suffix: ".tar.gz".to_string(),
        }
    }
}

impl ArchiveNaming {
    /// `xs_chunks_0000_metadata.csv` -> `xs_chunks_0000`.
    ///
    /// Names without the metadata suffix lose their extension instead.
    pub fn stem(&self, metadata_file_name: &str) -> String {
        if let Some(stem) = metadata_file_name.strip_suffix(self.metadata_suffix.as_str()) {
            return stem.to_string();
        }
        match metadata_file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => metadata_file_name.to_string(),
        }
    }

    /// `xs_chunks_0000_metadata.csv` -> `xs_chunks_0000.tar.gz`.
    pub fn archive_name(&self, metadata_file_name: &str) -> String {
        format!("{}{}", self.stem(metadata_file_name), self.archive_suffix)
    }
}

/// Maps metadata files to archives and metadata rows to member names.
///
/// Nothing here touches the filesystem; all derivations are string and path
/// transforms.
#[derive(Debug, Clone)]
pub struct NameMapper {
    root: PathBuf,
    categories: CategoryTable,
    fixed_folder: Option<String>,
    naming: ArchiveNaming,
    policy: NamingPolicy,
    source_extension: String,
}

impl NameMapper {
    pub fn new(
        root: impl Into<PathBuf>,
        categories: CategoryTable,
        naming: ArchiveNaming,
        schema: &Schema,
    ) -> Self {
        Self {
            root: root.into(),
            categories,
            fixed_folder: None,
            naming,
            policy: schema.policy.clone(),
            source_extension: schema.source_extension.clone(),
        }
    }

    /// Use one remote folder for every metadata file, bypassing the category
    /// table.
    pub fn with_fixed_folder(mut self, folder: Option<String>) -> Self {
        self.fixed_folder = folder;
        self
    }

    /// The directory segment directly under the metadata root.
    ///
    /// Files placed straight in the root have no category.
    pub fn category_of<'p>(&self, metadata_path: &'p Path) -> Option<&'p str> {
        let relative = metadata_path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let first = match components.next()? {
            Component::Normal(segment) => segment.to_str()?,
            _ => return None,
        };
        // The first segment must be a directory, not the file itself.
        components.next()?;
        Some(first)
    }

    /// Remote folder for a metadata file.
    pub fn remote_folder(&self, metadata_path: &Path) -> Result<String> {
        if let Some(folder) = &self.fixed_folder {
            return Ok(folder.clone());
        }

        let category = self.category_of(metadata_path).unwrap_or_default();
        self.categories
            .lookup(category)
            .map(str::to_string)
            .ok_or_else(|| RipError::UnknownCategory {
                category: category.to_string(),
                path: metadata_path.to_path_buf(),
            })
    }

    /// Resolve the archive a metadata file describes.
    pub fn resolve(&self, metadata_path: &Path) -> Result<ArchiveDescriptor> {
        let remote_folder = self.remote_folder(metadata_path)?;
        let file_name = metadata_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(ArchiveDescriptor {
            archive_name: self.naming.archive_name(&file_name),
            stem: self.naming.stem(&file_name),
            remote_folder,
        })
    }

    /// Whether a source path carries the expected extension.
    pub fn has_source_extension(&self, source_path: &str) -> bool {
        let ext = self.source_extension.as_bytes();
        let path = source_path.as_bytes();
        path.len() >= ext.len() && path[path.len() - ext.len()..].eq_ignore_ascii_case(ext)
    }

    /// The member name a record points at, or `None` if the record is not
    /// usable under the active policy.
    pub fn member_name(&self, archive: &ArchiveDescriptor, record: &MetadataRecord) -> Option<String> {
        if !self.has_source_extension(&record.source_path) {
            return None;
        }

        match &self.policy {
            NamingPolicy::Direct => {
                let base = record
                    .source_path
                    .rsplit(['/', '\\'])
                    .next()
                    .unwrap_or_default();
                (!base.is_empty()).then(|| base.to_string())
            }
            NamingPolicy::Reconstructed {
                separator,
                target_extension,
            } => {
                let segment = record.segment_id.as_deref()?;
                Some(format!(
                    "{}{}{}{}",
                    archive.stem, separator, segment, target_extension
                ))
            }
        }
    }
}

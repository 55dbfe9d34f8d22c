use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{ArchiveDescriptor, MetadataRecord, NameMapper, RowFormat};
use crate::error::{Result, RipError};
use crate::targets::TargetSet;

/// Row counters for one indexed metadata file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Non-blank rows seen.
    pub rows: usize,
    /// Rows that produced a new target name.
    pub accepted: usize,
    /// Rows that were too short, unparsable or had the wrong extension.
    pub invalid: usize,
    /// Rows whose derived name was already targeted.
    pub duplicates: usize,
}

/// Everything known about one metadata file before its archive is opened.
#[derive(Debug, Clone)]
pub struct IndexedMetadata {
    pub path: PathBuf,
    pub archive: ArchiveDescriptor,
    pub targets: TargetSet,
    pub stats: IndexStats,
}

/// Reads metadata files into target sets.
pub struct MetadataIndexer<'m> {
    mapper: &'m NameMapper,
    row_format: RowFormat,
}

impl<'m> MetadataIndexer<'m> {
    pub fn new(mapper: &'m NameMapper, row_format: RowFormat) -> Self {
        Self { mapper, row_format }
    }

    /// Resolve a metadata file's archive and collect its target names.
    ///
    /// Bad rows are counted and skipped; only a category miss or an
    /// unreadable file fails.
    pub fn index(&self, path: &Path) -> Result<IndexedMetadata> {
        let archive = self.mapper.resolve(path)?;

        let file = File::open(path).map_err(|source| RipError::MetadataUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut targets = TargetSet::new();
        let mut stats = IndexStats::default();
        let mut accept = |record: Option<MetadataRecord>, stats: &mut IndexStats| {
            stats.rows += 1;
            let name = record.and_then(|r| self.mapper.member_name(&archive, &r));
            match name {
                Some(name) => {
                    if targets.insert(name.as_str()) {
                        stats.accepted += 1;
                    } else {
                        debug!("Skipping duplicate target {}", name);
                        stats.duplicates += 1;
                    }
                }
                None => stats.invalid += 1,
            }
        };

        match self.row_format {
            RowFormat::FirstField => {
                read_lines(path, reader, |line| {
                    let fields = RowFormat::split_first_field(line);
                    accept(self.row_format.record(fields), &mut stats);
                })?;
            }
            RowFormat::Columns { .. } => {
                let mut csv_reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(reader);

                for row in csv_reader.records() {
                    match row {
                        Ok(row) => {
                            if row.iter().all(|f| f.trim().is_empty()) {
                                continue;
                            }
                            let fields = row.iter().map(str::to_string).collect();
                            accept(self.row_format.record(fields), &mut stats);
                        }
                        Err(e) if e.is_io_error() => {
                            return Err(RipError::MetadataUnreadable {
                                path: path.to_path_buf(),
                                source: e.into(),
                            });
                        }
                        Err(e) => {
                            debug!("Skipping unparsable row in {}: {}", path.display(), e);
                            stats.rows += 1;
                            stats.invalid += 1;
                        }
                    }
                }
            }
        }
        drop(accept);

        info!(
            "Indexed {}: {} targets ({} rows, {} invalid, {} duplicate)",
            path.display(),
            targets.len(),
            stats.rows,
            stats.invalid,
            stats.duplicates
        );

        Ok(IndexedMetadata {
            path: path.to_path_buf(),
            archive,
            targets,
            stats,
        })
    }
}

/// Feed each non-blank line to `f`, decoding invalid UTF-8 lossily.
fn read_lines<R: BufRead>(path: &Path, mut reader: R, mut f: impl FnMut(&str)) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| RipError::MetadataUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.trim().is_empty() {
            f(line);
        }
    }
}

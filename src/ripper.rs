//! Drives a whole run: every metadata file, one archive each.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::archive::{ArchiveReader, SelectiveExtractor};
use crate::config::RipConfig;
use crate::error::{Result, RipError};
use crate::io::ArchiveSource;
use crate::metadata::{ArchiveDescriptor, IndexStats, MetadataIndexer, NameMapper};

/// Result of processing one metadata file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub archive: ArchiveDescriptor,
    pub stats: IndexStats,
    /// Target names derived from the file.
    pub targeted: usize,
    pub written: Vec<PathBuf>,
    pub skipped_existing: usize,
    pub bytes_written: u64,
    /// Targets that were not extracted, in name order.
    pub unmatched: Vec<String>,
    /// Unmatched targets that were found but could not be written.
    pub failed_writes: Vec<String>,
    /// Set when the archive stream broke before the scan finished.
    pub truncated: Option<String>,
}

impl FileReport {
    pub fn matched(&self) -> usize {
        self.written.len() + self.skipped_existing
    }
}

/// Run-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_found: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    /// Files that produced no targets; their archives were not opened.
    pub files_without_targets: usize,
    pub archives_truncated: usize,
    pub rows_invalid: usize,
    pub rows_duplicate: usize,
    pub members_targeted: usize,
    pub members_matched: usize,
    pub members_unmatched: usize,
    /// Part of `members_unmatched`: found, but the local write failed.
    pub members_failed: usize,
    pub bytes_written: u64,
}

impl RunSummary {
    fn record(&mut self, report: &FileReport) {
        self.files_processed += 1;
        if report.targeted == 0 {
            self.files_without_targets += 1;
        }
        if report.truncated.is_some() {
            self.archives_truncated += 1;
        }
        self.rows_invalid += report.stats.invalid;
        self.rows_duplicate += report.stats.duplicates;
        self.members_targeted += report.targeted;
        self.members_matched += report.matched();
        self.members_unmatched += report.unmatched.len();
        self.members_failed += report.failed_writes.len();
        self.bytes_written += report.bytes_written;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Metadata files found:     {}", self.files_found)?;
        writeln!(f, "Metadata files processed: {}", self.files_processed)?;
        writeln!(f, "Metadata files failed:    {}", self.files_failed)?;
        writeln!(f, "Files without targets:    {}", self.files_without_targets)?;
        writeln!(f, "Truncated archives:       {}", self.archives_truncated)?;
        writeln!(f, "Rows skipped (invalid):   {}", self.rows_invalid)?;
        writeln!(f, "Rows skipped (duplicate): {}", self.rows_duplicate)?;
        writeln!(f, "Members targeted:         {}", self.members_targeted)?;
        writeln!(f, "Members matched:          {}", self.members_matched)?;
        writeln!(f, "Members unmatched:        {}", self.members_unmatched)?;
        write!(f, "Members failed to write:  {}", self.members_failed)
    }
}

/// Picks targeted members out of the archives behind a metadata tree.
pub struct Ripper<S: ArchiveSource> {
    config: RipConfig,
    mapper: NameMapper,
    source: S,
}

impl<S: ArchiveSource> Ripper<S> {
    pub fn new(config: RipConfig, source: S) -> Self {
        let mapper = NameMapper::new(
            &config.metadata_dir,
            config.categories.clone(),
            config.naming.clone(),
            &config.schema,
        )
        .with_fixed_folder(config.remote_folder.clone());

        Self {
            config,
            mapper,
            source,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &RipConfig {
        &self.config
    }

    /// All `.csv` files below the metadata root, sorted by path.
    pub fn metadata_files(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.metadata_dir;
        if !root.is_dir() {
            return Err(RipError::MetadataUnreadable {
                path: root.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "directory does not exist"),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_csv(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path: {}", e),
            }
        }
        Ok(files)
    }

    /// Process every metadata file.
    ///
    /// Per-file failures are logged and counted; only an authorization
    /// failure stops the run.
    pub fn run(&self) -> Result<RunSummary> {
        let files = self.metadata_files()?;
        let mut summary = RunSummary {
            files_found: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            warn!("No CSV files found in directory: {}", self.config.metadata_dir.display());
            return Ok(summary);
        }
        info!("Found {} CSV files to process", files.len());

        for path in &files {
            match self.process_file(path) {
                Ok(report) => summary.record(&report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Error processing {}: {}", path.display(), e);
                    summary.files_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Index one metadata file and pull its targets out of the archive.
    pub fn process_file(&self, path: &Path) -> Result<FileReport> {
        info!("Processing metadata file: {}", path.display());

        let indexer = MetadataIndexer::new(&self.mapper, self.config.schema.row_format.clone());
        let indexed = indexer.index(path)?;
        let mut targets = indexed.targets;
        let location = self.source.locate(&indexed.archive);

        let mut report = FileReport {
            path: path.to_path_buf(),
            targeted: targets.len(),
            archive: indexed.archive,
            stats: indexed.stats,
            written: Vec::new(),
            skipped_existing: 0,
            bytes_written: 0,
            unmatched: Vec::new(),
            failed_writes: Vec::new(),
            truncated: None,
        };

        if targets.is_empty() {
            warn!("No usable rows in {}, not opening {}", path.display(), location);
            return Ok(report);
        }

        if self.config.dry_run {
            info!("Would fetch {} for {} targets", location, targets.len());
            report.unmatched = targets.iter().map(str::to_string).collect();
            return Ok(report);
        }

        info!("Streaming archive: {}", location);
        let stream = self.source.open(&report.archive)?;
        let mut reader = ArchiveReader::open(&report.archive.archive_name, stream);
        let mut members = reader.members()?;

        let extractor =
            SelectiveExtractor::new(&self.config.output_dir).overwrite(self.config.overwrite);
        let outcome = extractor.extract(&mut members, &mut targets)?;

        if let Some(e) = &outcome.interrupted {
            warn!(
                "{} (kept {} extracted files, {} targets unmatched)",
                e,
                outcome.written.len(),
                targets.len()
            );
            report.truncated = Some(e.to_string());
        } else {
            for member in targets.iter() {
                if outcome.failed.iter().any(|failed| failed == member) {
                    continue;
                }
                let missing = RipError::MemberNotFound {
                    member: member.to_string(),
                    archive: report.archive.archive_name.clone(),
                };
                warn!("{}", missing);
            }
        }

        info!(
            "Finished {}: {} matched, {} unmatched, {} members read{}",
            report.archive.archive_name,
            outcome.matched(),
            targets.len(),
            outcome.members_seen,
            if outcome.stopped_early { " (stopped early)" } else { "" }
        );

        report.skipped_existing = outcome.skipped_existing;
        report.bytes_written = outcome.bytes_written;
        report.written = outcome.written;
        report.failed_writes = outcome.failed;
        report.unmatched = targets.iter().map(str::to_string).collect();
        Ok(report)
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

//! Phrase filtering of metadata CSV files.
//!
//! Produces the metadata consumed by the ripper: every `.csv` under the input
//! directory is copied to the same relative path under the output directory,
//! keeping only the lines that contain the phrase.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{error, info};
use walkdir::WalkDir;

use crate::config::FilterConfig;
use crate::error::{Result, RipError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub matching_lines: usize,
}

pub struct PhraseFilter {
    config: FilterConfig,
}

impl PhraseFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<FilterSummary> {
        let FilterConfig {
            input_dir,
            output_dir,
            recursive,
            ..
        } = &self.config;

        if !input_dir.is_dir() {
            return Err(RipError::MetadataUnreadable {
                path: input_dir.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "input directory does not exist"),
            });
        }
        fs::create_dir_all(output_dir)?;

        let max_depth = if *recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(input_dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            // Never re-read our own output when it sits inside the input tree.
            .filter_entry(|e| e.depth() == 0 || !e.path().starts_with(output_dir));

        let mut summary = FilterSummary::default();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_csv(entry.path()) {
                continue;
            }

            let input = entry.path();
            let relative = input.strip_prefix(input_dir).unwrap_or(input);
            let output = output_dir.join(relative);

            match self.filter_file(input, &output) {
                Ok(lines) => {
                    info!("Processed file: {} ({} matching lines)", input.display(), lines);
                    summary.files_processed += 1;
                    summary.matching_lines += lines;
                }
                Err(e) => {
                    error!("Error processing file {}: {}", input.display(), e);
                    summary.files_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Copy the lines of `input` that contain the phrase to `output`,
    /// byte for byte, line endings included.
    pub fn filter_file(&self, input: &Path, output: &Path) -> io::Result<usize> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut reader = BufReader::new(File::open(input)?);
        let mut writer = BufWriter::new(File::create(output)?);
        let phrase = self.config.phrase.as_bytes();

        let mut matched = 0;
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if contains(&line, phrase) {
                writer.write_all(&line)?;
                matched += 1;
            }
        }
        writer.flush()?;
        Ok(matched)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

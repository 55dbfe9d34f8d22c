use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::reader::Members;
use crate::error::{Result, RipError};
use crate::targets::TargetSet;

/// What happened while scanning one archive.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Output files written, in archive order.
    pub written: Vec<PathBuf>,
    /// Targets already present on disk and left untouched.
    pub skipped_existing: usize,
    pub bytes_written: u64,
    /// Members looked at before the scan ended.
    pub members_seen: usize,
    /// The target set ran empty and the rest of the archive was not read.
    pub stopped_early: bool,
    /// Targets found in the archive that could not be written locally.
    /// They stay in the target set.
    pub failed: Vec<String>,
    /// The stream broke; everything above was still completed.
    pub interrupted: Option<RipError>,
}

impl ExtractionOutcome {
    /// Targets found in the archive, whether written or already present.
    pub fn matched(&self) -> usize {
        self.written.len() + self.skipped_existing
    }
}

/// Writes the targeted members of an archive under an output root,
/// mirroring their archive-relative paths.
pub struct SelectiveExtractor {
    output_root: PathBuf,
    overwrite: bool,
}

impl SelectiveExtractor {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            overwrite: false,
        }
    }

    /// Replace output files that already exist instead of skipping them.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Where a member would be written, or `None` if its name would escape
    /// the output root.
    pub fn output_path(&self, member_name: &str) -> Option<PathBuf> {
        let relative = Path::new(member_name);
        let mut has_normal = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_normal = true,
                Component::CurDir => {}
                _ => return None,
            }
        }
        has_normal.then(|| self.output_root.join(relative))
    }

    /// Scan `members`, writing every member named in `targets` and removing
    /// it from the set.
    ///
    /// Stops as soon as `targets` is empty. A broken stream does not fail the
    /// call: it ends the scan and is reported in
    /// [`ExtractionOutcome::interrupted`]. A member that cannot be written
    /// locally is logged, put back into `targets` and listed in
    /// [`ExtractionOutcome::failed`], and the scan goes on.
    pub fn extract<R: Read>(
        &self,
        members: &mut Members<'_, R>,
        targets: &mut TargetSet,
    ) -> Result<ExtractionOutcome> {
        let mut outcome = ExtractionOutcome::default();
        if targets.is_empty() {
            return Ok(outcome);
        }

        loop {
            let member = match members.next_member() {
                Ok(Some(member)) => member,
                Ok(None) => break,
                Err(e @ RipError::StreamTruncated { .. }) => {
                    outcome.interrupted = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            };
            outcome.members_seen += 1;

            if !targets.contains(member.name()) {
                if let Err(e) = member.skip() {
                    outcome.interrupted = Some(e);
                    break;
                }
                continue;
            }

            let name = member.name().to_string();
            let Some(dest) = self.output_path(&name) else {
                warn!("Refusing to write member outside the output directory: {}", name);
                if let Err(e) = member.skip() {
                    outcome.interrupted = Some(e);
                    break;
                }
                continue;
            };

            targets.take(&name);

            if dest.exists() && !self.overwrite {
                info!("Skipping: {} (file exists)", dest.display());
                outcome.skipped_existing += 1;
                if let Err(e) = member.skip() {
                    outcome.interrupted = Some(e);
                    break;
                }
            } else {
                match member.write_to(&dest) {
                    Ok(bytes) => {
                        info!("Extracted: {}", name);
                        debug!("Wrote {} bytes to {}", bytes, dest.display());
                        outcome.bytes_written += bytes;
                        outcome.written.push(dest);
                    }
                    Err(e @ RipError::StreamTruncated { .. }) => {
                        // The partial file stays on disk; the name is still missing.
                        targets.insert(name);
                        outcome.interrupted = Some(e);
                        break;
                    }
                    Err(e) => {
                        // Whatever is left of the member is drained on advance.
                        error!("Failed to write {}: {}", dest.display(), e);
                        targets.insert(name.clone());
                        outcome.failed.push(name);
                    }
                }
            }

            if targets.is_empty() {
                debug!("All targets found after {} members", outcome.members_seen);
                outcome.stopped_early = true;
                break;
            }
        }

        Ok(outcome)
    }
}

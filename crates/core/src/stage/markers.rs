//! Stage texts recovered from diff3 markers in working files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::conflict::markers::reconstruct_stages;
use crate::errors::{StageError, WorkingCopyError};
use crate::models::StageSource;
use crate::stage::{StageTextProvider, StageTexts};
use crate::text::Text;
use crate::working_copy::{FsWorkingCopy, WorkingCopy};

/// Provider that parses inline conflict markers under a root directory.
#[derive(Debug, Clone)]
pub struct MarkerFileProvider {
    files: FsWorkingCopy,
    marker_size: usize,
}

impl MarkerFileProvider {
    pub fn new<P: AsRef<Path>>(root: P, marker_size: usize) -> Self {
        Self {
            files: FsWorkingCopy::new(root),
            marker_size,
        }
    }

    fn read(&self, path: &Path) -> Result<Text, StageError> {
        match self.files.read(path) {
            Ok(contents) => Ok(Text::parse(&contents)),
            Err(WorkingCopyError::NotUtf8(p)) => Err(StageError::NotAConflict(p)),
            Err(e) => Err(StageError::ReadFailure {
                path: path.display().to_string(),
                detail: e.to_string(),
            }),
        }
    }

    fn walk(&self, dir: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<(), StageError> {
        let entries = std::fs::read_dir(dir).map_err(|e| StageError::ReadFailure {
            path: dir.display().to_string(),
            detail: e.to_string(),
        })?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let rel_path = rel.join(&name);
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                self.walk(&entry.path(), &rel_path, out)?;
            } else if file_type.is_file() && is_listed(&rel_path, self.fetch(&rel_path)) {
                out.push(rel_path);
            }
        }
        Ok(())
    }
}

/// Whether a fetch result puts `path` in the listing; skipped failures are logged.
fn is_listed(path: &Path, fetched: Result<StageTexts, StageError>) -> bool {
    match fetched {
        Ok(_) => true,
        Err(StageError::NotAConflict(_)) => false,
        Err(StageError::MalformedMarkers { line, detail }) => {
            warn!(path = %path.display(), line, detail = %detail, "skipping file with malformed conflict markers");
            false
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            false
        }
    }
}

impl StageTextProvider for MarkerFileProvider {
    fn fetch(&self, path: &Path) -> Result<StageTexts, StageError> {
        let text = self.read(path)?;
        reconstruct_stages(&text, self.marker_size)?
            .ok_or_else(|| StageError::NotAConflict(path.display().to_string()))
    }

    fn conflicted_paths(&self) -> Result<Vec<PathBuf>, StageError> {
        let mut out = Vec::new();
        self.walk(self.files.root(), Path::new(""), &mut out)?;
        out.sort();
        debug!(count = out.len(), "scanned working tree for conflict markers");
        Ok(out)
    }

    fn source(&self) -> StageSource {
        StageSource::Markers
    }
}

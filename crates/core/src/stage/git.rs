//! Stage texts read from a git index via `git2`.

use std::path::{Path, PathBuf};

use git2::{IndexEntry, Repository};
use tracing::{debug, info, instrument};

use crate::errors::StageError;
use crate::models::StageSource;
use crate::stage::{StageTextProvider, StageTexts};
use crate::text::Text;

const STAGE_BASE: i32 = 1;
const STAGE_OURS: i32 = 2;
const STAGE_THEIRS: i32 = 3;

/// Reads conflict stages 1/2/3 from the index of a non-bare repository.
///
/// The repository is reopened per call so the index is always current and
/// the provider stays `Sync`.
#[derive(Debug, Clone)]
pub struct GitStageProvider {
    root: PathBuf,
}

impl GitStageProvider {
    /// Open the repository whose working directory is `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StageError> {
        let path = root.as_ref();
        let repo = Repository::open(path)
            .map_err(|e| StageError::Unavailable(format!("{}: {}", path.display(), e.message())))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| StageError::Unavailable(format!("{} is a bare repository", path.display())))?
            .to_path_buf();
        info!(root = %workdir.display(), "opened git stage provider");
        Ok(Self { root: workdir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo(&self) -> Result<Repository, StageError> {
        Repository::open(&self.root).map_err(|e| StageError::Unavailable(e.message().to_string()))
    }

    fn read_entry(repo: &Repository, path: &Path, entry: &IndexEntry) -> Result<Text, StageError> {
        let read_failure = |detail: String| StageError::ReadFailure {
            path: path.display().to_string(),
            detail,
        };
        let blob = repo
            .find_blob(entry.id)
            .map_err(|e| read_failure(e.message().to_string()))?;
        let content = std::str::from_utf8(blob.content())
            .map_err(|_| read_failure("stage content is not valid UTF-8".into()))?;
        Ok(Text::parse(content))
    }
}

fn entry_path(entry: &IndexEntry) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned())
}

impl StageTextProvider for GitStageProvider {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn fetch(&self, path: &Path) -> Result<StageTexts, StageError> {
        let repo = self.repo()?;
        let index = repo.index().map_err(|e| StageError::ReadFailure {
            path: path.display().to_string(),
            detail: e.message().to_string(),
        })?;

        let stage = |n: i32| {
            index
                .get_path(path, n)
                .ok_or_else(|| StageError::NotAConflict(path.display().to_string()))
        };
        let base = stage(STAGE_BASE)?;
        let ours = stage(STAGE_OURS)?;
        let theirs = stage(STAGE_THEIRS)?;

        let texts = StageTexts {
            base: Self::read_entry(&repo, path, &base)?,
            ours: Self::read_entry(&repo, path, &ours)?,
            theirs: Self::read_entry(&repo, path, &theirs)?,
            source: StageSource::Index,
        };
        debug!(
            base = texts.base.len(),
            ours = texts.ours.len(),
            theirs = texts.theirs.len(),
            "read index stages"
        );
        Ok(texts)
    }

    fn conflicted_paths(&self) -> Result<Vec<PathBuf>, StageError> {
        let repo = self.repo()?;
        let failure = |e: git2::Error| StageError::ReadFailure {
            path: self.root.display().to_string(),
            detail: e.message().to_string(),
        };
        let index = repo.index().map_err(failure)?;
        let mut paths = Vec::new();
        for conflict in index.conflicts().map_err(failure)? {
            let conflict = conflict.map_err(failure)?;
            if let (Some(ancestor), Some(_), Some(_)) = (&conflict.ancestor, &conflict.our, &conflict.their) {
                paths.push(entry_path(ancestor));
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    /// Stage the working file, which clears the conflict entries.
    #[instrument(skip(self), fields(path = %path.display()))]
    fn mark_resolved(&self, path: &Path) -> Result<(), StageError> {
        let repo = self.repo()?;
        let failure = |e: git2::Error| StageError::ReadFailure {
            path: path.display().to_string(),
            detail: e.message().to_string(),
        };
        let mut index = repo.index().map_err(failure)?;
        index.add_path(path).map_err(failure)?;
        index.write().map_err(failure)?;
        info!("conflict cleared from index");
        Ok(())
    }

    fn source(&self) -> StageSource {
        StageSource::Index
    }
}

//! Stage text providers: where Base/Ours/Theirs come from.
//!
//! The primary source is the version-control index (stages 1/2/3). When no
//! repository is available the working file's diff3 markers are parsed
//! instead.

pub mod git;
pub mod markers;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::StageError;
use crate::models::StageSource;
use crate::text::Text;

pub use git::GitStageProvider;
pub use markers::MarkerFileProvider;

/// The three texts of one conflicted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTexts {
    pub base: Text,
    pub ours: Text,
    pub theirs: Text,
    pub source: StageSource,
}

/// A backend that can produce the stage texts for a conflicted path.
///
/// Paths are relative to the provider's root.
pub trait StageTextProvider: Send + Sync {
    /// Base/Ours/Theirs for `path`; `NotAConflict` if any stage is missing.
    fn fetch(&self, path: &Path) -> Result<StageTexts, StageError>;

    /// Every path that currently has all three stages.
    fn conflicted_paths(&self) -> Result<Vec<PathBuf>, StageError>;

    /// Clear the conflict state for `path` after the merged text is written.
    fn mark_resolved(&self, path: &Path) -> Result<(), StageError> {
        let _ = path;
        Ok(())
    }

    fn source(&self) -> StageSource;
}

/// Index-backed provider with a marker-file fallback.
pub struct FallbackProvider {
    primary: Option<Box<dyn StageTextProvider>>,
    markers: MarkerFileProvider,
}

impl FallbackProvider {
    pub fn new(primary: Option<Box<dyn StageTextProvider>>, markers: MarkerFileProvider) -> Self {
        Self { primary, markers }
    }

    /// Use the git index at `root` when it opens, markers otherwise.
    pub fn discover<P: AsRef<Path>>(root: P, marker_size: usize) -> Self {
        let root = root.as_ref();
        let primary: Option<Box<dyn StageTextProvider>> = match GitStageProvider::open(root) {
            Ok(git) => Some(Box::new(git)),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "no git repository, using conflict markers");
                None
            }
        };
        Self::new(primary, MarkerFileProvider::new(root, marker_size))
    }

    fn with_fallback<T>(
        &self,
        op: &str,
        primary: impl FnOnce(&dyn StageTextProvider) -> Result<T, StageError>,
        fallback: impl FnOnce(&MarkerFileProvider) -> Result<T, StageError>,
    ) -> Result<T, StageError> {
        match &self.primary {
            Some(p) => match primary(p.as_ref()) {
                Err(StageError::Unavailable(detail)) => {
                    debug!(op, detail = %detail, "primary stage provider unavailable, falling back");
                    fallback(&self.markers)
                }
                other => other,
            },
            None => fallback(&self.markers),
        }
    }
}

impl StageTextProvider for FallbackProvider {
    fn fetch(&self, path: &Path) -> Result<StageTexts, StageError> {
        self.with_fallback("fetch", |p| p.fetch(path), |m| m.fetch(path))
    }

    fn conflicted_paths(&self) -> Result<Vec<PathBuf>, StageError> {
        self.with_fallback(
            "conflicted_paths",
            |p| p.conflicted_paths(),
            |m| m.conflicted_paths(),
        )
    }

    fn mark_resolved(&self, path: &Path) -> Result<(), StageError> {
        self.with_fallback("mark_resolved", |p| p.mark_resolved(path), |m| m.mark_resolved(path))
    }

    fn source(&self) -> StageSource {
        self.primary
            .as_ref()
            .map(|p| p.source())
            .unwrap_or(StageSource::Markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl StageTextProvider for Offline {
        fn fetch(&self, _path: &Path) -> Result<StageTexts, StageError> {
            Err(StageError::Unavailable("offline".into()))
        }
        fn conflicted_paths(&self) -> Result<Vec<PathBuf>, StageError> {
            Err(StageError::Unavailable("offline".into()))
        }
        fn source(&self) -> StageSource {
            StageSource::Index
        }
    }

    struct Clean;

    impl StageTextProvider for Clean {
        fn fetch(&self, path: &Path) -> Result<StageTexts, StageError> {
            Err(StageError::NotAConflict(path.display().to_string()))
        }
        fn conflicted_paths(&self) -> Result<Vec<PathBuf>, StageError> {
            Ok(Vec::new())
        }
        fn source(&self) -> StageSource {
            StageSource::Index
        }
    }

    const MARKED: &str = "<<<<<<< HEAD\na\n||||||| base\nb\n=======\nc\n>>>>>>> other\n";

    #[test]
    fn test_falls_back_when_primary_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), MARKED).unwrap();
        let provider = FallbackProvider::new(
            Some(Box::new(Offline)),
            MarkerFileProvider::new(dir.path(), 7),
        );
        let stages = provider.fetch(Path::new("f.txt")).unwrap();
        assert_eq!(stages.source, StageSource::Markers);
        assert_eq!(stages.ours.contents(), vec!["a"]);
        assert_eq!(provider.conflicted_paths().unwrap(), vec![PathBuf::from("f.txt")]);
    }

    #[test]
    fn test_primary_not_a_conflict_is_final() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), MARKED).unwrap();
        let provider = FallbackProvider::new(
            Some(Box::new(Clean)),
            MarkerFileProvider::new(dir.path(), 7),
        );
        assert!(matches!(
            provider.fetch(Path::new("f.txt")),
            Err(StageError::NotAConflict(_))
        ));
        assert_eq!(provider.source(), StageSource::Index);
    }

    #[test]
    fn test_discover_without_repository_uses_markers() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FallbackProvider::discover(dir.path(), 7);
        assert_eq!(provider.source(), StageSource::Markers);
    }
}

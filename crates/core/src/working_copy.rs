//! Access to the conflicted working files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::WorkingCopyError;
pub use crate::text::content_hash;

/// Read/write access to working files, addressed relative to a root.
pub trait WorkingCopy: Send + Sync {
    fn read(&self, path: &Path) -> Result<String, WorkingCopyError>;

    fn write(&self, path: &Path, contents: &str) -> Result<(), WorkingCopyError>;

    /// SHA-256 of the file, or `None` if it does not exist.
    fn hash(&self, path: &Path) -> Result<Option<String>, WorkingCopyError> {
        match self.read(path) {
            Ok(contents) => Ok(Some(content_hash(&contents))),
            Err(WorkingCopyError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Working copy on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsWorkingCopy {
    root: PathBuf,
}

impl FsWorkingCopy {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_err(path: &Path, source: std::io::Error) -> WorkingCopyError {
        WorkingCopyError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl WorkingCopy for FsWorkingCopy {
    fn read(&self, path: &Path) -> Result<String, WorkingCopyError> {
        let full = self.root.join(path);
        let bytes = std::fs::read(&full).map_err(|e| Self::io_err(path, e))?;
        String::from_utf8(bytes).map_err(|_| WorkingCopyError::NotUtf8(path.display().to_string()))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), WorkingCopyError> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::io_err(path, e))?;
        }
        std::fs::write(&full, contents).map_err(|e| Self::io_err(path, e))?;
        debug!(path = %path.display(), bytes = contents.len(), "wrote working file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_hash() {
        let dir = tempfile::tempdir().unwrap();
        let wc = FsWorkingCopy::new(dir.path());
        let path = Path::new("nested/file.txt");
        wc.write(path, "hello\n").unwrap();
        assert_eq!(wc.read(path).unwrap(), "hello\n");
        assert_eq!(wc.hash(path).unwrap(), Some(content_hash("hello\n")));
    }

    #[test]
    fn test_missing_file_has_no_hash() {
        let dir = tempfile::tempdir().unwrap();
        let wc = FsWorkingCopy::new(dir.path());
        assert_eq!(wc.hash(Path::new("absent.txt")).unwrap(), None);
        assert!(matches!(
            wc.read(Path::new("absent.txt")),
            Err(WorkingCopyError::Io { .. })
        ));
    }

    #[test]
    fn test_non_utf8_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin"), [0xff, 0xfe, 0x00]).unwrap();
        let wc = FsWorkingCopy::new(dir.path());
        assert!(matches!(
            wc.read(Path::new("bin")),
            Err(WorkingCopyError::NotUtf8(_))
        ));
    }
}

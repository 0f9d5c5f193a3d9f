use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::FetchError;

/// Receives every artifact that is ready on disk.
///
/// Called once per artifact, after the file is complete and closed. An
/// error marks the file as unusable; a cached file rejected this way is
/// fetched again once.
pub trait ArtifactLoader: Send + Sync {
    fn artifact_ready(&self, path: &Path) -> Result<(), FetchError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoader;

impl ArtifactLoader for NoopLoader {
    fn artifact_ready(&self, _path: &Path) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Collects ready artifacts into a search path for a host process, e.g. a
/// class path or a plugin path.
#[derive(Debug, Default)]
pub struct SearchPathLoader {
    entries: Mutex<Vec<PathBuf>>,
}

impl SearchPathLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<PathBuf> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Entries joined with the platform path separator.
    pub fn search_path(&self) -> Result<OsString, FetchError> {
        std::env::join_paths(self.entries())
            .map_err(|err| FetchError::Filesystem(err.to_string()))
    }
}

impl ArtifactLoader for SearchPathLoader {
    fn artifact_ready(&self, path: &Path) -> Result<(), FetchError> {
        let absolute = std::path::absolute(path).map_err(|err| FetchError::Loader {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|err| FetchError::Loader {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        if !entries.contains(&absolute) {
            entries.push(absolute);
        }
        Ok(())
    }
}

impl<L: ArtifactLoader + ?Sized> ArtifactLoader for std::sync::Arc<L> {
    fn artifact_ready(&self, path: &Path) -> Result<(), FetchError> {
        (**self).artifact_ready(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_path_keeps_order_without_duplicates() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.jar");
        let b = temp.path().join("b.jar");
        let loader = SearchPathLoader::new();
        loader.artifact_ready(&a).unwrap();
        loader.artifact_ready(&b).unwrap();
        loader.artifact_ready(&a).unwrap();

        assert_eq!(loader.entries(), vec![a, b]);
        let joined = loader.search_path().unwrap();
        assert!(joined.to_string_lossy().contains("b.jar"));
    }
}

//! Temporary engine output documents.
//!
//! The engine writes its executed copy of a notebook next to the source so
//! relative data references keep working. [`TempArtifact`] owns that file
//! and removes it when dropped, whichever way the case ends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CleanupWarning;

/// Default prefix for temporary output documents.
pub const DEFAULT_OUTPUT_PREFIX: &str = "output_";

/// Extension the engine appends to the output prefix.
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Scoped ownership of a temporary output document.
#[derive(Debug)]
pub struct TempArtifact {
    /// Directory the engine writes into (the notebook's own directory).
    dir: PathBuf,
    /// Output prefix handed to the engine (file name without extension).
    prefix: String,
    /// Set once removal has been attempted.
    released: bool,
}

impl TempArtifact {
    /// Reserve a unique artifact name for one invocation on `notebook`.
    ///
    /// The name is `<prefix><stem>_<token>`, where `token` is fresh per
    /// call, so notebooks sharing a base name in different directories, or
    /// a rerun after a crashed case, never collide.
    pub fn for_notebook(notebook: &Path, prefix: &str) -> Self {
        let dir = notebook
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let stem = notebook
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "notebook".to_string());
        let token = uuid::Uuid::new_v4().simple().to_string();

        Self {
            dir,
            prefix: format!("{prefix}{stem}_{}", &token[..8]),
            released: false,
        }
    }

    /// The output prefix to pass to the engine.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The directory the engine writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the document the engine will write.
    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.prefix, NOTEBOOK_EXTENSION))
    }

    /// Remove the document now.
    ///
    /// A document that was never produced is not an error. Any other failure
    /// is returned as a [`CleanupWarning`] and logged.
    pub fn release(&mut self) -> Option<CleanupWarning> {
        if self.released {
            return None;
        }
        self.released = true;

        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed temporary document {}", path.display());
                None
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                let warning = CleanupWarning {
                    path,
                    message: e.to_string(),
                };
                tracing::warn!("{}", warning);
                Some(warning)
            }
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_name_derived_from_notebook() {
        let artifact = TempArtifact::for_notebook(Path::new("/data/X/run.ipynb"), "output_");
        assert_eq!(artifact.dir(), Path::new("/data/X"));
        assert!(artifact.prefix().starts_with("output_run_"));
        assert_eq!(artifact.prefix().len(), "output_run_".len() + 8);
        assert_eq!(artifact.path().extension().unwrap(), "ipynb");
    }

    #[test]
    fn test_bare_file_name_uses_current_dir() {
        let artifact = TempArtifact::for_notebook(Path::new("run.ipynb"), "tmp_");
        assert_eq!(artifact.dir(), Path::new("."));
    }

    #[test]
    fn test_same_base_name_never_collides() {
        let x = TempArtifact::for_notebook(Path::new("X/run.ipynb"), DEFAULT_OUTPUT_PREFIX);
        let y = TempArtifact::for_notebook(Path::new("Y/run.ipynb"), DEFAULT_OUTPUT_PREFIX);
        let again = TempArtifact::for_notebook(Path::new("X/run.ipynb"), DEFAULT_OUTPUT_PREFIX);
        assert_ne!(x.prefix(), y.prefix());
        assert_ne!(x.path(), again.path());
    }

    #[test]
    fn test_drop_removes_file() {
        let temp = TempDir::new().unwrap();
        let notebook = temp.path().join("nb.ipynb");

        let path = {
            let artifact = TempArtifact::for_notebook(&notebook, DEFAULT_OUTPUT_PREFIX);
            fs::write(artifact.path(), "{}").unwrap();
            assert!(artifact.path().exists());
            artifact.path()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_release_missing_file_is_quiet() {
        let temp = TempDir::new().unwrap();
        let mut artifact =
            TempArtifact::for_notebook(&temp.path().join("nb.ipynb"), DEFAULT_OUTPUT_PREFIX);
        assert!(artifact.release().is_none());
        assert!(artifact.release().is_none());
    }

    #[test]
    fn test_release_failure_is_a_warning() {
        let temp = TempDir::new().unwrap();
        let mut artifact =
            TempArtifact::for_notebook(&temp.path().join("nb.ipynb"), DEFAULT_OUTPUT_PREFIX);
        // A directory in place of the file makes remove_file fail.
        fs::create_dir(artifact.path()).unwrap();

        let warning = artifact.release().expect("expected a cleanup warning");
        assert_eq!(warning.path, artifact.path());
    }
}

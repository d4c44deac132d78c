//! Error types for nbverify-core.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::extract::ExecutionError;

/// Result type for nbverify-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while verifying a notebook.
///
/// Every variant is fatal for the case it occurred in and for nothing else;
/// the suite moves on to the next case.
#[derive(Debug, Error)]
pub enum Error {
    /// The execution engine ran but exited with a nonzero status.
    #[error("execution engine failed on {notebook} (exit code {}): {stderr}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    Invocation {
        notebook: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The execution engine could not be started.
    #[error("failed to start execution engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The persisted document is missing, malformed or of an unsupported format.
    #[error("failed to parse notebook document {path}: {message}")]
    DocumentParse { path: PathBuf, message: String },

    /// One or more cells reported a runtime error.
    #[error("{} cell error(s) in {notebook}: {}", errors.len(), summarize(errors))]
    CellErrors {
        notebook: PathBuf,
        errors: Vec<ExecutionError>,
    },

    /// The notebook was expected to produce cell errors but ran clean.
    #[error("expected cell errors in {notebook}, but it ran clean")]
    UnexpectedSuccess { notebook: PathBuf },

    /// The case exceeded its deadline and the engine was killed.
    #[error("execution of {notebook} timed out after {after:?}")]
    TimedOut { notebook: PathBuf, after: Duration },

    /// The case was cancelled and the engine was killed.
    #[error("execution of {notebook} was cancelled")]
    Cancelled { notebook: PathBuf },

    /// The notebook path does not exist.
    #[error("notebook not found: {}", .0.display())]
    NotebookNotFound(PathBuf),

    /// Invalid registry contents.
    #[error("registry error: {0}")]
    Registry(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn summarize(errors: &[ExecutionError]) -> String {
    errors
        .iter()
        .map(|e| format!("cell {} {}: {}", e.cell_index, e.ename, e.evalue))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Render the error together with a recovery hint, if one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Spawn { .. } => {
                Some("is jupyter installed? set [engine] program in the registry or pass --engine")
            }
            Error::Invocation { .. } => {
                Some("check that the kernel exists (`jupyter kernelspec list`) and the notebook is valid JSON")
            }
            Error::TimedOut { .. } => Some("raise timeout_secs for this notebook, or 0 to disable"),
            Error::NotebookNotFound(_) => {
                Some("notebook paths are resolved relative to the registry file")
            }
            Error::DocumentParse { .. } => {
                Some("the document is missing, truncated, or not nbformat 4")
            }
            _ => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

/// A temporary artifact that could not be removed.
///
/// Logged and attached to the case outcome; never a failure on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    /// Artifact that was left behind.
    pub path: PathBuf,
    /// Why removal failed.
    pub message: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not remove temporary document {}: {}",
            self.path.display(),
            self.message
        )
    }
}

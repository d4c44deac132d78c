//! Verification cases.
//!
//! One case checks one notebook:
//!
//! ```text
//! Pending ─► Invoking ─► Loading ─► Extracting ─► Cleaning ─► Passed | Failed
//!               │           │                        ▲
//!               └───────────┴────── on error ────────┘
//! ```
//!
//! Cleaning runs on every path before the outcome is reported.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::artifact::TempArtifact;
use crate::document::NotebookDocument;
use crate::error::{CleanupWarning, Error, Result};
use crate::extract::{ExecutionError, extract_errors};
use crate::invoke::Invoker;

/// What a notebook is expected to do when executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    /// No cell produces an error output.
    #[default]
    Clean,
    /// At least one cell produces an error output.
    Errors,
}

/// Lifecycle phase of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CasePhase {
    Pending,
    Invoking,
    Loading,
    Extracting,
    Cleaning,
    Passed,
    Failed,
}

impl fmt::Display for CasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CasePhase::Pending => "pending",
            CasePhase::Invoking => "invoking",
            CasePhase::Loading => "loading",
            CasePhase::Extracting => "extracting",
            CasePhase::Cleaning => "cleaning",
            CasePhase::Passed => "passed",
            CasePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Receives progress from running cases.
pub trait CaseObserver: Send + Sync {
    /// Called on every phase transition.
    fn on_phase(&self, case: &VerificationCase, phase: CasePhase);

    /// Called once the case has a final outcome.
    fn on_finished(&self, _outcome: &CaseOutcome) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl CaseObserver for NoopObserver {
    fn on_phase(&self, _case: &VerificationCase, _phase: CasePhase) {}
}

/// One notebook under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCase {
    /// Case name, unique within a registry.
    pub name: String,
    /// Path to the notebook.
    pub notebook: PathBuf,
    /// Expected outcome.
    pub expect: Expectation,
    /// Deadline for the engine; `None` is unbounded.
    pub timeout: Option<Duration>,
}

/// Final state of a case.
#[derive(Debug)]
pub enum CaseStatus {
    Passed,
    Failed(Error),
    /// Excluded by the registry; never executed.
    Skipped,
}

/// Result of running one case.
#[derive(Debug)]
pub struct CaseOutcome {
    /// Case name.
    pub name: String,
    /// Notebook path.
    pub notebook: PathBuf,
    /// Final status.
    pub status: CaseStatus,
    /// Error outputs found in the executed document, in document order.
    pub errors: Vec<ExecutionError>,
    /// Set when the temporary document could not be removed.
    pub cleanup_warning: Option<CleanupWarning>,
    /// Wall-clock time of the case.
    pub elapsed: Duration,
}

impl CaseOutcome {
    /// Outcome for a case that was excluded from the run.
    pub fn skipped(case: &VerificationCase) -> Self {
        Self {
            name: case.name.clone(),
            notebook: case.notebook.clone(),
            status: CaseStatus::Skipped,
            errors: Vec::new(),
            cleanup_warning: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self.status, CaseStatus::Passed)
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, CaseStatus::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, CaseStatus::Skipped)
    }

    /// The failure, if the case failed.
    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            CaseStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl VerificationCase {
    /// Create a case expecting a clean run, named after the notebook's stem.
    pub fn new(notebook: impl Into<PathBuf>) -> Self {
        let notebook = notebook.into();
        Self {
            name: default_case_name(&notebook),
            notebook,
            expect: Expectation::Clean,
            timeout: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_expectation(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the case to completion.
    ///
    /// Never returns early: every failure becomes a `Failed` outcome, and
    /// the temporary document is removed before this returns.
    pub fn run(&self, invoker: &Invoker, observer: &dyn CaseObserver) -> CaseOutcome {
        let start = Instant::now();
        observer.on_phase(self, CasePhase::Pending);
        tracing::info!("Verifying {} ({})", self.name, self.notebook.display());

        let mut artifact =
            TempArtifact::for_notebook(&self.notebook, &invoker.config().output_prefix);

        let mut errors = Vec::new();
        let result = self.execute(invoker, &artifact, observer, &mut errors);

        observer.on_phase(self, CasePhase::Cleaning);
        let cleanup_warning = artifact.release();

        let status = match result {
            Ok(()) => {
                observer.on_phase(self, CasePhase::Passed);
                CaseStatus::Passed
            }
            Err(e) => {
                observer.on_phase(self, CasePhase::Failed);
                CaseStatus::Failed(e)
            }
        };

        let outcome = CaseOutcome {
            name: self.name.clone(),
            notebook: self.notebook.clone(),
            status,
            errors,
            cleanup_warning,
            elapsed: start.elapsed(),
        };

        match outcome.error() {
            None => tracing::info!(
                "{} passed in {:.2}s",
                self.name,
                outcome.elapsed.as_secs_f64()
            ),
            Some(e) => tracing::info!("{} failed: {}", self.name, e),
        }
        observer.on_finished(&outcome);
        outcome
    }

    /// Invoke, load and extract. `errors` receives the extracted list even
    /// when the case then fails on it.
    fn execute(
        &self,
        invoker: &Invoker,
        artifact: &TempArtifact,
        observer: &dyn CaseObserver,
        errors: &mut Vec<ExecutionError>,
    ) -> Result<()> {
        observer.on_phase(self, CasePhase::Invoking);
        invoker.invoke(&self.notebook, artifact, self.timeout)?;

        observer.on_phase(self, CasePhase::Loading);
        let document = NotebookDocument::read_from_file(artifact.path())?;

        observer.on_phase(self, CasePhase::Extracting);
        *errors = extract_errors(&document);
        tracing::debug!("{}: {} error output(s)", self.name, errors.len());

        match (self.expect, errors.is_empty()) {
            (Expectation::Clean, true) | (Expectation::Errors, false) => Ok(()),
            (Expectation::Clean, false) => Err(Error::CellErrors {
                notebook: self.notebook.clone(),
                errors: errors.clone(),
            }),
            (Expectation::Errors, true) => Err(Error::UnexpectedSuccess {
                notebook: self.notebook.clone(),
            }),
        }
    }
}

/// Case name derived from a notebook path: its file stem.
pub fn default_case_name(notebook: &Path) -> String {
    notebook
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| notebook.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::invoke::EngineConfig;

    #[derive(Default)]
    struct Recorder {
        phases: Mutex<Vec<CasePhase>>,
    }

    impl CaseObserver for Recorder {
        fn on_phase(&self, _case: &VerificationCase, phase: CasePhase) {
            self.phases.lock().unwrap().push(phase);
        }
    }

    #[test]
    fn test_builder() {
        let case = VerificationCase::new("example_usage/intro.ipynb")
            .with_expectation(Expectation::Errors)
            .with_timeout(Some(Duration::from_secs(3)));
        assert_eq!(case.name, "intro");
        assert_eq!(case.expect, Expectation::Errors);
        assert_eq!(case.timeout, Some(Duration::from_secs(3)));
        assert_eq!(case.with_name("renamed").name, "renamed");
    }

    #[test]
    fn test_missing_notebook_fails_after_cleaning() {
        let temp = tempfile::TempDir::new().unwrap();
        let case = VerificationCase::new(temp.path().join("gone.ipynb"));
        let recorder = Recorder::default();

        let outcome = case.run(&Invoker::new(EngineConfig::default()), &recorder);

        assert!(outcome.failed());
        assert!(matches!(outcome.error(), Some(Error::NotebookNotFound(_))));
        assert_eq!(
            *recorder.phases.lock().unwrap(),
            [
                CasePhase::Pending,
                CasePhase::Invoking,
                CasePhase::Cleaning,
                CasePhase::Failed
            ]
        );
    }

    #[test]
    fn test_skipped_outcome() {
        let case = VerificationCase::new("a.ipynb");
        let outcome = CaseOutcome::skipped(&case);
        assert!(outcome.is_skipped());
        assert!(!outcome.passed());
        assert!(!outcome.failed());
    }

    #[test]
    fn test_expectation_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            expect: Expectation,
        }
        let w: Wrapper = toml::from_str("expect = \"errors\"").unwrap();
        assert_eq!(w.expect, Expectation::Errors);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(CasePhase::Extracting.to_string(), "extracting");
    }
}

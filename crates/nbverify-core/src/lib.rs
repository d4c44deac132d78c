//! Notebook verification engine.
//!
//! Executes notebooks through an external engine (`jupyter nbconvert`) and
//! checks the executed documents for cell errors.
//!
//! # Architecture
//!
//! ```text
//! Registry ──► Suite ──► VerificationCase ──► Invoker ──► output_<stem>_<id>.ipynb
//!                               │                                  │
//!                               │                                  ▼
//!                               │                          NotebookDocument
//!                               │                                  │
//!                               ▼                                  ▼
//!                         TempArtifact (removed)  ◄──────   extract_errors
//! ```

pub mod artifact;
pub mod case;
pub mod document;
pub mod error;
pub mod extract;
pub mod invoke;
pub mod registry;
pub mod suite;

pub use artifact::TempArtifact;
pub use case::{
    CaseObserver, CaseOutcome, CasePhase, CaseStatus, Expectation, NoopObserver, VerificationCase,
};
pub use document::{Cell, MultilineText, NotebookDocument, Output};
pub use error::{CleanupWarning, Error, Result};
pub use extract::{ExecutionError, extract_errors};
pub use invoke::{CancelToken, EngineConfig, Invoker};
pub use registry::{DEFAULT_REGISTRY_FILE, RegisteredCase, Registry, RegistryFile};
pub use suite::{Suite, SuiteReport};

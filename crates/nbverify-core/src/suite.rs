//! Suite execution.
//!
//! Runs every case of a registry and collects the outcomes in registry
//! order. Cases are independent: a failure only affects its own case.

use rayon::prelude::*;

use crate::case::{CaseObserver, CaseOutcome, NoopObserver};
use crate::error::{Error, Result};
use crate::invoke::{CancelToken, Invoker};
use crate::registry::{RegisteredCase, Registry};

/// A registry ready to run.
pub struct Suite {
    registry: Registry,
    jobs: usize,
    cancel: CancelToken,
    observer: Box<dyn CaseObserver>,
}

/// Outcomes of a suite run, in registry order.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub outcomes: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    /// True when no case failed.
    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Failed outcomes, in registry order.
    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| o.failed())
    }
}

impl Suite {
    /// Create a sequential suite.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            jobs: 1,
            cancel: CancelToken::new(),
            observer: Box::new(NoopObserver),
        }
    }

    /// Run up to `jobs` cases at once. Values below 1 are treated as 1.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Share a cancellation token with the suite.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress to `observer`.
    pub fn with_observer(mut self, observer: impl CaseObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Run every case.
    ///
    /// Once the cancel token fires, the running case's engine is killed and
    /// the remaining cases finish immediately as `Cancelled`.
    pub fn run(&self) -> Result<SuiteReport> {
        let invoker =
            Invoker::new(self.registry.engine.clone()).with_cancel_token(self.cancel.clone());

        tracing::info!(
            "Running {} case(s) with {} job(s)",
            self.registry.cases.len(),
            self.jobs
        );

        let outcomes: Vec<CaseOutcome> = if self.jobs == 1 {
            self.registry
                .cases
                .iter()
                .map(|registered| self.run_one(&invoker, registered))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            // par_iter().collect() keeps the input order.
            pool.install(|| {
                self.registry
                    .cases
                    .par_iter()
                    .map(|registered| self.run_one(&invoker, registered))
                    .collect()
            })
        };

        Ok(SuiteReport { outcomes })
    }

    fn run_one(&self, invoker: &Invoker, registered: &RegisteredCase) -> CaseOutcome {
        if registered.skip {
            tracing::info!("Skipping excluded case {}", registered.case.name);
            let outcome = CaseOutcome::skipped(&registered.case);
            self.observer.on_finished(&outcome);
            return outcome;
        }
        registered.case.run(invoker, self.observer.as_ref())
    }
}

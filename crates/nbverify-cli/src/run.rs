//! Run command implementation for nbverify CLI.
//!
//! Executes every registered notebook and reports cell errors.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use nbverify_core::{CancelToken, Registry, Suite};

use crate::colors;
use crate::report::{ConsoleObserver, print_failures, print_summary};

/// Options of the `run` command.
pub struct RunOptions {
    pub notebooks: Vec<PathBuf>,
    pub registry: PathBuf,
    pub jobs: usize,
    pub timeout: Option<u64>,
    pub kernel: Option<String>,
    pub engine: Option<String>,
    pub filter: Option<String>,
}

/// Build the registry: positional notebooks win over the registry file.
fn load_registry(options: &RunOptions) -> anyhow::Result<Registry> {
    let mut registry = if options.notebooks.is_empty() {
        if !options.registry.exists() {
            anyhow::bail!(
                "Registry not found: {} (pass notebooks explicitly or create one)",
                options.registry.display()
            );
        }
        Registry::load(&options.registry)?
    } else {
        Registry::from_paths(options.notebooks.iter().cloned())?
    };

    if let Some(secs) = options.timeout {
        registry.set_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    if let Some(kernel) = &options.kernel {
        registry.engine.kernel = kernel.clone();
    }
    if let Some(engine) = &options.engine {
        registry.engine.program = engine.clone();
    }
    if let Some(filter) = &options.filter {
        registry.retain_matching(filter);
    }

    Ok(registry)
}

/// Execute the run command.
pub async fn execute(options: RunOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    let registry = load_registry(&options)?;

    println!(
        "\n{}nbverify{} - {} notebook(s), kernel {}{}{}",
        colors::BOLD,
        colors::RESET,
        registry.cases.len(),
        colors::CYAN,
        registry.engine.kernel,
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    let cancel = CancelToken::new();
    let suite = Suite::new(registry)
        .with_jobs(options.jobs)
        .with_cancel_token(cancel.clone())
        .with_observer(ConsoleObserver);

    // Ctrl+C kills the running engine; the suite still cleans up and reports.
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{}Interrupted{} - stopping notebook execution",
                colors::YELLOW,
                colors::RESET
            );
            cancel.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || suite.run()).await??;
    signal.abort();

    print_failures(&report);
    print_summary(&report, start.elapsed());

    if !report.success() {
        anyhow::bail!(
            "{} of {} notebook(s) failed",
            report.failed(),
            report.outcomes.len()
        );
    }

    Ok(())
}

//! nbverify CLI - verify that notebooks execute without errors.

mod check;
mod colors;
mod list;
mod report;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nbverify")]
#[command(about = "Execute notebooks and fail on any cell error")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute registered notebooks and check them for cell errors
    Run {
        /// Notebooks to run instead of the registry's list
        notebooks: Vec<PathBuf>,

        /// Registry file
        #[arg(short, long, default_value = nbverify_core::DEFAULT_REGISTRY_FILE)]
        registry: PathBuf,

        /// Number of notebooks to execute at once
        #[arg(short, long, default_value = "1")]
        jobs: usize,

        /// Per-notebook deadline in seconds (0 = unbounded)
        #[arg(long)]
        timeout: Option<u64>,

        /// Kernel to execute notebooks with
        #[arg(long)]
        kernel: Option<String>,

        /// Execution engine program
        #[arg(long)]
        engine: Option<String>,

        /// Only run cases whose name contains this string
        #[arg(long)]
        filter: Option<String>,
    },

    /// List registered notebooks
    List {
        /// Registry file
        #[arg(short, long, default_value = nbverify_core::DEFAULT_REGISTRY_FILE)]
        registry: PathBuf,
    },

    /// Check an already executed notebook document for error outputs
    Check {
        /// Path to the executed .ipynb document
        document: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Helper to format nbverify-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<nbverify_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            notebooks,
            registry,
            jobs,
            timeout,
            kernel,
            engine,
            filter,
        } => {
            let options = run::RunOptions {
                notebooks,
                registry,
                jobs,
                timeout,
                kernel,
                engine,
                filter,
            };
            run::execute(options).await.map_err(format_error)?;
        }

        Commands::List { registry } => list::execute(&registry).map_err(format_error)?,

        Commands::Check { document } => check::execute(&document).map_err(format_error)?,
    }

    Ok(())
}

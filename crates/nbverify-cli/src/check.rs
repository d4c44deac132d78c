//! Check command implementation for nbverify CLI.
//!
//! Inspects an already executed document without running the engine.

use std::path::Path;

use nbverify_core::{NotebookDocument, extract_errors};

use crate::colors;
use crate::report::print_cell_errors;

/// Execute the check command.
pub fn execute(document_path: &Path) -> anyhow::Result<()> {
    let document = NotebookDocument::read_from_file(document_path)?;
    let errors = extract_errors(&document);

    if errors.is_empty() {
        println!(
            "{}✓{} {} ({} cells, no errors)",
            colors::GREEN,
            colors::RESET,
            document_path.display(),
            document.cells.len()
        );
        return Ok(());
    }

    println!(
        "{}✗{} {}",
        colors::RED,
        colors::RESET,
        document_path.display()
    );
    print_cell_errors(&errors);
    anyhow::bail!(
        "{} error output(s) in {}",
        errors.len(),
        document_path.display()
    )
}

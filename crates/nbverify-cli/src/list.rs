//! List command implementation for nbverify CLI.

use std::path::Path;

use nbverify_core::Registry;

use crate::colors;

/// Execute the list command.
pub fn execute(registry_path: &Path) -> anyhow::Result<()> {
    if !registry_path.exists() {
        anyhow::bail!("Registry not found: {}", registry_path.display());
    }
    let registry = Registry::load(registry_path)?;

    for registered in &registry.cases {
        let case = &registered.case;
        let timeout = case
            .timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "unbounded".to_string());
        let skipped = if registered.skip {
            format!(" {}[skipped]{}", colors::YELLOW, colors::RESET)
        } else {
            String::new()
        };

        println!(
            "{}{}{} {} {}(expect {:?}, timeout {}){}{}",
            colors::BOLD,
            case.name,
            colors::RESET,
            case.notebook.display(),
            colors::DIM,
            case.expect,
            timeout,
            colors::RESET,
            skipped
        );
    }

    Ok(())
}

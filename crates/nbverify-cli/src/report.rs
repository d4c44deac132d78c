//! Console reporting of case outcomes.

use std::time::Duration;

use nbverify_core::{
    CaseObserver, CaseOutcome, CasePhase, Error, ExecutionError, SuiteReport, VerificationCase,
};

use crate::colors;

/// Prints one line per finished case.
pub struct ConsoleObserver;

impl CaseObserver for ConsoleObserver {
    fn on_phase(&self, case: &VerificationCase, phase: CasePhase) {
        tracing::debug!("{}: {}", case.name, phase);
    }

    fn on_finished(&self, outcome: &CaseOutcome) {
        print_outcome_line(outcome);
    }
}

fn print_outcome_line(outcome: &CaseOutcome) {
    let (mark, color) = if outcome.passed() {
        ("✓", colors::GREEN)
    } else if outcome.is_skipped() {
        ("-", colors::YELLOW)
    } else {
        ("✗", colors::RED)
    };

    let detail = if outcome.is_skipped() {
        "skipped".to_string()
    } else {
        format!("{:.2}s", outcome.elapsed.as_secs_f64())
    };

    println!(
        "  {}{}{} {} {}({}){}",
        color,
        mark,
        colors::RESET,
        outcome.name,
        colors::DIM,
        detail,
        colors::RESET
    );

    if let Some(warning) = &outcome.cleanup_warning {
        println!("    {}warning:{} {}", colors::YELLOW, colors::RESET, warning);
    }
}

/// Print the failing cells of a document, earliest first.
pub fn print_cell_errors(errors: &[ExecutionError]) {
    for error in errors {
        println!(
            "    cell {}: {}{}{}: {}",
            error.cell_index,
            colors::BOLD,
            error.ename,
            colors::RESET,
            error.evalue
        );
    }
}

/// Print the details of every failed case.
pub fn print_failures(report: &SuiteReport) {
    for outcome in report.failures() {
        println!(
            "\n{}FAILED{} {} ({})",
            colors::RED,
            colors::RESET,
            outcome.name,
            outcome.notebook.display()
        );

        match outcome.error() {
            Some(Error::CellErrors { errors, .. }) => print_cell_errors(errors),
            Some(err) => {
                for line in err.with_hint().lines() {
                    println!("    {line}");
                }
            }
            None => {}
        }
    }
}

/// Print the closing summary line.
pub fn print_summary(report: &SuiteReport, elapsed: Duration) {
    println!("\n{}", "─".repeat(50));
    let color = if report.success() {
        colors::GREEN
    } else {
        colors::RED
    };
    println!(
        "{}{} passed{}, {} failed, {} skipped in {:.2}s",
        color,
        report.passed(),
        colors::RESET,
        report.failed(),
        report.skipped(),
        elapsed.as_secs_f64()
    );
}

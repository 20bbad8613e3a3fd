//! Report rendering for the `shipcheck` CLI.
//!
//! Diagnostics go to the error stream prefixed `error[code]:` or
//! `warning[code]:`; progress and the closing summary go to the standard
//! stream.

use crate::pipeline::{Outcome, RunReport};
use shipcheck_common::{Diagnostic, DiagnosticCode};
use std::fmt::Display;
use std::io::Write;

/// Writes one line to `out`, ignoring write failures.
pub fn write_line(out: &mut dyn Write, message: impl Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Formats the closing summary line.
///
/// # Examples
///
/// ```
/// use shipcheck_verifier::output::summary_message;
///
/// assert_eq!(
///     summary_message(2, 1, 0),
///     "Verified 2 artefacts: 1 error, 0 warnings"
/// );
/// ```
#[must_use]
pub fn summary_message(artefacts: usize, errors: usize, warnings: usize) -> String {
    format!(
        "Verified {artefacts} {}: {errors} {}, {warnings} {}",
        plural(artefacts, "artefact", "artefacts"),
        plural(errors, "error", "errors"),
        plural(warnings, "warning", "warnings"),
    )
}

const fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

/// Writes every finding in `report` to `stderr` and, unless `quiet`, the
/// summary line to `stdout`.
///
/// An artefact that could not be inspected is rendered as an
/// `inspection-failed` error naming the artefact.
pub fn write_report(
    report: &RunReport,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    quiet: bool,
) {
    for diagnostic in &report.requirement_diagnostics {
        write_line(stderr, diagnostic);
    }
    for artefact in &report.artefacts {
        match &artefact.outcome {
            Outcome::Inspected(diagnostics) => {
                for diagnostic in diagnostics {
                    write_line(stderr, diagnostic);
                }
            }
            Outcome::Failed(err) => write_line(
                stderr,
                Diagnostic::error(
                    DiagnosticCode::InspectionFailed,
                    format!("{} could not be inspected", artefact.artefact.display_name()),
                )
                .at(artefact.artefact.path().as_str())
                .with_context(err.to_string()),
            ),
        }
    }

    if !quiet {
        let (errors, warnings) = report.counts();
        write_line(
            stdout,
            summary_message(report.artefacts.len(), errors, warnings),
        );
    }
}

//! Health evaluation: the gate between conversion and persistence.
//!
//! After conversion, math rendering and partitioning, the evaluator folds
//! everything the earlier stages observed into one [`HealthReport`]. The
//! report both informs (warnings, counts) and decides: when `halted` is
//! true the orchestrator stops before artifacts, uploads or database
//! writes, so a defective manuscript can never reach readers.
//!
//! The halt rule is deliberately narrow. Math render failures and
//! unsupported-command diagnostics halt; plain pandoc warnings never do,
//! because real manuscripts produce them constantly (missing images in
//! draft trees, duplicate labels) and halting on them would make the
//! pipeline unusable.

use serde::Serialize;

use crate::error::MathError;
use crate::format::SourceFormat;

/// The structured outcome of evaluating one conversion.
///
/// Serialized to JSON into the job-status record when a run halts, and
/// rendered human-readable (see [`HealthReport::render`]) for logs and the
/// CLI.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// File name of the manuscript, for operator context.
    pub input_file: String,
    /// Detected (or overridden) source format.
    pub format: SourceFormat,
    /// Pandoc stderr lines, verbatim, in emission order.
    pub pandoc_warnings: Vec<String>,
    /// Math expressions that failed to render.
    pub math_errors: Vec<MathError>,
    /// Stderr lines diagnosing constructs the converter could not handle.
    pub unsupported_commands: Vec<String>,
    /// Number of chapters the partitioner produced.
    pub chapter_count: usize,
    /// Whether the run must stop before persistence.
    pub halted: bool,
}

/// Evaluate one conversion's observations into a report.
///
/// `stderr` is the external tool's raw standard error. Every non-empty line
/// is kept verbatim as a warning; lines whose lowercase form contains
/// "unknown" or "not supported" are additionally classified as
/// unsupported-command diagnostics. The run halts iff any math error or any
/// unsupported-command diagnostic exists.
pub fn evaluate(
    input_file: &str,
    format: SourceFormat,
    stderr: &str,
    math_errors: Vec<MathError>,
    chapter_count: usize,
) -> HealthReport {
    let pandoc_warnings: Vec<String> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let unsupported_commands: Vec<String> = pandoc_warnings
        .iter()
        .filter(|l| {
            let lower = l.to_lowercase();
            lower.contains("unknown") || lower.contains("not supported")
        })
        .cloned()
        .collect();

    let halted = !math_errors.is_empty() || !unsupported_commands.is_empty();

    HealthReport {
        input_file: input_file.to_string(),
        format,
        pandoc_warnings,
        math_errors,
        unsupported_commands,
        chapter_count,
        halted,
    }
}

impl HealthReport {
    /// Human-readable rendering for logs, the CLI and the
    /// [`crate::error::IngestError::HealthHalted`] message.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Health report for '{}' ({}): {}\n",
            self.input_file,
            self.format,
            if self.halted { "HALTED" } else { "ok" }
        ));
        out.push_str(&format!("  chapters: {}\n", self.chapter_count));

        if self.math_errors.is_empty() {
            out.push_str("  math errors: none\n");
        } else {
            out.push_str(&format!("  math errors: {}\n", self.math_errors.len()));
            for e in &self.math_errors {
                out.push_str(&format!("    - {e}\n"));
            }
        }

        if self.unsupported_commands.is_empty() {
            out.push_str("  unsupported constructs: none\n");
        } else {
            out.push_str(&format!(
                "  unsupported constructs: {}\n",
                self.unsupported_commands.len()
            ));
            for l in &self.unsupported_commands {
                out.push_str(&format!("    - {l}\n"));
            }
        }

        if !self.pandoc_warnings.is_empty() {
            out.push_str(&format!("  warnings: {}\n", self.pandoc_warnings.len()));
            for l in &self.pandoc_warnings {
                out.push_str(&format!("    - {l}\n"));
            }
        }

        out
    }
}

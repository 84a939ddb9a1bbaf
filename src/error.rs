//! Error types for the pressmill library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the ingestion run cannot proceed at all
//!   (unsupported format, pandoc exited non-zero, health gate tripped,
//!   persistence failed). Returned as `Err(IngestError)` from
//!   [`crate::ingest::IngestPipeline::run`].
//!
//! * [`MathError`] — **Non-fatal**: a single math expression failed to
//!   render. The expression is replaced in place with a visible marker and
//!   the error is collected in [`crate::pipeline::math::MathRenderOutcome`],
//!   so a manuscript with a handful of bad equations stays reviewable
//!   instead of blocking the whole ingest.
//!
//! The separation matters because math errors feed the health evaluator:
//! locally non-fatal, they can still trip the aggregate halt gate before
//! anything is persisted.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::health::HealthReport;

/// All fatal errors returned by the pressmill library.
///
/// Per-expression math failures use [`MathError`] and are folded into
/// result data rather than propagated here.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The file extension maps to no supported manuscript format.
    #[error("Unsupported manuscript format '.{extension}' for '{}'\nSupported: .tex (LaTeX), .docx (Word), .md/.markdown (Markdown).", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Source manuscript was not found at the given path.
    #[error("Manuscript not found: '{}'\nCheck the path exists and is readable.", .path.display())]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the manuscript.
    #[error("Permission denied reading '{}'", .path.display())]
    PermissionDenied { path: PathBuf },

    /// A remote source object could not be fetched from storage.
    #[error("Failed to fetch source object '{key}': {detail}")]
    FetchFailed { key: String, detail: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The external conversion tool exited non-zero, could not be spawned,
    /// or exceeded the configured timeout.
    #[error("Document conversion failed: {detail}")]
    ConversionFailed { detail: String },

    // ── Health gate ───────────────────────────────────────────────────────
    /// The health evaluator refused to let the run proceed to persistence.
    ///
    /// Carries the full structured report so the operator can decide what
    /// to fix in the source manuscript without re-running.
    #[error("Ingestion halted by health evaluation\n{}", .report.render())]
    HealthHalted { report: HealthReport },

    // ── Storage / persistence errors ──────────────────────────────────────
    /// Artifact upload failed and upload was not skipped.
    #[error("Failed to upload artifact '{key}': {detail}")]
    UploadFailed { key: String, detail: String },

    /// The target document does not exist (or is not ingestable).
    #[error("Document '{id}' not found — nothing to ingest into")]
    DocumentNotFound { id: uuid::Uuid },

    /// The chapter-replace / artifact-keys transaction failed.
    #[error("Persistence failed: {detail}")]
    PersistenceFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Whether a math expression renders inline with the text or as a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathMode {
    Inline,
    Display,
}

impl MathMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MathMode::Inline => "inline",
            MathMode::Display => "display",
        }
    }
}

/// A non-fatal render failure for a single math expression.
///
/// The corresponding span in the output HTML is replaced with a visible
/// `[MATH ERROR]` marker carrying the raw source, never removed.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("{} math error: {message} (source: {source_tex})", .mode.as_str())]
pub struct MathError {
    /// Inline or display mode of the failing expression.
    pub mode: MathMode,
    /// The renderer's message naming the defect.
    pub message: String,
    /// The span's original raw source, before delimiter stripping.
    pub source_tex: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_names_extension_and_path() {
        let e = IngestError::UnsupportedFormat {
            path: PathBuf::from("notes.TXT"),
            extension: "txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".txt"), "got: {msg}");
        assert!(msg.contains("notes.TXT"), "got: {msg}");
    }

    #[test]
    fn conversion_failed_carries_detail() {
        let e = IngestError::ConversionFailed {
            detail: "pandoc: unrecognized option `--bogus`".into(),
        };
        assert!(e.to_string().contains("--bogus"));
    }

    #[test]
    fn math_error_display_names_mode_and_source() {
        let e = MathError {
            mode: MathMode::Inline,
            message: "unbalanced braces".into(),
            source_tex: r"\frac{1}{".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("inline"));
        assert!(msg.contains(r"\frac{1}{"));
    }
}

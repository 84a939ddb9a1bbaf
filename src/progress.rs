//! Progress reporting for pipeline stages.
//!
//! Inject an `Arc<dyn IngestProgress>` via
//! [`crate::config::IngestConfigBuilder::progress`] to receive an event after
//! each completed stage. Percentages are fixed checkpoints, one per stage —
//! not computed proportionally — so a polling client always sees the same
//! eight waypoints regardless of how long each stage took.
//!
//! Progress is fire-and-forget relative to pipeline correctness: the
//! orchestrator calls the trait and moves on. An implementation that needs
//! to do fallible work (write a database row, push to a socket) must swallow
//! its own failures; nothing it does can alter the run's outcome.

use std::sync::Arc;

/// One pipeline stage, in execution order.
///
/// The `step` names and `percent` checkpoints here are the wire format the
/// job-status record exposes to polling clients — changing either is a
/// breaking change for every consumer of that record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HtmlConvert,
    MathRender,
    ChapterSplit,
    HealthReport,
    PdfGenerate,
    EpubGenerate,
    Upload,
    DbWrite,
}

impl Stage {
    /// Stage name as written into the job-status record.
    pub fn step_name(&self) -> &'static str {
        match self {
            Stage::HtmlConvert => "html_convert",
            Stage::MathRender => "math_render",
            Stage::ChapterSplit => "chapter_split",
            Stage::HealthReport => "health_report",
            Stage::PdfGenerate => "pdf_generate",
            Stage::EpubGenerate => "epub_generate",
            Stage::Upload => "r2_upload",
            Stage::DbWrite => "db_write",
        }
    }

    /// Fixed completion checkpoint for this stage.
    pub fn percent(&self) -> u8 {
        match self {
            Stage::HtmlConvert => 10,
            Stage::MathRender => 25,
            Stage::ChapterSplit => 40,
            Stage::HealthReport => 50,
            Stage::PdfGenerate => 70,
            Stage::EpubGenerate => 85,
            Stage::Upload => 95,
            Stage::DbWrite => 100,
        }
    }

    /// All stages in execution order.
    pub fn all() -> [Stage; 8] {
        [
            Stage::HtmlConvert,
            Stage::MathRender,
            Stage::ChapterSplit,
            Stage::HealthReport,
            Stage::PdfGenerate,
            Stage::EpubGenerate,
            Stage::Upload,
            Stage::DbWrite,
        ]
    }
}

/// Called by the orchestrator as stages complete.
///
/// Implementations must be `Send + Sync`. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait IngestProgress: Send + Sync {
    /// Called once before the first stage runs.
    fn on_start(&self, input_file: &str) {
        let _ = input_file;
    }

    /// Called after a stage completes (including stages that were skipped
    /// by a flag — the checkpoint still advances so progress stays
    /// monotonic for polling clients).
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once when the run reaches a terminal state.
    ///
    /// `error` is `None` on success, otherwise the human-readable detail.
    fn on_finish(&self, error: Option<&str>) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl IngestProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressHandle = Arc<dyn IngestProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn checkpoints_are_the_documented_values() {
        let expected = [
            ("html_convert", 10u8),
            ("math_render", 25),
            ("chapter_split", 40),
            ("health_report", 50),
            ("pdf_generate", 70),
            ("epub_generate", 85),
            ("r2_upload", 95),
            ("db_write", 100),
        ];
        for (stage, (name, pct)) in Stage::all().iter().zip(expected) {
            assert_eq!(stage.step_name(), name);
            assert_eq!(stage.percent(), pct);
        }
    }

    #[test]
    fn checkpoints_are_strictly_increasing() {
        let stages = Stage::all();
        for pair in stages.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
    }

    #[test]
    fn noop_progress_does_not_panic() {
        let p = NoopProgress;
        p.on_start("book.tex");
        p.on_stage(Stage::HtmlConvert);
        p.on_finish(Some("boom"));
        p.on_finish(None);
    }

    #[test]
    fn tracking_progress_receives_events() {
        struct Tracker {
            stages: Mutex<Vec<&'static str>>,
            finishes: AtomicUsize,
        }

        impl IngestProgress for Tracker {
            fn on_stage(&self, stage: Stage) {
                self.stages.lock().unwrap().push(stage.step_name());
            }
            fn on_finish(&self, _error: Option<&str>) {
                self.finishes.fetch_add(1, Ordering::SeqCst);
            }
        }

        let t = Tracker {
            stages: Mutex::new(vec![]),
            finishes: AtomicUsize::new(0),
        };
        t.on_stage(Stage::HtmlConvert);
        t.on_stage(Stage::MathRender);
        t.on_finish(None);

        assert_eq!(
            *t.stages.lock().unwrap(),
            vec!["html_convert", "math_render"]
        );
        assert_eq!(t.finishes.load(Ordering::SeqCst), 1);
    }
}

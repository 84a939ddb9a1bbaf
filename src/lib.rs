//! # pressmill
//!
//! Ingest author manuscripts (LaTeX, Word, Markdown) into publishable,
//! chaptered HTML with statically rendered math, plus PDF and EPUB
//! artifacts.
//!
//! ## Why this crate?
//!
//! Publishing a manuscript is more than one pandoc call. The raw HTML that
//! comes back carries unrendered math spans, arrives as one monolithic
//! document, and gives no signal about whether the conversion actually
//! *worked* — a silently garbled equation or a skipped construct reaches
//! readers unless something checks. This crate wraps the conversion in a
//! pipeline that renders math to MathML at ingest time (no client-side JS),
//! partitions the document into chapters, evaluates conversion health and
//! refuses to publish defective output, then uploads artifacts and commits
//! the chapter set atomically.
//!
//! ## Pipeline Overview
//!
//! ```text
//! manuscript (.tex / .docx / .md)
//!  │
//!  ├─ 1. Stage      local path, or fetch an object-storage key to a temp dir
//!  ├─ 2. Detect     extension → SourceFormat (once, up front)
//!  ├─ 3. Convert    pandoc subprocess → HTML fragment + diagnostics
//!  ├─ 4. Math       LaTeX spans → static MathML, failures marked in place
//!  ├─ 5. Partition  <h1> boundaries → ordered chapters, chapter 0 free
//!  ├─ 6. Health     diagnostics + math errors → report; halted runs stop HERE
//!  ├─ 7. Artifacts  PDF (xelatex) + EPUB, best-effort
//!  ├─ 8. Upload     books/<slug>/<slug>.pdf|.epub
//!  └─ 9. Persist    chapters replaced + artifact keys, one transaction
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pressmill::{IngestConfig, IngestPipeline, IngestRequest, MemoryRepo, SourceInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::builder().dry_run(true).build()?;
//!     let repo = Arc::new(MemoryRepo::new());
//!     // No object store needed for a local dry run; the pandoc converter
//!     // is built from the config's pandoc_path / tool_timeout_secs.
//!     let pipeline = IngestPipeline::from_config(None, repo, config);
//!
//!     let outcome = pipeline
//!         .run(IngestRequest {
//!             document_id: uuid::Uuid::new_v4(),
//!             source: SourceInput::LocalPath("book.tex".into()),
//!             job_id: None,
//!         })
//!         .await?;
//!     println!("{} chapters, halted: {}", outcome.chapters.len(), outcome.report.halted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pressmill` binary (clap + anyhow + indicatif + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pressmill = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod ingest;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IngestConfig, IngestConfigBuilder};
pub use db::{DocumentRecord, IngestRepo, JobProgress, JobStatus, MemoryRepo, PgIngestRepo};
pub use error::{IngestError, MathError, MathMode};
pub use format::SourceFormat;
pub use ingest::{
    ArtifactSkipReason, IngestOutcome, IngestPipeline, IngestRequest, IngestStats, SourceInput,
};
pub use pipeline::chapters::{partition, slugify, Chapter};
pub use pipeline::health::HealthReport;
pub use pipeline::math::{pre_render_math, MathRenderOutcome};
pub use pipeline::pandoc::{ConversionResult, ManuscriptConverter, Pandoc};
pub use progress::{IngestProgress, NoopProgress, ProgressHandle, Stage};
pub use store::{artifact_key, manuscript_key, ArtifactStore, ObjectStoreClient, S3Config};

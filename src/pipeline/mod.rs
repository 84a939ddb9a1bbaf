//! The conversion pipeline, stage by stage.
//!
//! | Stage | Module | Does |
//! |-------|--------|------|
//! | 1. HTML conversion | [`pandoc`] | Manuscript → HTML fragment via the external tool |
//! | 2. Math normalization | [`math`] / [`mathml`] | LaTeX math spans → static MathML, failures marked in place |
//! | 3. Chapter partitioning | [`chapters`] | One HTML document → ordered chapters at `<h1>` boundaries |
//! | 4. Health evaluation | [`health`] | Diagnostics + math errors → report, halt gate |
//!
//! Artifact generation (PDF/EPUB) reuses stage 1's converter; storage and
//! persistence live outside the pipeline in [`crate::store`] and
//! [`crate::db`]. The orchestrator wiring the stages together is
//! [`crate::ingest::IngestPipeline`].

pub mod chapters;
pub mod health;
pub mod math;
pub mod mathml;
pub mod pandoc;

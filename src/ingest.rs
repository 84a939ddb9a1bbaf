//! The ingestion orchestrator.
//!
//! [`IngestPipeline::run`] drives one manuscript through every stage:
//! staging, format detection, HTML conversion, math normalization, chapter
//! partitioning, health evaluation, artifact generation, upload and
//! persistence. Stages run strictly forward; the health gate is the single
//! early exit, and it fires before anything is uploaded or written.
//!
//! Failure handling is two-tier. Artifact generation (PDF/EPUB) is
//! best-effort: a failure is logged, classified and surfaced as a `None`
//! key on the outcome. Everything else is fatal and unwinds as
//! [`IngestError`] — after the error has been written to the job-status
//! record so polling clients see why the run died.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::db::{IngestRepo, JobProgress, JobStatus};
use crate::error::IngestError;
use crate::format::SourceFormat;
use crate::pipeline::chapters::{self, Chapter};
use crate::pipeline::health::{self, HealthReport};
use crate::pipeline::math;
use crate::pipeline::pandoc::{ManuscriptConverter, Pandoc};
use crate::progress::Stage;
use crate::store::{artifact_key, content_type_for, ArtifactStore};

/// Where the manuscript comes from.
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// A file already on local disk.
    LocalPath(PathBuf),
    /// An object-storage key, staged into a temp directory before use.
    RemoteKey(String),
}

impl SourceInput {
    fn describe(&self) -> String {
        match self {
            SourceInput::LocalPath(p) => p.display().to_string(),
            SourceInput::RemoteKey(k) => k.clone(),
        }
    }
}

/// One ingestion request.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// The document the chapters land in. Must already exist.
    pub document_id: Uuid,
    pub source: SourceInput,
    /// Job-status record to keep updated, if the caller tracks one.
    pub job_id: Option<Uuid>,
}

/// Why an artifact key on the outcome is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSkipReason {
    /// Disabled by `skip_pdf` / `skip_epub`.
    SkippedByFlag,
    /// The external tool could not be started at all.
    ToolUnavailable,
    /// The tool ran but the manuscript failed to render.
    RenderFailed,
}

/// Per-stage wall-clock timings, milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub html_convert_ms: u64,
    pub math_render_ms: u64,
    pub partition_ms: u64,
    pub pdf_ms: u64,
    pub epub_ms: u64,
    pub upload_ms: u64,
    pub persist_ms: u64,
    pub total_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub document_id: Uuid,
    pub chapters: Vec<Chapter>,
    pub report: HealthReport,
    /// Storage key of the uploaded PDF, when one was generated and uploaded.
    pub pdf_key: Option<String>,
    pub epub_key: Option<String>,
    /// Why no PDF was generated, when generation did not produce one.
    pub pdf_skipped: Option<ArtifactSkipReason>,
    pub epub_skipped: Option<ArtifactSkipReason>,
    /// Chapters written to the database (0 on dry runs).
    pub persisted_chapters: u64,
    pub stats: IngestStats,
}

/// A staged manuscript: the path to convert, plus the temp directory that
/// owns it for remote sources. Dropping this cleans up the staging area.
struct StagedSource {
    path: PathBuf,
    _tempdir: Option<TempDir>,
}

/// The wired-up pipeline. Construct once, run many requests.
pub struct IngestPipeline {
    converter: Arc<dyn ManuscriptConverter>,
    store: Option<Arc<dyn ArtifactStore>>,
    repo: Arc<dyn IngestRepo>,
    config: IngestConfig,
}

impl IngestPipeline {
    /// `store` may be `None` for runs that neither fetch remote sources nor
    /// upload artifacts; reaching a stage that needs it is then an error.
    pub fn new(
        converter: Arc<dyn ManuscriptConverter>,
        store: Option<Arc<dyn ArtifactStore>>,
        repo: Arc<dyn IngestRepo>,
        config: IngestConfig,
    ) -> Self {
        Self {
            converter,
            store,
            repo,
            config,
        }
    }

    /// Wire a pipeline around the production [`Pandoc`] converter, built
    /// from the config's `pandoc_path` and `tool_timeout_secs`.
    pub fn from_config(
        store: Option<Arc<dyn ArtifactStore>>,
        repo: Arc<dyn IngestRepo>,
        config: IngestConfig,
    ) -> Self {
        let converter = Arc::new(Pandoc::new(
            config.pandoc_path.clone(),
            config.tool_timeout_secs,
        ));
        Self::new(converter, store, repo, config)
    }

    /// Run one manuscript through the full pipeline.
    ///
    /// Returns `Ok` even when PDF/EPUB generation failed (check the skip
    /// reasons on the outcome). Fatal errors are written to the job-status
    /// record before this returns; a halted health report comes back as
    /// [`IngestError::HealthHalted`] with nothing persisted.
    pub async fn run(&self, request: IngestRequest) -> Result<IngestOutcome, IngestError> {
        info!(
            document = %request.document_id,
            source = %request.source.describe(),
            "Starting ingestion"
        );

        if let Some(job_id) = request.job_id {
            self.write_job(job_id, JobStatus::Processing, None, None).await;
        }

        let result = self.run_inner(&request).await;

        match &result {
            Ok(outcome) => {
                info!(
                    document = %outcome.document_id,
                    chapters = outcome.chapters.len(),
                    persisted = outcome.persisted_chapters,
                    total_ms = outcome.stats.total_ms,
                    "Ingestion complete"
                );
                if let Some(ref p) = self.config.progress {
                    p.on_finish(None);
                }
            }
            Err(e) => {
                // Halted runs store the whole structured report so the
                // operator can inspect it without re-running.
                let detail = match e {
                    IngestError::HealthHalted { report } => {
                        serde_json::to_string(report).unwrap_or_else(|_| e.to_string())
                    }
                    other => other.to_string(),
                };
                if let Some(job_id) = request.job_id {
                    self.write_job(job_id, JobStatus::Error, None, Some(&detail)).await;
                }
                if let Some(ref p) = self.config.progress {
                    p.on_finish(Some(&e.to_string()));
                }
            }
        }

        result
    }

    async fn run_inner(&self, request: &IngestRequest) -> Result<IngestOutcome, IngestError> {
        let total_start = Instant::now();
        let mut stats = IngestStats::default();
        let job_id = request.job_id;

        // ── Step 1: Stage the source ─────────────────────────────────────
        let staged = self.stage_source(&request.source).await?;
        let input_file = staged
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| staged.path.display().to_string());

        if let Some(ref p) = self.config.progress {
            p.on_start(&input_file);
        }

        // ── Step 2: Resolve the format ───────────────────────────────────
        let format = match self.config.format_override {
            Some(f) => f,
            None => SourceFormat::detect(&staged.path)?,
        };
        debug!(%format, file = %input_file, "format resolved");

        // ── Step 3: Load the target document ─────────────────────────────
        let document = self
            .repo
            .get_document_for_ingest(request.document_id)
            .await?
            .ok_or(IngestError::DocumentNotFound {
                id: request.document_id,
            })?;

        // ── Step 4: Convert to HTML ──────────────────────────────────────
        let convert_start = Instant::now();
        let conversion = self.converter.to_html(&staged.path, format).await?;
        stats.html_convert_ms = convert_start.elapsed().as_millis() as u64;
        info!(
            bytes = conversion.html.len(),
            ms = stats.html_convert_ms,
            "HTML conversion done"
        );
        self.checkpoint(Stage::HtmlConvert, job_id).await;

        // ── Step 5: Normalize math ───────────────────────────────────────
        let math_start = Instant::now();
        let math_outcome = math::pre_render_math(&conversion.html);
        stats.math_render_ms = math_start.elapsed().as_millis() as u64;
        if !math_outcome.errors.is_empty() {
            warn!(
                errors = math_outcome.errors.len(),
                "math expressions failed to render"
            );
        }
        self.checkpoint(Stage::MathRender, job_id).await;

        // ── Step 6: Partition into chapters ──────────────────────────────
        let partition_start = Instant::now();
        let chapter_list = chapters::partition(&math_outcome.html);
        stats.partition_ms = partition_start.elapsed().as_millis() as u64;
        info!(chapters = chapter_list.len(), "partitioned");
        self.checkpoint(Stage::ChapterSplit, job_id).await;

        // ── Step 7: Evaluate health ──────────────────────────────────────
        let report = health::evaluate(
            &input_file,
            format,
            &conversion.diagnostics,
            math_outcome.errors,
            chapter_list.len(),
        );
        self.checkpoint(Stage::HealthReport, job_id).await;
        if report.halted {
            warn!("health evaluation halted the run\n{}", report.render());
            return Err(IngestError::HealthHalted { report });
        }

        // ── Step 8: Generate artifacts (best-effort) ─────────────────────
        let pdf_start = Instant::now();
        let (pdf_path, pdf_skipped) = if self.config.skip_pdf {
            (None, Some(ArtifactSkipReason::SkippedByFlag))
        } else {
            match self.converter.to_pdf(&staged.path).await {
                Ok(path) => (Some(path), None),
                Err(e) => {
                    warn!("PDF generation failed: {e}");
                    (None, Some(classify_artifact_failure(&e)))
                }
            }
        };
        stats.pdf_ms = pdf_start.elapsed().as_millis() as u64;
        self.checkpoint(Stage::PdfGenerate, job_id).await;

        let epub_start = Instant::now();
        let (epub_path, epub_skipped) = if self.config.skip_epub {
            (None, Some(ArtifactSkipReason::SkippedByFlag))
        } else {
            match self.converter.to_epub(&staged.path, &document.title).await {
                Ok(path) => (Some(path), None),
                Err(e) => {
                    warn!("EPUB generation failed: {e}");
                    (None, Some(classify_artifact_failure(&e)))
                }
            }
        };
        stats.epub_ms = epub_start.elapsed().as_millis() as u64;
        self.checkpoint(Stage::EpubGenerate, job_id).await;

        // ── Step 9: Upload artifacts ─────────────────────────────────────
        let upload_start = Instant::now();
        let mut pdf_key = None;
        let mut epub_key = None;
        if !self.config.dry_run && !self.config.skip_upload {
            if let Some(ref path) = pdf_path {
                pdf_key = Some(self.upload(path, &document.slug, "pdf").await?);
            }
            if let Some(ref path) = epub_path {
                epub_key = Some(self.upload(path, &document.slug, "epub").await?);
            }
        }
        stats.upload_ms = upload_start.elapsed().as_millis() as u64;
        self.checkpoint(Stage::Upload, job_id).await;

        // ── Step 10: Persist ─────────────────────────────────────────────
        let persist_start = Instant::now();
        let persisted_chapters = if self.config.dry_run {
            info!("dry run: skipping persistence");
            0
        } else {
            self.repo
                .persist_ingest(
                    document.id,
                    &chapter_list,
                    pdf_key.as_deref(),
                    epub_key.as_deref(),
                )
                .await?
        };
        stats.persist_ms = persist_start.elapsed().as_millis() as u64;

        if let Some(ref p) = self.config.progress {
            p.on_stage(Stage::DbWrite);
        }
        if let Some(job_id) = job_id {
            let progress = JobProgress::new(Stage::DbWrite.step_name(), Stage::DbWrite.percent());
            self.write_job(job_id, JobStatus::Success, Some(&progress), None).await;
        }

        stats.total_ms = total_start.elapsed().as_millis() as u64;

        Ok(IngestOutcome {
            document_id: document.id,
            chapters: chapter_list,
            report,
            pdf_key,
            epub_key,
            pdf_skipped,
            epub_skipped,
            persisted_chapters,
            stats,
        })
    }

    /// Resolve the request's source to a local path, fetching remote
    /// objects into a scoped temp directory.
    async fn stage_source(&self, source: &SourceInput) -> Result<StagedSource, IngestError> {
        match source {
            SourceInput::LocalPath(path) => {
                match tokio::fs::metadata(path).await {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(IngestError::SourceNotFound { path: path.clone() })
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                        return Err(IngestError::PermissionDenied { path: path.clone() })
                    }
                    Err(e) => {
                        return Err(IngestError::Internal(format!(
                            "inspecting '{}': {e}",
                            path.display()
                        )))
                    }
                }
                Ok(StagedSource {
                    path: path.clone(),
                    _tempdir: None,
                })
            }
            SourceInput::RemoteKey(key) => {
                let store = self.store.as_ref().ok_or_else(|| {
                    IngestError::Internal("remote source requires an artifact store".into())
                })?;

                let data = store.get(key).await?;
                let tempdir = tempfile::tempdir().map_err(|e| {
                    IngestError::Internal(format!("creating staging directory: {e}"))
                })?;

                let filename = staged_filename(key);
                let path = tempdir.path().join(filename);
                tokio::fs::write(&path, &data).await.map_err(|e| {
                    IngestError::Internal(format!("staging '{}': {e}", path.display()))
                })?;

                debug!(key, file = %path.display(), bytes = data.len(), "source staged");
                Ok(StagedSource {
                    path,
                    _tempdir: Some(tempdir),
                })
            }
        }
    }

    /// Upload one generated artifact; failure here is fatal.
    async fn upload(
        &self,
        path: &std::path::Path,
        slug: &str,
        ext: &str,
    ) -> Result<String, IngestError> {
        let key = artifact_key(slug, ext);
        let store = self.store.as_ref().ok_or_else(|| IngestError::UploadFailed {
            key: key.clone(),
            detail: "no artifact store configured".into(),
        })?;
        store.put_file(path, &key, content_type_for(ext)).await
    }

    /// Report a stage checkpoint to the progress sink and the job record.
    /// Both are fire-and-forget.
    async fn checkpoint(&self, stage: Stage, job_id: Option<Uuid>) {
        if let Some(ref p) = self.config.progress {
            p.on_stage(stage);
        }
        if let Some(job_id) = job_id {
            let progress = JobProgress::new(stage.step_name(), stage.percent());
            self.write_job(job_id, JobStatus::Processing, Some(&progress), None).await;
        }
    }

    /// Write the job record, logging and swallowing failures: reporting
    /// must never change the pipeline's outcome.
    async fn write_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        progress: Option<&JobProgress>,
        error: Option<&str>,
    ) {
        if let Err(e) = self.repo.update_job(job_id, status, progress, error).await {
            warn!(job = %job_id, "job record write failed: {e}");
        }
    }
}

/// Classify a best-effort artifact failure for the outcome.
fn classify_artifact_failure(e: &IngestError) -> ArtifactSkipReason {
    match e {
        // The spawn-failure detail comes from Pandoc::execute.
        IngestError::ConversionFailed { detail } if detail.contains("failed to run") => {
            ArtifactSkipReason::ToolUnavailable
        }
        _ => ArtifactSkipReason::RenderFailed,
    }
}

/// Original file name of a staged source key
/// (`uploads/manuscripts/<id>/<timestamp>-<filename>`).
fn staged_filename(key: &str) -> &str {
    let base = key.rsplit('/').next().unwrap_or(key);
    match base.split_once('-') {
        Some((ts, rest)) if !rest.is_empty() && ts.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => base,
    }
}

//! Persistence: documents, chapters and job-status records.
//!
//! The relational schema is touched only through the [`IngestRepo`] trait.
//! [`PgIngestRepo`] is the production Postgres implementation;
//! [`MemoryRepo`] backs tests and database-less dry runs.
//!
//! Chapter persistence is wholesale replacement: one transaction deletes
//! the document's existing chapter set, inserts the new one and updates
//! the artifact keys. A transaction-scoped advisory lock on the document
//! id serialises concurrent ingests of the same document, so two racing
//! runs can never interleave their delete/insert pairs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::IngestError;
use crate::pipeline::chapters::Chapter;

/// The document a manuscript is ingested into.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
}

/// Lifecycle of a job-status record. `Success` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }
}

/// Stage checkpoint written into the job record.
///
/// Stored as a JSON-encoded string, the format polling clients parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub step: String,
    pub pct: u8,
}

impl JobProgress {
    pub fn new(step: impl Into<String>, pct: u8) -> Self {
        Self {
            step: step.into(),
            pct,
        }
    }

    /// The at-rest encoding.
    pub fn to_json(&self) -> String {
        // Two string fields and a u8 cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Everything the pipeline needs from the database.
#[async_trait]
pub trait IngestRepo: Send + Sync {
    /// Look up the target document. `None` means nothing to ingest into.
    async fn get_document_for_ingest(
        &self,
        id: Uuid,
    ) -> Result<Option<DocumentRecord>, IngestError>;

    /// Atomically replace the document's chapter set and update artifact
    /// keys. A `None` key leaves the stored key unchanged. Returns the
    /// number of chapters written.
    async fn persist_ingest(
        &self,
        document_id: Uuid,
        chapters: &[Chapter],
        pdf_key: Option<&str>,
        epub_key: Option<&str>,
    ) -> Result<u64, IngestError>;

    /// Write the job-status record. `progress = None` leaves the stored
    /// progress unchanged; `error` is written as given (cleared on `None`).
    async fn update_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        progress: Option<&JobProgress>,
        error: Option<&str>,
    ) -> Result<(), IngestError>;
}

// ── Postgres ──────────────────────────────────────────────────────────────

/// Production repository over a Postgres pool.
pub struct PgIngestRepo {
    pool: PgPool,
}

impl PgIngestRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool sized for a batch worker.
    pub async fn connect(database_url: &str) -> Result<Self, IngestError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(|e| IngestError::PersistenceFailed {
                detail: format!("connecting to database: {e}"),
            })?;
        Ok(Self::new(pool))
    }
}

/// Advisory-lock key for a document: the high 64 bits of its UUID.
///
/// Collisions between distinct documents only cost serialisation, never
/// correctness.
fn advisory_key(document_id: Uuid) -> i64 {
    (document_id.as_u128() >> 64) as i64
}

#[async_trait]
impl IngestRepo for PgIngestRepo {
    async fn get_document_for_ingest(
        &self,
        id: Uuid,
    ) -> Result<Option<DocumentRecord>, IngestError> {
        sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, slug, title FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IngestError::PersistenceFailed {
            detail: format!("loading document {id}: {e}"),
        })
    }

    async fn persist_ingest(
        &self,
        document_id: Uuid,
        chapters: &[Chapter],
        pdf_key: Option<&str>,
        epub_key: Option<&str>,
    ) -> Result<u64, IngestError> {
        let fail = |e: sqlx::Error| IngestError::PersistenceFailed {
            detail: format!("persisting ingest for {document_id}: {e}"),
        };

        let mut tx = self.pool.begin().await.map_err(fail)?;

        // Held until commit/rollback: serialises concurrent ingests of the
        // same document.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(advisory_key(document_id))
            .execute(&mut *tx)
            .await
            .map_err(fail)?;

        sqlx::query("DELETE FROM chapters WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(fail)?;

        for chapter in chapters {
            sqlx::query(
                "INSERT INTO chapters
                    (document_id, title, slug, content, position, is_free_preview)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(document_id)
            .bind(&chapter.title)
            .bind(&chapter.slug)
            .bind(&chapter.content)
            .bind(chapter.position as i32)
            .bind(chapter.is_free_preview)
            .execute(&mut *tx)
            .await
            .map_err(fail)?;
        }

        sqlx::query(
            "UPDATE documents
             SET pdf_key = COALESCE($2, pdf_key),
                 epub_key = COALESCE($3, epub_key),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(document_id)
        .bind(pdf_key)
        .bind(epub_key)
        .execute(&mut *tx)
        .await
        .map_err(fail)?;

        tx.commit().await.map_err(fail)?;

        Ok(chapters.len() as u64)
    }

    async fn update_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        progress: Option<&JobProgress>,
        error: Option<&str>,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "UPDATE ingest_jobs
             SET status = $2,
                 progress = COALESCE($3, progress),
                 error = $4,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(progress.map(JobProgress::to_json))
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::PersistenceFailed {
            detail: format!("updating job {job_id}: {e}"),
        })?;
        Ok(())
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────

/// Job-status row as the in-memory repository stores it.
#[derive(Debug, Clone, Default)]
pub struct MemoryJob {
    pub status: Option<JobStatus>,
    pub progress: Option<String>,
    pub error: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<Uuid, DocumentRecord>,
    chapters: HashMap<Uuid, Vec<Chapter>>,
    pdf_keys: HashMap<Uuid, String>,
    epub_keys: HashMap<Uuid, String>,
    jobs: HashMap<Uuid, MemoryJob>,
}

/// In-process [`IngestRepo`] for tests and database-less dry runs.
#[derive(Default)]
pub struct MemoryRepo {
    state: Mutex<MemoryState>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document the pipeline can ingest into.
    pub fn insert_document(&self, doc: DocumentRecord) {
        self.state.lock().unwrap().documents.insert(doc.id, doc);
    }

    /// The currently persisted chapter set for a document.
    pub fn chapters_for(&self, document_id: Uuid) -> Vec<Chapter> {
        self.state
            .lock()
            .unwrap()
            .chapters
            .get(&document_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The stored artifact keys for a document.
    pub fn artifact_keys(&self, document_id: Uuid) -> (Option<String>, Option<String>) {
        let state = self.state.lock().unwrap();
        (
            state.pdf_keys.get(&document_id).cloned(),
            state.epub_keys.get(&document_id).cloned(),
        )
    }

    /// The job-status record, if any write reached it.
    pub fn job(&self, job_id: Uuid) -> Option<MemoryJob> {
        self.state.lock().unwrap().jobs.get(&job_id).cloned()
    }
}

#[async_trait]
impl IngestRepo for MemoryRepo {
    async fn get_document_for_ingest(
        &self,
        id: Uuid,
    ) -> Result<Option<DocumentRecord>, IngestError> {
        Ok(self.state.lock().unwrap().documents.get(&id).cloned())
    }

    async fn persist_ingest(
        &self,
        document_id: Uuid,
        chapters: &[Chapter],
        pdf_key: Option<&str>,
        epub_key: Option<&str>,
    ) -> Result<u64, IngestError> {
        let mut state = self.state.lock().unwrap();
        if !state.documents.contains_key(&document_id) {
            return Err(IngestError::DocumentNotFound { id: document_id });
        }
        state.chapters.insert(document_id, chapters.to_vec());
        if let Some(key) = pdf_key {
            state.pdf_keys.insert(document_id, key.to_string());
        }
        if let Some(key) = epub_key {
            state.epub_keys.insert(document_id, key.to_string());
        }
        Ok(chapters.len() as u64)
    }

    async fn update_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        progress: Option<&JobProgress>,
        error: Option<&str>,
    ) -> Result<(), IngestError> {
        let mut state = self.state.lock().unwrap();
        let job = state.jobs.entry(job_id).or_default();
        job.status = Some(status);
        if let Some(p) = progress {
            job.progress = Some(p.to_json());
        }
        job.error = error.map(str::to_string);
        Ok(())
    }
}

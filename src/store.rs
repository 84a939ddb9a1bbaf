//! Artifact storage: uploads, downloads and presigned access.
//!
//! [`ArtifactStore`] is the only surface the rest of the crate touches
//! object storage through. The production client wraps `object_store` with
//! either an S3-compatible backend (AWS, or R2-style services via a custom
//! endpoint) or a local filesystem directory for development.
//!
//! `object_store` sends no request checksums unless the backend requires
//! them, which keeps uploads compatible with R2-style services that reject
//! the newer checksum headers.
//!
//! ## Key conventions
//!
//! * Published artifacts: `books/<slug>/<slug>.pdf` / `.epub`
//! * Staged sources: `uploads/manuscripts/<document-id>/<timestamp>-<filename>`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::signer::Signer;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::IngestError;

/// Storage key for a published book artifact.
pub fn artifact_key(slug: &str, ext: &str) -> String {
    format!("books/{slug}/{slug}.{ext}")
}

/// Storage key for a staged source manuscript. Timestamped so repeated
/// uploads of the same file never collide.
pub fn manuscript_key(document_id: Uuid, filename: &str) -> String {
    format!(
        "uploads/manuscripts/{document_id}/{}-{filename}",
        Utc::now().timestamp_millis()
    )
}

/// MIME type for a generated artifact extension.
pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        "html" => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Object storage as the pipeline sees it.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a local file under `key`. Returns the key.
    async fn put_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, IngestError>;

    /// Upload an in-memory buffer under `key`. Returns the key.
    async fn put_bytes(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, IngestError>;

    /// Download the object at `key`.
    async fn get(&self, key: &str) -> Result<Bytes, IngestError>;

    /// Presigned GET URL for `key`, valid for `ttl`.
    ///
    /// Only remote backends can sign; the local development backend fails.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, IngestError>;
}

/// Environment-derived S3/R2 connection settings.
///
/// `S3_ENDPOINT` set: R2-style custom endpoint (plain HTTP allowed for
/// `http://` endpoints). Unset: standard AWS resolution for `S3_BUCKET`.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3Config {
    /// Read `S3_BUCKET` (required), `S3_ENDPOINT`, `AWS_REGION` (default
    /// `auto`), `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.
    pub fn from_env() -> Result<Self, IngestError> {
        let bucket = std::env::var("S3_BUCKET")
            .map_err(|_| IngestError::InvalidConfig("S3_BUCKET not set".into()))?;
        Ok(Self {
            bucket,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "auto".to_string()),
            endpoint: std::env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
        })
    }
}

/// Production [`ArtifactStore`] backed by `object_store`.
pub enum ObjectStoreClient {
    /// S3-compatible remote backend. Kept concrete so presigning works.
    S3 { store: Arc<AmazonS3>, bucket: String },
    /// Local directory backend for development and tests.
    Local {
        store: Arc<LocalFileSystem>,
        root: PathBuf,
    },
}

impl ObjectStoreClient {
    /// Connect to an S3-compatible backend.
    pub fn s3(config: &S3Config) -> Result<Self, IngestError> {
        let mut builder = AmazonS3Builder::new().with_region(&config.region);

        if let Some(ref key) = config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(ref secret) = config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        if let Some(ref endpoint) = config.endpoint {
            // object_store requires absolute endpoint URLs.
            let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://")
            {
                endpoint.clone()
            } else {
                format!("https://{endpoint}")
            };
            builder = builder
                .with_bucket_name(&config.bucket)
                .with_endpoint(&endpoint_url)
                .with_allow_http(endpoint_url.starts_with("http://"));
        } else {
            builder = builder.with_url(format!("s3://{}", config.bucket));
        }

        let store = builder.build().map_err(|e| {
            IngestError::InvalidConfig(format!("object store configuration: {e}"))
        })?;

        info!(
            "Artifact store: s3://{} (region: {}{})",
            config.bucket,
            config.region,
            config
                .endpoint
                .as_deref()
                .map(|e| format!(", endpoint: {e}"))
                .unwrap_or_default()
        );

        Ok(Self::S3 {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Connect to an S3-compatible backend from environment variables.
    pub fn from_env() -> Result<Self, IngestError> {
        Self::s3(&S3Config::from_env()?)
    }

    /// Local directory backend.
    pub fn local(root: &Path) -> Result<Self, IngestError> {
        let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let store = LocalFileSystem::new_with_prefix(&canonical).map_err(|e| {
            IngestError::InvalidConfig(format!("local artifact store at '{}': {e}", root.display()))
        })?;
        info!("Artifact store: local directory {}", canonical.display());
        Ok(Self::Local {
            store: Arc::new(store),
            root: canonical,
        })
    }

    fn store(&self) -> &dyn ObjectStore {
        match self {
            Self::S3 { store, .. } => store.as_ref(),
            Self::Local { store, .. } => store.as_ref(),
        }
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreClient {
    async fn put_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, IngestError> {
        let data = tokio::fs::read(path).await.map_err(|e| IngestError::UploadFailed {
            key: key.to_string(),
            detail: format!("reading '{}': {e}", path.display()),
        })?;
        self.put_bytes(key, Bytes::from(data), content_type).await
    }

    async fn put_bytes(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, IngestError> {
        let path = object_store::path::Path::from(key);
        let attributes = Attributes::from_iter([(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        )]);
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        debug!(key, content_type, size = data.len(), "uploading artifact");
        self.store()
            .put_opts(&path, data.into(), opts)
            .await
            .map_err(|e| IngestError::UploadFailed {
                key: key.to_string(),
                detail: e.to_string(),
            })?;

        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<Bytes, IngestError> {
        let path = object_store::path::Path::from(key);
        let result = self
            .store()
            .get(&path)
            .await
            .map_err(|e| IngestError::FetchFailed {
                key: key.to_string(),
                detail: e.to_string(),
            })?;
        result.bytes().await.map_err(|e| IngestError::FetchFailed {
            key: key.to_string(),
            detail: e.to_string(),
        })
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, IngestError> {
        match self {
            Self::S3 { store, .. } => {
                let path = object_store::path::Path::from(key);
                let url = store
                    .signed_url(http::Method::GET, &path, ttl)
                    .await
                    .map_err(|e| IngestError::Internal(format!("presigning '{key}': {e}")))?;
                Ok(url.to_string())
            }
            Self::Local { .. } => Err(IngestError::Internal(
                "presigning requires an S3 backend".into(),
            )),
        }
    }
}

//! Configuration for an ingestion run.
//!
//! All run behaviour is controlled through [`IngestConfig`], built via its
//! [`IngestConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across tasks and to diff two runs to understand why
//! their outcomes differ.
//!
//! The skip flags (`dry_run`, `skip_pdf`, `skip_epub`, `skip_upload`) are
//! each independently controllable so a local iteration loop can exercise
//! exactly the stages it cares about without mutating shared state.

use std::fmt;
use std::sync::Arc;

use crate::error::IngestError;
use crate::format::SourceFormat;
use crate::progress::{IngestProgress, ProgressHandle};

/// Configuration for a manuscript ingestion run.
///
/// Built via [`IngestConfig::builder()`] or [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use pressmill::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .skip_pdf(true)
///     .skip_epub(true)
///     .dry_run(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Explicit format override. When `None`, the format is detected from
    /// the manuscript's file extension.
    pub format_override: Option<SourceFormat>,

    /// Skip persistence and upload entirely. The pipeline still converts,
    /// renders math, partitions and evaluates health, so a dry run surfaces
    /// every publication-blocking defect without touching shared state.
    pub dry_run: bool,

    /// Skip PDF artifact generation.
    pub skip_pdf: bool,

    /// Skip EPUB artifact generation.
    pub skip_epub: bool,

    /// Skip the artifact upload stage (generated files stay local).
    pub skip_upload: bool,

    /// Path or name of the external conversion tool binary. Default: "pandoc".
    ///
    /// Resolved through `PATH` when not absolute. The tool is always invoked
    /// with an argument vector, never through a shell.
    pub pandoc_path: String,

    /// Per-invocation timeout for the external tool, in seconds.
    ///
    /// `None` (the default) awaits the tool with no timeout — a hung tool
    /// hangs the run. Production deployments should set a bound; expiry is
    /// treated as a fatal, reported conversion failure.
    pub tool_timeout_secs: Option<u64>,

    /// Progress sink called after each completed stage. Default: none.
    pub progress: Option<ProgressHandle>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            format_override: None,
            dry_run: false,
            skip_pdf: false,
            skip_epub: false,
            skip_upload: false,
            pandoc_path: "pandoc".to_string(),
            tool_timeout_secs: None,
            progress: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("format_override", &self.format_override)
            .field("dry_run", &self.dry_run)
            .field("skip_pdf", &self.skip_pdf)
            .field("skip_epub", &self.skip_epub)
            .field("skip_upload", &self.skip_upload)
            .field("pandoc_path", &self.pandoc_path)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn IngestProgress>"))
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn format_override(mut self, format: SourceFormat) -> Self {
        self.config.format_override = Some(format);
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn skip_pdf(mut self, v: bool) -> Self {
        self.config.skip_pdf = v;
        self
    }

    pub fn skip_epub(mut self, v: bool) -> Self {
        self.config.skip_epub = v;
        self
    }

    pub fn skip_upload(mut self, v: bool) -> Self {
        self.config.skip_upload = v;
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<String>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = Some(secs);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn IngestProgress>) -> Self {
        self.config.progress = Some(progress);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.pandoc_path.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "pandoc path must not be empty".into(),
            ));
        }
        if c.tool_timeout_secs == Some(0) {
            return Err(IngestError::InvalidConfig(
                "tool timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;

    #[test]
    fn defaults_run_everything() {
        let c = IngestConfig::default();
        assert!(!c.dry_run && !c.skip_pdf && !c.skip_epub && !c.skip_upload);
        assert_eq!(c.pandoc_path, "pandoc");
        assert!(c.tool_timeout_secs.is_none());
    }

    #[test]
    fn builder_rejects_empty_tool_path() {
        let err = IngestConfig::builder().pandoc_path("  ").build().unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = IngestConfig::builder()
            .tool_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn builder_sets_flags_independently() {
        let c = IngestConfig::builder()
            .skip_pdf(true)
            .skip_upload(true)
            .format_override(SourceFormat::Latex)
            .progress(Arc::new(NoopProgress))
            .build()
            .unwrap();
        assert!(c.skip_pdf);
        assert!(!c.skip_epub);
        assert!(c.skip_upload);
        assert!(!c.dry_run);
        assert_eq!(c.format_override, Some(SourceFormat::Latex));
        assert!(c.progress.is_some());
    }
}

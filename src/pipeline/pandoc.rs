//! Document conversion through the external pandoc tool.
//!
//! [`ManuscriptConverter`] is the seam the orchestrator converts through;
//! [`Pandoc`] is the production implementation, tests substitute stubs.
//!
//! Every invocation passes arguments as a vector to the process API —
//! never through a shell — so manuscript file names can contain spaces,
//! quotes or metacharacters without becoming injection vectors. The
//! working directory is pinned to the manuscript's parent directory, which
//! keeps relative side outputs (`--extract-media=./media`) next to the
//! source.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::IngestError;
use crate::format::SourceFormat;

/// Output of one HTML conversion.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// The converted HTML fragment (tool stdout).
    pub html: String,
    /// The tool's raw stderr, fed verbatim to the health evaluator.
    pub diagnostics: String,
}

/// Converts manuscripts between formats.
///
/// `to_pdf` and `to_epub` return the path of the generated sibling file;
/// the caller owns cleanup (in practice the file lives inside the run's
/// temp directory and vanishes with it).
#[async_trait]
pub trait ManuscriptConverter: Send + Sync {
    async fn to_html(
        &self,
        path: &Path,
        format: SourceFormat,
    ) -> Result<ConversionResult, IngestError>;

    async fn to_pdf(&self, path: &Path) -> Result<PathBuf, IngestError>;

    async fn to_epub(&self, path: &Path, title: &str) -> Result<PathBuf, IngestError>;
}

/// Production converter invoking the pandoc binary as a subprocess.
#[derive(Debug, Clone)]
pub struct Pandoc {
    program: String,
    timeout: Option<Duration>,
}

impl Pandoc {
    /// `program` is resolved through `PATH` when not absolute. A `timeout`
    /// of `None` awaits the tool indefinitely; expiry of a set timeout is
    /// a fatal conversion failure.
    pub fn new(program: impl Into<String>, timeout_secs: Option<u64>) -> Self {
        Self {
            program: program.into(),
            timeout: timeout_secs.map(Duration::from_secs),
        }
    }

    /// Run the tool in `dir` with the given arguments, enforcing the
    /// configured timeout.
    async fn execute(
        &self,
        dir: &Path,
        args: &[&str],
        what: &str,
    ) -> Result<std::process::Output, IngestError> {
        debug!(program = %self.program, ?args, dir = %dir.display(), "invoking {what}");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(r) => r,
                Err(_) => {
                    return Err(IngestError::ConversionFailed {
                        detail: format!(
                            "{what}: '{}' timed out after {}s",
                            self.program,
                            limit.as_secs()
                        ),
                    })
                }
            },
            None => cmd.output().await,
        };

        let output = result.map_err(|e| IngestError::ConversionFailed {
            detail: format!("{what}: failed to run '{}': {e}", self.program),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                format!("{what}: '{}' exited with {}", self.program, output.status)
            } else {
                format!(
                    "{what}: '{}' exited with {}\n{}",
                    self.program,
                    output.status,
                    stderr.trim()
                )
            };
            return Err(IngestError::ConversionFailed { detail });
        }

        Ok(output)
    }
}

/// Working directory for a manuscript: its parent, or `.` for bare names.
fn work_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// The manuscript's name relative to [`work_dir`].
fn file_arg(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[async_trait]
impl ManuscriptConverter for Pandoc {
    async fn to_html(
        &self,
        path: &Path,
        format: SourceFormat,
    ) -> Result<ConversionResult, IngestError> {
        let input = file_arg(path);
        let mut args: Vec<&str> = format.html_args();
        args.push(input.as_str());

        let output = self.execute(work_dir(path), &args, "html conversion").await?;
        Ok(ConversionResult {
            html: String::from_utf8_lossy(&output.stdout).into_owned(),
            diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn to_pdf(&self, path: &Path) -> Result<PathBuf, IngestError> {
        let out = path.with_extension("pdf");
        let input = file_arg(path);
        let out_name = file_arg(&out);
        let args = [
            "--pdf-engine=xelatex",
            "--pdf-engine-opt=-halt-on-error",
            "-o",
            out_name.as_str(),
            input.as_str(),
        ];

        self.execute(work_dir(path), &args, "pdf generation").await?;
        Ok(out)
    }

    async fn to_epub(&self, path: &Path, title: &str) -> Result<PathBuf, IngestError> {
        let out = path.with_extension("epub");
        let input = file_arg(path);
        let out_name = file_arg(&out);
        let title_meta = format!("title={title}");
        let args = [
            "-t",
            "epub3",
            "--toc",
            "--toc-depth=2",
            "--metadata",
            title_meta.as_str(),
            "-o",
            out_name.as_str(),
            input.as_str(),
        ];

        self.execute(work_dir(path), &args, "epub generation").await?;
        Ok(out)
    }
}

//! CLI binary for pressmill.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig`, wires the pandoc converter, object store and repository,
//! and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use pressmill::{
    DocumentRecord, IngestConfig, IngestPipeline, IngestProgress, IngestRequest, MemoryRepo,
    ObjectStoreClient, PgIngestRepo, SourceFormat, SourceInput, Stage,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress via indicatif ────────────────────────────────────────────

/// Terminal progress: a single bar that jumps between the pipeline's fixed
/// stage checkpoints.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Ingesting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl IngestProgress for CliProgress {
    fn on_start(&self, input_file: &str) {
        self.bar.set_message(input_file.to_string());
    }

    fn on_stage(&self, stage: Stage) {
        self.bar.set_position(stage.percent() as u64);
        self.bar.set_message(stage.step_name().to_string());
    }

    fn on_finish(&self, error: Option<&str>) {
        self.bar.finish_and_clear();
        if error.is_none() {
            eprintln!("{} ingestion complete", green("✔"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ingest a local LaTeX manuscript
  pressmill --document 7b0f... --file book.tex

  # Ingest a staged upload from object storage
  pressmill --document 7b0f... --key uploads/manuscripts/7b0f.../1724-book.docx

  # Dry run: convert, render math and evaluate health, persist nothing
  pressmill --document 7b0f... --file book.tex --dry-run

  # HTML + chapters only (no PDF/EPUB, no upload)
  pressmill --document 7b0f... --file book.md --skip-pdf --skip-epub --skip-upload

  # Track progress in a job record and emit machine-readable output
  pressmill --document 7b0f... --file book.tex --job 91c2... --json

  # Override detection for an unusual extension
  pressmill --document 7b0f... --file manuscript.ltx --format latex

ENVIRONMENT VARIABLES:
  DATABASE_URL            Postgres connection string (omit for --dry-run)
  S3_BUCKET               Artifact bucket (required unless uploads are skipped)
  S3_ENDPOINT             Custom S3-compatible endpoint (R2 etc.)
  AWS_REGION              Region, default "auto"
  AWS_ACCESS_KEY_ID       Credentials for the artifact bucket
  AWS_SECRET_ACCESS_KEY
  PRESSMILL_PANDOC        Pandoc binary path (same as --pandoc)

A .env file in the working directory is loaded on startup.

EXIT STATUS:
  0  ingestion succeeded
  1  any fatal error; a halted health evaluation prints the full report
"#;

/// Ingest a manuscript into chaptered HTML with rendered math, plus PDF and
/// EPUB artifacts.
#[derive(Parser, Debug)]
#[command(
    name = "pressmill",
    version,
    about = "Ingest LaTeX/Word/Markdown manuscripts into publishable chaptered HTML",
    long_about = "Convert a manuscript to HTML via pandoc, render its math to static MathML, \
split it into chapters, evaluate conversion health, generate PDF/EPUB artifacts, upload them \
and atomically persist the chapter set. A manuscript that fails health evaluation is never \
persisted.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// UUID of the document to ingest into (must already exist).
    #[arg(long)]
    document: Uuid,

    #[command(flatten)]
    source: Source,

    /// Override format detection: latex, docx or markdown.
    #[arg(long, value_parser = parse_format)]
    format: Option<SourceFormat>,

    /// Convert and evaluate health, but persist and upload nothing.
    #[arg(long, env = "PRESSMILL_DRY_RUN")]
    dry_run: bool,

    /// Skip PDF artifact generation.
    #[arg(long)]
    skip_pdf: bool,

    /// Skip EPUB artifact generation.
    #[arg(long)]
    skip_epub: bool,

    /// Generate artifacts but do not upload them.
    #[arg(long)]
    skip_upload: bool,

    /// Job-status record to keep updated while the run progresses.
    #[arg(long)]
    job: Option<Uuid>,

    /// Path to the pandoc binary.
    #[arg(long, env = "PRESSMILL_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// Per-invocation tool timeout in seconds (no timeout when omitted).
    #[arg(long, env = "PRESSMILL_TIMEOUT")]
    timeout: Option<u64>,

    /// Output the structured IngestOutcome as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PRESSMILL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PRESSMILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PRESSMILL_QUIET")]
    quiet: bool,
}

/// Exactly one source: a local file or an object-storage key.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Source {
    /// Local manuscript path (.tex, .docx, .md, .markdown).
    #[arg(long)]
    file: Option<PathBuf>,

    /// Object-storage key of a staged upload.
    #[arg(long)]
    key: Option<String>,
}

fn parse_format(s: &str) -> Result<SourceFormat, String> {
    SourceFormat::parse(s)
        .ok_or_else(|| format!("unknown format '{s}' (expected latex, docx or markdown)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library logs stay quiet while the progress bar is active; the bar is
    // the feedback channel.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Wire the pipeline ────────────────────────────────────────────────
    let source = match (&cli.source.file, &cli.source.key) {
        (Some(path), None) => SourceInput::LocalPath(path.clone()),
        (None, Some(key)) => SourceInput::RemoteKey(key.clone()),
        _ => unreachable!("clap group enforces exactly one source"),
    };

    let needs_store = matches!(source, SourceInput::RemoteKey(_))
        || (!cli.dry_run && !cli.skip_upload && !(cli.skip_pdf && cli.skip_epub));
    let store = if needs_store {
        let client = ObjectStoreClient::from_env()
            .context("object storage is required for this run (set S3_BUCKET, or use --dry-run/--skip-upload with --file)")?;
        Some(Arc::new(client) as Arc<dyn pressmill::ArtifactStore>)
    } else {
        None
    };

    let repo: Arc<dyn pressmill::IngestRepo> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(
            PgIngestRepo::connect(&url)
                .await
                .context("connecting to DATABASE_URL")?,
        ),
        Err(_) if cli.dry_run => {
            // No database: dry runs get an in-memory stand-in seeded with
            // the target document so the pipeline has something to resolve.
            let repo = MemoryRepo::new();
            let stem = cli
                .source
                .file
                .as_deref()
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "manuscript".to_string());
            repo.insert_document(DocumentRecord {
                id: cli.document,
                slug: pressmill::slugify(&stem),
                title: stem,
            });
            Arc::new(repo)
        }
        Err(_) => anyhow::bail!(
            "DATABASE_URL is not set; persisted runs need a database (or pass --dry-run)"
        ),
    };

    let mut builder = IngestConfig::builder()
        .dry_run(cli.dry_run)
        .skip_pdf(cli.skip_pdf)
        .skip_epub(cli.skip_epub)
        .skip_upload(cli.skip_upload)
        .pandoc_path(cli.pandoc.to_string_lossy().into_owned());
    if let Some(secs) = cli.timeout {
        builder = builder.tool_timeout_secs(secs);
    }
    if let Some(format) = cli.format {
        builder = builder.format_override(format);
    }
    if show_progress {
        builder = builder.progress(CliProgress::new());
    }
    let config = builder.build()?;
    let pipeline = IngestPipeline::from_config(store, repo, config);

    // ── Run ──────────────────────────────────────────────────────────────
    let request = IngestRequest {
        document_id: cli.document,
        source,
        job_id: cli.job,
    };

    match pipeline.run(request).await {
        Ok(outcome) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if !cli.quiet {
                println!(
                    "{} {} chapters ({} persisted) in {}ms",
                    green("✔"),
                    bold(&outcome.chapters.len().to_string()),
                    outcome.persisted_chapters,
                    outcome.stats.total_ms
                );
                match &outcome.pdf_key {
                    Some(key) => println!("  pdf:  {key}"),
                    None => println!("  pdf:  {}", dim("not uploaded")),
                }
                match &outcome.epub_key {
                    Some(key) => println!("  epub: {key}"),
                    None => println!("  epub: {}", dim("not uploaded")),
                }
                let warnings = outcome.report.pandoc_warnings.len();
                if warnings > 0 {
                    println!("  {} warnings (run with -v for details)", warnings);
                }
            }
            Ok(())
        }
        Err(e) => {
            // A halted run's message carries the full health report.
            eprintln!("{}", red(&e.to_string()));
            std::process::exit(1);
        }
    }
}

//! CLI binary for pdf-tables.
//!
//! `serve` runs the HTTP upload gateway; `extract` runs one local file
//! through the same pipeline and prints the HTML.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_tables::{
    serve, ExtractionConfig, ExtractionProgressCallback, FailurePolicy, HttpRecognizer,
    HttpRecognizerConfig, PdfEngine, ProgressCallback, ServerConfig, TableExtractor,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar plus one log line per page. Pages arrive strictly in order,
/// so a single start time is enough.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    /// Take the bar down when extraction ends without `on_document_complete`.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn page_elapsed(&self) -> String {
        let secs = self
            .page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, table_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{table_count:>3} tables")),
            self.page_elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
            self.page_elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} pages extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the upload API on the default address
  pdf-tables serve --recognizer-url http://127.0.0.1:9000/recognize

  # Upload a file to a running server
  curl -F file=@statement.pdf http://127.0.0.1:8000/upload

  # Extract a local file to HTML
  pdf-tables extract statement.pdf -o statement.html \
      --recognizer-url http://127.0.0.1:9000/recognize

  # Keep going past unreadable pages, full JSON result
  pdf-tables extract --failure-policy best-effort --json scan.pdf

ENVIRONMENT VARIABLES:
  PDF_TABLES_RECOGNIZER_URL    Table-recognition endpoint
  PDF_TABLES_RECOGNIZER_TOKEN  Bearer token sent to the recognizer
  PDF_TABLES_DPI               Rendering DPI (72–400, default 100)
  PDF_TABLES_FAILURE_POLICY    fail-closed | best-effort
  PDF_TABLES_BIND              Server bind address (default 127.0.0.1:8000)
  PDFIUM_LIB_PATH              Directory or file of libpdfium
  RUST_LOG                     Overrides the log filter
"#;

/// Extract the tables of PDF documents as HTML.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-tables",
    version,
    about = "Extract the tables of PDF documents as HTML",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF_TABLES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF_TABLES_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP upload gateway.
    Serve(ServeArgs),
    /// Extract the tables of one local PDF file.
    Extract(ExtractArgs),
}

/// Settings shared by both subcommands.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Table-recognition endpoint (HTTP POST).
    #[arg(long, env = "PDF_TABLES_RECOGNIZER_URL")]
    recognizer_url: String,

    /// Bearer token for the recognition endpoint.
    #[arg(long, env = "PDF_TABLES_RECOGNIZER_TOKEN", hide_env_values = true)]
    recognizer_token: Option<String>,

    /// Per-page recognition timeout in seconds.
    #[arg(long, default_value_t = 120)]
    recognizer_timeout: u64,

    /// Rendering DPI (72–400), used for both token boxes and page images.
    #[arg(long, env = "PDF_TABLES_DPI", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// What to do when a page fails.
    #[arg(long, env = "PDF_TABLES_FAILURE_POLICY", value_enum, default_value = "fail-closed")]
    failure_policy: FailurePolicyArg,

    /// Directory or full path of the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Address to listen on.
    #[arg(long, env = "PDF_TABLES_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Largest accepted upload in MiB.
    #[arg(long, default_value_t = 64)]
    max_upload_mb: usize,

    /// Answer every outcome with 200 OK (status carried in the body only).
    #[arg(long)]
    legacy_status: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PDF file.
    input: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full result (HTML, per-page summary, stats) as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_TABLES_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FailurePolicyArg {
    FailClosed,
    BestEffort,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(v: FailurePolicyArg) -> Self {
        match v {
            FailurePolicyArg::FailClosed => FailurePolicy::FailClosed,
            FailurePolicyArg::BestEffort => FailurePolicy::BestEffort,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The progress bar replaces INFO logs during `extract`.
    let show_progress = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Serve(_) => false,
    };
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

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Extract(args) => run_extract(args, cli.quiet, show_progress).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    PdfEngine::new(args.pipeline.pdfium_lib_path.clone())
        .check()
        .await
        .context("PDF engine is not available")?;

    let extractor = build_extractor(&args.pipeline, None)?;
    let config = ServerConfig {
        bind: args.bind,
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        legacy_status: args.legacy_status,
    };

    serve(Arc::new(extractor), config)
        .await
        .with_context(|| format!("Server on {} failed", args.bind))
}

async fn run_extract(args: ExtractArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let bar = show_progress.then(CliProgressCallback::new);
    let progress: Option<ProgressCallback> = bar
        .clone()
        .map(|cb| cb as Arc<dyn ExtractionProgressCallback>);
    let extractor = build_extractor(&args.pipeline, progress)?;

    let extracted = match args.output {
        Some(ref output_path) => extractor.extract_to_file(&args.input, output_path).await,
        None => extractor.extract_file(&args.input).await,
    };
    let result = match extracted {
        Ok(result) => result,
        Err(e) => {
            if let Some(bar) = &bar {
                bar.abandon();
            }
            return Err(e).context("Extraction failed");
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if args.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.html.as_bytes())
            .context("Failed to write to stdout")?;
        if !result.html.is_empty() && !result.html.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !quiet {
        let target = args
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{} tables  {}/{} pages  {}ms{}",
            result.stats.table_count,
            result.stats.succeeded_pages,
            result.stats.total_pages,
            result.stats.total_duration_ms,
            target,
        );
    }

    Ok(())
}

/// Map CLI args to an [`ExtractionConfig`] and wire up the HTTP recognizer.
fn build_extractor(
    args: &PipelineArgs,
    progress: Option<ProgressCallback>,
) -> Result<TableExtractor> {
    let mut builder = ExtractionConfig::builder()
        .dpi(args.dpi)
        .failure_policy(args.failure_policy.into());
    if let Some(ref path) = args.pdfium_lib_path {
        builder = builder.pdfium_library_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let recognizer = HttpRecognizer::new(HttpRecognizerConfig {
        endpoint: args.recognizer_url.clone(),
        timeout_secs: args.recognizer_timeout,
        auth_token: args.recognizer_token.clone(),
    })
    .context("Invalid recognizer configuration")?;

    Ok(TableExtractor::new(Arc::new(recognizer), config))
}

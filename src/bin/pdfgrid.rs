//! CLI binary for pdfgrid.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ComposeConfig` and writes the composed PDF.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfgrid::{
    compose_with, ComposeConfig, EditResponse, FsResolver, InputResolver, JobProgressCallback,
    Orientation, PaperSize, PdfEngine, PdfiumEngine, ProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the input items, plus a log
/// line per item above it.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let cb = Self::with_bar(ProgressBar::new(0));
        cb.bar.enable_steady_tick(Duration::from_millis(80));
        cb
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} inputs  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Composing");
        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }

    /// Stop the bar where it is, leaving it on screen above the error.
    fn abandon(&self) {
        self.bar.abandon();
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
    }

    fn on_item_start(&self, index: usize, _total: usize) {
        self.bar.set_message(format!("input {}", index + 1));
    }

    fn on_item_complete(&self, index: usize, total: usize, pages: usize) {
        self.bar.println(format!(
            "  {} Input {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{pages} page(s)")),
        ));
        self.bar.inc(1);
    }

    fn on_item_skipped(&self, index: usize, total: usize, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Input {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total_items: usize, output_pages: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} inputs → {} page(s)",
            if skipped == 0 { green("✔") } else { red("⚠") },
            bold(&(total_items - skipped).to_string()),
            total_items,
            bold(&output_pages.to_string()),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Four photos per A4 portrait page
  pdfgrid -n 4 IMG_0001.jpg IMG_0002.jpg IMG_0003.jpg IMG_0004.jpg -o grid.pdf

  # Two slides per landscape page from a PDF
  pdfgrid -n 2 --orientation paisagem slides.pdf -o handout.pdf

  # Mix local files and URLs, print the result as base64
  pdfgrid -n 6 scan.pdf https://example.com/photo.png --base64

  # Bridge-style JSON response on stdout
  pdfgrid -n 2 --json a.jpg b.jpg

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH     Path to libpdfium (otherwise cache dir, next to the binary, then system)
  PDFGRID_PDFIUM_DIR  Directory holding libpdfium (default ~/.cache/pdfgrid/pdfium)
  RUST_LOG          Override the log filter (e.g. pdfgrid=debug)
"#;

/// Tile images and PDF pages into a grid PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdfgrid",
    version,
    about = "Tile images and PDF pages into a grid PDF, N per page",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input images, PDFs, file:// URIs or HTTP/HTTPS URLs, in output order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Items per output page.
    #[arg(short = 'n', long = "per-page", env = "PDFGRID_PER_PAGE", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..))]
    per_page: u16,

    /// Page orientation: retrato/portrait or paisagem/landscape.
    #[arg(long, env = "PDFGRID_ORIENTATION", default_value = "portrait")]
    orientation: String,

    /// Paper size: a4, letter, legal.
    #[arg(long, env = "PDFGRID_PAPER", default_value = "a4")]
    paper: String,

    /// Page margin and cell gutter in points.
    #[arg(long, env = "PDFGRID_MARGIN", default_value_t = 10.0)]
    margin: f32,

    /// Longest rasterised edge in pixels.
    #[arg(long, env = "PDFGRID_MAX_DIMENSION", default_value_t = 1500)]
    max_dimension: u32,

    /// Write the PDF to this file instead of stdout.
    #[arg(short, long, env = "PDFGRID_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the PDF as base64 instead of raw bytes.
    #[arg(long, env = "PDFGRID_BASE64", conflicts_with = "json")]
    base64: bool,

    /// Print a JSON response ({"status":"ok",...}) instead of the PDF.
    #[arg(long, env = "PDFGRID_JSON")]
    json: bool,

    /// Directory searched by file name for references that don't resolve directly.
    #[arg(long, env = "PDFGRID_LOOKUP_DIR")]
    lookup_dir: Option<PathBuf>,

    /// Parent directory for the per-job workspace.
    #[arg(long, env = "PDFGRID_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFGRID_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDFGRID_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFGRID_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFGRID_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    let bar = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = bar
        .clone()
        .map(|cb| cb as Arc<dyn JobProgressCallback>);
    let abandon_bar = || {
        if let Some(ref cb) = bar {
            cb.abandon();
        }
    };

    let config = match build_config(&cli, progress_cb) {
        Ok(config) => config,
        Err(e) if cli.json => return print_json(&EditResponse::from(Err(e))),
        Err(e) => {
            abandon_bar();
            return Err(e).context("Invalid options");
        }
    };

    let resolver: Arc<dyn InputResolver> = match cli.lookup_dir {
        Some(ref dir) => Arc::new(FsResolver::with_lookup_dir(dir)),
        None => Arc::new(FsResolver::new()),
    };
    let engine: Arc<dyn PdfEngine> = Arc::new(PdfiumEngine::new());

    // ── Run composition ──────────────────────────────────────────────────
    let result = compose_with(resolver, engine, &cli.inputs, &config).await;

    if cli.json {
        return print_json(&EditResponse::from(result));
    }

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            abandon_bar();
            return Err(e).context("Composition failed");
        }
    };

    if let Some(ref path) = cli.output {
        output
            .save(path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let written = if cli.base64 {
            writeln!(handle, "{}", STANDARD.encode(&output.pdf))
        } else {
            handle.write_all(&output.pdf)
        };
        written.context("Failed to write to stdout")?;
    }

    if !cli.quiet && !show_progress {
        let s = &output.stats;
        eprintln!(
            "Composed {}/{} inputs into {} page(s) in {}ms",
            s.composed_items, s.total_items, s.output_pages, s.duration_ms
        );
        if s.skipped_items > 0 {
            eprintln!("  {} inputs skipped", s.skipped_items);
        }
    }
    if !cli.quiet {
        if let Some(ref path) = cli.output {
            eprintln!("   → {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ComposeConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
) -> Result<ComposeConfig, pdfgrid::PdfGridError> {
    let orientation: Orientation = cli.orientation.parse()?;
    let paper: PaperSize = cli.paper.parse()?;

    let mut builder = ComposeConfig::builder()
        .items_per_page(usize::from(cli.per_page))
        .orientation(orientation)
        .paper(paper)
        .margin(cli.margin)
        .max_dimension(cli.max_dimension)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build()
}

fn print_json(response: &EditResponse) -> Result<()> {
    let json = serde_json::to_string_pretty(response).context("Failed to serialise response")?;
    println!("{json}");
    if response.is_ok() {
        Ok(())
    } else {
        std::process::exit(1)
    }
}

//! CLI binary for edgequake-docscan.
//!
//! A thin shim over the library crate that maps CLI flags to `ScanConfig`,
//! runs one scan and prints a preview of the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docscan::{
    scan_and_summarize, ExtractionMethod, OcrOptions, ProgressCallback, ScanConfig, ScanOutput,
    ScanProgressCallback, ScanStats,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar that first counts files, then chunks,
/// with a log line per item printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Collecting files…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to a counting bar of `total` `unit`s.
    fn activate_bar(&self, prefix: &'static str, total: usize, unit: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  {{msg}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Keep error lines to one terminal row.
fn truncate(msg: &str, max: usize) -> String {
    let first_line = msg.lines().next().unwrap_or("");
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        first_line.to_string()
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_files: usize) {
        self.activate_bar("Reading", total_files, "files");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, path: &Path) {
        self.bar.set_message(file_label(path));
    }

    fn on_file_complete(&self, path: &Path, method: ExtractionMethod, chars: usize) {
        let method = match method {
            ExtractionMethod::Native => "native",
            ExtractionMethod::Ocr => "ocr",
        };
        self.bar.println(format!(
            "  {} {:<40}  {:<6}  {}",
            green("✓"),
            file_label(path),
            dim(method),
            dim(&format!("{chars:>6} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<40}  {}",
            red("✗"),
            file_label(path),
            red(&truncate(error, 80)),
        ));
        self.bar.inc(1);
    }

    fn on_summarize_start(&self, total_chunks: usize) {
        self.activate_bar("Summarising", total_chunks, "chunks");
        self.bar.set_message("");
    }

    fn on_chunk_complete(&self, chunk_num: usize, total: usize, summary_len: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            green("✓"),
            chunk_num,
            total,
            dim(&format!("{summary_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            red("✗"),
            chunk_num,
            total,
            red(&truncate(error, 80)),
        ));
        self.bar.inc(1);
    }

    fn on_scan_complete(&self, stats: &ScanStats) {
        self.finish();
        let errors = self.errors.load(Ordering::SeqCst);
        eprintln!(
            "{} {} file(s), {} chunk(s) in {}ms{}",
            if errors == 0 { green("✔") } else { cyan("⚠") },
            bold(&stats.total_files.to_string()),
            stats.total_chunks,
            stats.total_duration_ms,
            if errors == 0 {
                String::new()
            } else {
                format!("  ({} failed)", red(&errors.to_string()))
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise every supported file in a folder
  docscan ./scans

  # Mixed inputs, no image cleanup, save both outputs
  docscan report.pdf photo.jpg --no-preprocess \
      --save-text text.txt --save-summary summary.txt

  # Timestamped outputs in a directory (text_<ms>.txt, summary_<ms>.txt)
  docscan ./scans --output-dir output_dir

  # German OCR, single-column page layout
  docscan letter.png --lang deu --psm 4

  # Another provider and model
  docscan ./scans --provider openai --model gpt-4.1-mini

  # Full run report as JSON
  docscan ./scans --json > report.json

SUPPORTED FILES:
  .pdf .png .jpg .jpeg .bmp .tiff .webp (case-insensitive; directories are
  not searched recursively)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. edgequake_docscan=debug

  Variables may also be placed in a .env file in the working directory.

SETUP:
  1. Install tesseract (apt install tesseract-ocr / brew install tesseract)
  2. Install pdfium or set PDFIUM_LIB_PATH
  3. export GEMINI_API_KEY=...
"#;

/// Extract text from PDFs and images (native or OCR) and summarise it with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docscan",
    version,
    about = "Extract text from PDFs and images and summarise it with an LLM",
    long_about = "Collect PDFs and images, read the PDF text layer where there is one, OCR \
everything else with tesseract, then summarise the combined text chunk by chunk with an LLM \
(Gemini by default; OpenAI, Anthropic, Ollama and others via edgequake-llm).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files and/or directories to scan.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Skip image cleanup (grayscale, denoise, threshold) before OCR.
    #[arg(long, env = "DOCSCAN_NO_PREPROCESS")]
    no_preprocess: bool,

    /// LLM model ID.
    #[arg(
        long,
        env = "DOCSCAN_MODEL",
        long_help = "Model used for summarisation. Default: gemini-2.5-flash-lite."
    )]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "DOCSCAN_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// Write the extracted text to this file.
    #[arg(long, env = "DOCSCAN_SAVE_TEXT")]
    save_text: Option<PathBuf>,

    /// Write the summary to this file.
    #[arg(long, env = "DOCSCAN_SAVE_SUMMARY")]
    save_summary: Option<PathBuf>,

    /// Write text_<ms>.txt and summary_<ms>.txt into this directory.
    #[arg(long, env = "DOCSCAN_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// OCR language(s), e.g. eng or eng+deu.
    #[arg(long, env = "DOCSCAN_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "DOCSCAN_PSM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Tesseract OCR engine mode (0–3).
    #[arg(long, env = "DOCSCAN_OEM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=3))]
    oem: u8,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// Rasterisation DPI for scanned PDF pages (72–600).
    #[arg(long, env = "DOCSCAN_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCSCAN_PASSWORD")]
    password: Option<String>,

    /// Maximum characters per summarisation chunk.
    #[arg(long, env = "DOCSCAN_CHUNK_CHARS", default_value_t = 3000)]
    chunk_chars: usize,

    /// Number of chunk summaries requested at once.
    #[arg(short, long, env = "DOCSCAN_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCSCAN_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOCSCAN_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Output the full run report (ScanOutput) as JSON.
    #[arg(long, env = "DOCSCAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "DOCSCAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; anything it sets must be visible to clap's
    // env fallbacks, so load it before parsing.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ScanProgressCallback>),
    )?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = scan_and_summarize(&cli.inputs, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result.context("Document scanning failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    print_results(&output);

    if !cli.quiet {
        report_saved(&config, &output);
        eprintln!("Document scanning completed successfully");
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .use_preprocess(!cli.no_preprocess)
        .dpi(cli.dpi)
        .chunk_max_chars(cli.chunk_chars)
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .ocr(OcrOptions {
            lang: cli.lang.clone(),
            page_segmentation_mode: cli.psm,
            engine_mode: cli.oem,
            command: cli.tesseract_cmd.clone(),
        });

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }

    let (text_path, summary_path) = output_paths(cli, unix_millis());
    if let Some(path) = text_path {
        builder = builder.save_text_path(path);
    }
    if let Some(path) = summary_path {
        builder = builder.save_summary_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Explicit save paths win; otherwise `--output-dir` gets timestamped names.
fn output_paths(cli: &Cli, millis: u128) -> (Option<PathBuf>, Option<PathBuf>) {
    let in_dir = |stem: &str| {
        cli.output_dir
            .as_ref()
            .map(|dir| dir.join(format!("{stem}_{millis}.txt")))
    };
    (
        cli.save_text.clone().or_else(|| in_dir("text")),
        cli.save_summary.clone().or_else(|| in_dir("summary")),
    )
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// First `limit` characters, with "..." appended when the text is longer.
fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn banner(title: &str) {
    let rule = "=".repeat(50);
    println!("\n{rule}\n{title}\n{rule}");
}

fn print_results(output: &ScanOutput) {
    if output.is_empty() {
        eprintln!(
            "{} No text extracted; nothing to summarise.",
            cyan("⚠")
        );
        return;
    }

    banner("EXTRACTED TEXT");
    println!("{}", preview(&output.extracted_text, 500));

    banner("SUMMARY");
    println!("{}", output.summary);
    println!("{}\n", "=".repeat(50));

    if let Some(ref fallback) = output.summary_fallback {
        eprintln!("{} {}", cyan("⚠"), dim(&fallback.to_string()));
    }
}

fn report_saved(config: &ScanConfig, output: &ScanOutput) {
    if output.is_empty() {
        return;
    }
    if let Some(ref path) = config.save_text_path {
        eprintln!("Saved extracted text -> {}", bold(&path.display().to_string()));
    }
    if let Some(ref path) = config.save_summary_path {
        eprintln!("Saved summary -> {}", bold(&path.display().to_string()));
    }
    eprintln!("{}", dim(&format!("model: {}", config.model_name())));
}

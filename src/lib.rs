//! # edgequake-docscan
//!
//! Extract the text of scanned and digital documents and summarise it with
//! an LLM.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paths
//!  │
//!  ├─ 1. Collect    expand directories, keep pdf/png/jpg/jpeg/bmp/tiff/webp
//!  ├─ 2. Extract    PDFs: native text layer, or rasterise + OCR when scanned
//!  │                images: preprocess + OCR as one batch
//!  ├─ 3. Chunk      ≤ 3000-char pieces cut at paragraph / sentence ends
//!  ├─ 4. Summarise  one LLM call per chunk, one call to combine them
//!  └─ 5. Save       optional text and summary files
//! ```
//!
//! A single unreadable file, failed OCR image or failed model call never
//! aborts a run: it contributes empty text and is recorded in the
//! [`ScanOutput`] report. Only setup problems (pdfium missing, tesseract
//! missing, no API key) are returned as [`ScanError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docscan::{scan_and_summarize, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ScanConfig::default();
//!     let output = scan_and_summarize(&["scans/"], &config).await?;
//!     println!("{}", output.summary);
//!     eprintln!("{} files, {} chunks", output.stats.total_files, output.stats.total_chunks);
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Tool | Needed for | Located via |
//! |------|-----------|-------------|
//! | pdfium | any PDF | `PDFIUM_LIB_PATH`, working dir, system library |
//! | tesseract | scanned PDFs, images | `PATH` or [`OcrOptions::command`] |
//! | LLM API key | any run that extracts text | provider env vars |
//!
//! Each is only probed when a run first needs it, so a directory of native
//! PDFs never needs tesseract.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docscan` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scan;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrOptions, PreprocessOptions, ScanConfig, ScanConfigBuilder, DEFAULT_MODEL};
pub use error::{ItemError, ScanError};
pub use output::{ChunkOutcome, ExtractionMethod, FileOutcome, ScanOutput, ScanStats};
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::pdf::{PdfBackend, PdfiumBackend};
pub use pipeline::preprocess::{ImagePreprocessor, NoopPreprocessor, OcrPreprocessor};
pub use pipeline::summarize::{LlmTextGenerator, TextGenerator};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use scan::{scan_and_summarize, scan_sync, Scanner};

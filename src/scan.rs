//! Pipeline driver: collect → extract → summarise → save.
//!
//! [`Scanner`] owns the collaborators for a run. [`Scanner::new`] wires up
//! the real ones (pdfium, tesseract, the OCR preprocessor and an
//! edgequake-llm provider); the `with_*` methods swap any of them out, which
//! is how the tests drive the pipeline without external tools.
//!
//! Per-item failures never surface as `Err`: they land in the returned
//! [`ScanOutput`]. `Err(ScanError)` means a collaborator could not be set up
//! at all, or an output file could not be written.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::output::{ExtractionMethod, ScanOutput, ScanStats};
use crate::pipeline::collect::collect_files;
use crate::pipeline::extract::Extractor;
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::pipeline::preprocess::{ImagePreprocessor, OcrPreprocessor};
use crate::pipeline::summarize::{LlmTextGenerator, Summarizer, TextGenerator};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs the document pipeline with one set of collaborators.
pub struct Scanner {
    config: ScanConfig,
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    preprocessor: Arc<dyn ImagePreprocessor>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Scanner {
    /// Scanner with the real collaborators described by `config`.
    ///
    /// Nothing is bound or contacted here; pdfium, tesseract and the model
    /// provider are only set up once a run actually needs them.
    pub fn new(config: ScanConfig) -> Self {
        let pdf = Arc::new(PdfiumBackend::from_env(config.password.clone()));
        let ocr = Arc::new(TesseractEngine::from_options(&config.ocr));
        let preprocessor = Arc::new(OcrPreprocessor::new(config.preprocess.clone()));
        Self {
            config,
            pdf,
            ocr,
            preprocessor,
            generator: None,
        }
    }

    pub fn with_pdf_backend(mut self, pdf: Arc<dyn PdfBackend>) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn with_ocr_engine(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn ImagePreprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Use this generator instead of resolving an LLM provider from config.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run the whole pipeline over `inputs` (files and/or directories).
    ///
    /// Returns an empty output without touching any collaborator when no
    /// supported file is found. When files yield no text, the file report is
    /// kept but summarisation is skipped.
    pub async fn run<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<ScanOutput, ScanError> {
        let total_start = Instant::now();
        let config = &self.config;
        info!("Starting document scan of {} input(s)", inputs.len());

        // ── Step 1: Collect files ────────────────────────────────────────
        let files = collect_files(inputs);
        info!("Found {} file(s) to process", files.len());
        if files.is_empty() {
            info!("No supported files found");
            return Ok(ScanOutput::default());
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_scan_start(files.len());
        }

        // ── Step 2: Extract text ─────────────────────────────────────────
        let extract_start = Instant::now();
        let extraction = Extractor::new(
            self.pdf.as_ref(),
            self.ocr.as_ref(),
            Arc::clone(&self.preprocessor),
            config,
        )
        .extract_all(&files)
        .await?;
        let extraction_duration_ms = extract_start.elapsed().as_millis() as u64;

        let mut stats = file_stats(&extraction.files);
        stats.extraction_duration_ms = extraction_duration_ms;

        if extraction.text.trim().is_empty() {
            info!("No text extracted from files");
            stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
            return Ok(ScanOutput {
                files: extraction.files,
                stats,
                ..Default::default()
            });
        }
        stats.extracted_chars = extraction.text.chars().count();
        info!("Extracted text length: {} chars", stats.extracted_chars);

        // ── Step 3: Summarise ────────────────────────────────────────────
        let generator: Arc<dyn TextGenerator> = match self.generator {
            Some(ref g) => Arc::clone(g),
            None => Arc::new(LlmTextGenerator::from_config(config)?),
        };
        info!("Generating summary with {}", config.model_name());

        let summary_start = Instant::now();
        let summary = Summarizer::new(generator, config.chunk_max_chars)
            .with_concurrency(config.concurrency)
            .with_progress(config.progress_callback.clone())
            .summarize(&extraction.text)
            .await;
        stats.summary_duration_ms = summary_start.elapsed().as_millis() as u64;
        stats.total_chunks = summary.chunks.len();
        stats.failed_chunks = summary.chunks.iter().filter(|c| c.error.is_some()).count();
        stats.summary_chars = summary.text.chars().count();
        info!("Summary generated length: {} chars", stats.summary_chars);

        // ── Step 4: Save outputs ─────────────────────────────────────────
        if let Some(ref path) = config.save_text_path {
            write_atomic(path, &extraction.text).await?;
            info!("Saved extracted text -> {}", path.display());
        }
        if let Some(ref path) = config.save_summary_path {
            write_atomic(path, &summary.text).await?;
            info!("Saved summary -> {}", path.display());
        }

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        if let Some(ref cb) = config.progress_callback {
            cb.on_scan_complete(&stats);
        }

        Ok(ScanOutput {
            extracted_text: extraction.text,
            summary: summary.text,
            files: extraction.files,
            chunks: summary.chunks,
            summary_fallback: summary.fallback,
            stats,
        })
    }
}

/// Scan `inputs` and summarise the extracted text.
///
/// This is the primary entry point for the library. It builds a
/// [`Scanner`] with the real collaborators and runs it once.
///
/// # Errors
/// Only setup-level failures are returned as `Err`: pdfium cannot be bound,
/// the OCR engine cannot start, no LLM provider is configured, or an output
/// file cannot be written.
pub async fn scan_and_summarize<P: AsRef<Path>>(
    inputs: &[P],
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    Scanner::new(config.clone()).run(inputs).await
}

/// Synchronous wrapper around [`scan_and_summarize`].
///
/// Creates a temporary tokio runtime internally.
pub fn scan_sync<P: AsRef<Path>>(
    inputs: &[P],
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scan_and_summarize(inputs, config))
}

/// Write `contents` to `path`, creating parent directories.
///
/// Atomic write: the data goes to a sibling temp file that is then renamed
/// over `path`, so readers never observe a partial file.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), ScanError> {
    let write_err = |source| ScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

fn file_stats(files: &[crate::output::FileOutcome]) -> ScanStats {
    let failed_items = files
        .iter()
        .map(|f| {
            if f.error.is_some() {
                f.failed_pages.max(1)
            } else {
                f.failed_pages
            }
        })
        .sum();

    ScanStats {
        total_files: files.len(),
        native_files: files
            .iter()
            .filter(|f| f.method == ExtractionMethod::Native)
            .count(),
        ocr_files: files
            .iter()
            .filter(|f| f.method == ExtractionMethod::Ocr)
            .count(),
        failed_items,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemError;
    use crate::output::FileOutcome;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_atomic_creates_parents_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/summary.txt");

        write_atomic(&path, "first").await.unwrap();
        write_atomic(&path, "second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn write_atomic_reports_path_on_failure() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_atomic(&blocker.join("child.txt"), "data").await.unwrap_err();
        assert!(matches!(err, ScanError::OutputWriteFailed { .. }));
    }

    #[tokio::test]
    async fn empty_input_touches_nothing() {
        let out = Scanner::new(ScanConfig::default())
            .run::<PathBuf>(&[])
            .await
            .unwrap();
        assert_eq!(out.into_pair(), (String::new(), String::new()));
    }

    #[test]
    fn file_stats_counts_methods_and_failures() {
        let mut native = FileOutcome::new("a.pdf", ExtractionMethod::Native);
        native.chars = 10;
        let mut scanned = FileOutcome::new("b.pdf", ExtractionMethod::Ocr);
        scanned.failed_pages = 2;
        let mut broken = FileOutcome::new("c.png", ExtractionMethod::Ocr);
        broken.error = Some(ItemError::ImageDecode {
            path: "c.png".into(),
            detail: "truncated".into(),
        });

        let stats = file_stats(&[native, scanned, broken]);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.native_files, 1);
        assert_eq!(stats.ocr_files, 2);
        assert_eq!(stats.failed_items, 3);
    }
}

//! Result types for a scan-and-summarise run.
//!
//! [`ScanOutput`] carries the two strings every caller wants (the extracted
//! text and the summary) plus a per-file and per-chunk report so richer
//! callers can see what failed without parsing logs.

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a file's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Read from the PDF's embedded text layer.
    Native,
    /// Rasterised (if needed) and run through the OCR engine.
    Ocr,
}

/// What happened to one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub method: ExtractionMethod,
    /// Pages read or rasterised (1 for an image file).
    pub pages: usize,
    /// Pages or images whose OCR call failed.
    pub failed_pages: usize,
    /// Characters this file contributed to the extracted text.
    pub chars: usize,
    /// Set when the file as a whole could not be read.
    pub error: Option<ItemError>,
}

impl FileOutcome {
    pub(crate) fn new(path: impl Into<PathBuf>, method: ExtractionMethod) -> Self {
        Self {
            path: path.into(),
            method,
            pages: 0,
            failed_pages: 0,
            chars: 0,
            error: None,
        }
    }
}

/// What happened to one chunk during summarisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOutcome {
    /// 1-indexed chunk number.
    pub chunk_num: usize,
    /// Characters in the chunk sent to the model.
    pub chars: usize,
    /// The model's raw response; empty on failure.
    pub summary: String,
    pub error: Option<ItemError>,
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_files: usize,
    pub native_files: usize,
    pub ocr_files: usize,
    /// Files, pages or images that contributed nothing because they failed.
    pub failed_items: usize,
    pub total_chunks: usize,
    pub failed_chunks: usize,
    pub extracted_chars: usize,
    pub summary_chars: usize,
    pub extraction_duration_ms: u64,
    pub summary_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Complete output of [`crate::scan::scan_and_summarize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOutput {
    /// All extracted text, PDFs first then images, blank-line separated.
    pub extracted_text: String,
    /// The final summary; empty when nothing was extracted.
    pub summary: String,
    pub files: Vec<FileOutcome>,
    pub chunks: Vec<ChunkOutcome>,
    /// Set when the combination call failed and `summary` is the joined
    /// chunk summaries instead.
    pub summary_fallback: Option<ItemError>,
    pub stats: ScanStats,
}

impl ScanOutput {
    /// `true` when the run found nothing to summarise.
    pub fn is_empty(&self) -> bool {
        self.extracted_text.is_empty() && self.summary.is_empty()
    }

    /// Split into the `(extracted_text, summary)` pair.
    pub fn into_pair(self) -> (String, String) {
        (self.extracted_text, self.summary)
    }
}

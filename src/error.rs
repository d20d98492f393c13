//! Error types for the edgequake-docscan library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScanError`]: **Fatal**: the run cannot proceed at all (pdfium cannot
//!   be bound, the OCR binary is missing, no LLM provider is configured, an
//!   output file cannot be written). Returned as `Err(ScanError)` from the
//!   top-level `scan*` functions.
//!
//! * [`ItemError`]: **Non-fatal**: a single file, image or chunk failed but
//!   everything else is fine. Stored inside [`crate::output::FileOutcome`] and
//!   [`crate::output::ChunkOutcome`] so callers can tell "empty because nothing
//!   was there" from "empty because extraction failed".
//!
//! Collaborator traits ([`crate::pipeline::pdf::PdfBackend`],
//! [`crate::pipeline::ocr::OcrEngine`],
//! [`crate::pipeline::summarize::TextGenerator`]) return `ScanError`; the
//! pipeline downgrades those to `ItemError` per item and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docscan library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory), place the library\n\
next to the working directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Image / OCR errors ────────────────────────────────────────────────
    /// An image file could not be opened or decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// The OCR engine binary could not be started at all.
    #[error("OCR engine '{command}' is not available: {detail}\nInstall tesseract or pass --tesseract-cmd <PATH>.")]
    OcrEngineUnavailable { command: String, detail: String },

    /// The OCR engine ran but failed on one image.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single file, image or chunk.
///
/// The run continues; the failed item contributes empty text.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// PDF could not be opened or its text layer could not be read.
    #[error("{path}: PDF read failed: {detail}")]
    PdfRead { path: PathBuf, detail: String },

    /// PDF pages could not be rasterised for OCR.
    #[error("{path}: rasterisation failed: {detail}")]
    RenderFailed { path: PathBuf, detail: String },

    /// Image file could not be decoded.
    #[error("{path}: image decode failed: {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// OCR failed on one image of a batch (0-indexed position in the batch).
    #[error("image {index}: OCR failed: {detail}")]
    OcrFailed { index: usize, detail: String },

    /// The summarisation model failed on one chunk (1-indexed).
    #[error("chunk {chunk}: model call failed: {detail}")]
    ModelFailed { chunk: usize, detail: String },

    /// The final combination call failed; chunk summaries were returned as-is.
    #[error("final combination failed: {detail}")]
    CombineFailed { detail: String },
}

impl ItemError {
    /// Downgrade a collaborator failure on a PDF into an item error.
    pub(crate) fn pdf_read(path: &std::path::Path, err: &ScanError) -> Self {
        ItemError::PdfRead {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }
    }
}

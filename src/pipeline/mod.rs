//! Pipeline stages for scanning and summarising documents.
//!
//! Each submodule implements one step. The external tools (pdfium,
//! tesseract, the LLM) sit behind a trait each, so every stage can be tested
//! with an in-memory stand-in.
//!
//! ## Data Flow
//!
//! ```text
//! collect ──▶ extract ──────────────────────────▶ chunk ──▶ summarize
//! (paths)      ├─ pdf        (text layer / pages)  (bounded)  (LLM)
//!              ├─ preprocess (scan cleanup)
//!              └─ ocr        (tesseract)
//! ```
//!
//! 1. [`collect`]: expand inputs into supported files, sorted per directory
//! 2. [`pdf`]: native-text probe, text layer, rasterisation; pdfium
//!    work runs in `spawn_blocking`
//! 3. [`preprocess`]: grayscale, denoise, adaptive threshold
//! 4. [`ocr`]: tesseract subprocess per image, failures become `""`
//! 5. [`extract`]: route each file, fold all text into one string
//! 6. [`chunk`]: split on paragraph / sentence boundaries
//! 7. [`summarize`]: per-chunk calls, then one combining call
//! 8. [`postprocess`]: deterministic cleanup of OCR text and summaries

pub mod chunk;
pub mod collect;
pub mod extract;
pub mod ocr;
pub mod pdf;
pub mod postprocess;
pub mod preprocess;
pub mod summarize;

//! Progress-callback trait for per-file and per-chunk scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive events
//! as the pipeline works through files and chunks. The library knows nothing
//! about how the host presents them; the `docscan` binary draws an
//! indicatif progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docscan::{ScanConfig, ScanProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     files: AtomicUsize,
//! }
//!
//! impl ScanProgressCallback for CountingCallback {
//!     fn on_file_start(&self, path: &Path) {
//!         self.files.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("reading {}", path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { files: AtomicUsize::new(0) });
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ExtractionMethod, ScanStats};
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it processes files and chunks.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `concurrency > 1` the chunk events may arrive
/// from several tasks at once.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once after input paths are expanded, before extraction.
    fn on_scan_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file starts being read (PDF) or decoded (image).
    fn on_file_start(&self, path: &Path) {
        let _ = path;
    }

    /// Called when a file's text has been obtained.
    ///
    /// # Arguments
    /// * `method`: native text layer or OCR
    /// * `chars` : characters contributed by this file
    fn on_file_complete(&self, path: &Path, method: ExtractionMethod, chars: usize) {
        let _ = (path, method, chars);
    }

    /// Called when a file contributes nothing because it failed.
    fn on_file_error(&self, path: &Path, error: &str) {
        let _ = (path, error);
    }

    /// Called once the text is chunked, before the first model call.
    fn on_summarize_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called when a chunk summary arrives (1-indexed chunk number).
    fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, summary_len: usize) {
        let _ = (chunk_num, total_chunks, summary_len);
    }

    /// Called when a chunk summary failed and was replaced by empty text.
    fn on_chunk_error(&self, chunk_num: usize, total_chunks: usize, error: &str) {
        let _ = (chunk_num, total_chunks, error);
    }

    /// Called once at the end of a run that produced output.
    fn on_scan_complete(&self, stats: &ScanStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;

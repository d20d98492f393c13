//! Input collection: expand user-supplied paths into supported files.
//!
//! Directories contribute their immediate children, sorted by name; nested
//! directories are not entered. Anything that is missing, unreadable, or has
//! an unsupported extension is skipped without error, so an empty result
//! means "nothing to do" rather than failure.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions (lower-case, without the dot) the pipeline can process.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "bmp", "tiff", "webp"];

/// Broad file class used to route a file through extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

/// Lower-cased extension of `path`, if it has one.
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check if the path has a supported extension (case-insensitive).
pub fn is_supported(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Classify a supported file. Returns `None` for unsupported extensions.
pub fn file_kind(path: &Path) -> Option<FileKind> {
    match extension_of(path)?.as_str() {
        "pdf" => Some(FileKind::Pdf),
        ext if SUPPORTED_EXTENSIONS.contains(&ext) => Some(FileKind::Image),
        _ => None,
    }
}

/// Expand input paths into an ordered list of supported files.
///
/// Inputs keep their given order; each directory is replaced by its matching
/// children in lexicographic order.
pub fn collect_files<P: AsRef<Path>>(inputs: &[P]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        let path = input.as_ref();
        if path.is_dir() {
            files.extend(list_directory(path));
        } else if path.is_file() {
            if is_supported(path) {
                files.push(path.to_path_buf());
            } else {
                debug!("Skipping unsupported file: {}", path.display());
            }
        } else {
            debug!("Skipping missing input: {}", path.display());
        }
    }

    debug!("Collected {} supported files", files.len());
    files
}

/// Supported regular files directly inside `dir`, sorted by name.
fn list_directory(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_supported(p))
        .collect();
    children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    children
}

//! PDF access: native text layer reading, the "has text" probe, and
//! rasterisation of scanned pages for OCR.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is not safe to call
//! from async contexts. Every pdfium call runs on Tokio's blocking pool so
//! the async workers never stall on PDF parsing or rendering.
//!
//! ## The native-text probe
//!
//! [`has_extractable_text`] only reads the first few pages (3 by default).
//! A document whose first pages are scans but whose later pages carry a
//! text layer is routed to OCR; that false negative is accepted in exchange
//! for never reading a whole document twice.

use crate::error::ScanError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Access to PDF documents.
///
/// The pipeline only needs page text and page images; everything else about
/// a PDF is the backend's business. Implemented by [`PdfiumBackend`].
#[async_trait]
pub trait PdfBackend: Send + Sync {
    /// Verify the backend can be used at all. Called once per run before the
    /// first PDF; an error here aborts the run.
    async fn check(&self) -> Result<(), ScanError> {
        Ok(())
    }

    /// Text of the first `limit` pages (all pages when `None`), in page order.
    async fn page_texts(&self, path: &Path, limit: Option<usize>)
        -> Result<Vec<String>, ScanError>;

    /// Rasterise every page at `dpi`.
    async fn render_pages(&self, path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, ScanError>;
}

// ── Policy ───────────────────────────────────────────────────────────────

/// Decide whether a PDF has a usable text layer.
///
/// Reads at most `probe_pages` pages and returns `true` as soon as the
/// untrimmed accumulated text exceeds `min_chars` characters. If the probed
/// pages run out first, the trimmed total must exceed `min_chars`. Any failure to open
/// or read the file yields `false`, which routes the file to OCR.
pub async fn has_extractable_text(
    backend: &dyn PdfBackend,
    path: &Path,
    min_chars: usize,
    probe_pages: usize,
) -> bool {
    let pages = match backend.page_texts(path, Some(probe_pages)).await {
        Ok(pages) => pages,
        Err(e) => {
            warn!("Failed to check PDF text in {}: {}", path.display(), e);
            return false;
        }
    };

    let mut total = String::new();
    for page in pages.iter().take(probe_pages) {
        total.push_str(page);
        if total.chars().count() > min_chars {
            return true;
        }
    }
    total.trim().chars().count() > min_chars
}

/// Read every page's text layer, with page markers.
///
/// Pages without text are omitted; page numbers in the markers still refer
/// to the original page positions.
pub async fn try_extract_text(backend: &dyn PdfBackend, path: &Path) -> Result<String, ScanError> {
    let pages = backend.page_texts(path, None).await?;
    debug!("Read text layer of {} pages from {}", pages.len(), path.display());
    Ok(format_pages(&pages))
}

/// Like [`try_extract_text`], but a failure is logged and yields `""`.
pub async fn extract_text(backend: &dyn PdfBackend, path: &Path) -> String {
    match try_extract_text(backend, path).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to extract text from PDF {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Join page texts as `--- Page N ---` sections separated by blank lines.
pub fn format_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(idx, text)| format!("--- Page {} ---\n{}", idx + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── pdfium backend ───────────────────────────────────────────────────────

/// [`PdfBackend`] on top of the pdfium library.
///
/// The library is located, in order, from `PDFIUM_LIB_PATH` (a file or the
/// directory containing it), the working directory, then the system library
/// search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumBackend {
    /// Backend that resolves the library from the environment.
    pub fn from_env(password: Option<String>) -> Self {
        let library = std::env::var_os("PDFIUM_LIB_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { library, password }
    }

    /// Backend bound to an explicit library file or directory.
    pub fn with_library(library: impl Into<PathBuf>, password: Option<String>) -> Self {
        Self {
            library: Some(library.into()),
            password,
        }
    }
}

#[async_trait]
impl PdfBackend for PdfiumBackend {
    async fn check(&self) -> Result<(), ScanError> {
        let library = self.library.clone();
        tokio::task::spawn_blocking(move || bind_pdfium(library.as_deref()).map(|_| ()))
            .await
            .map_err(|e| ScanError::Internal(format!("pdfium bind task panicked: {}", e)))?
    }

    async fn page_texts(
        &self,
        path: &Path,
        limit: Option<usize>,
    ) -> Result<Vec<String>, ScanError> {
        let library = self.library.clone();
        let password = self.password.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            page_texts_blocking(library.as_deref(), &path, password.as_deref(), limit)
        })
        .await
        .map_err(|e| ScanError::Internal(format!("Text task panicked: {}", e)))?
    }

    async fn render_pages(&self, path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, ScanError> {
        let library = self.library.clone();
        let password = self.password.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(library.as_deref(), &path, password.as_deref(), dpi)
        })
        .await
        .map_err(|e| ScanError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind to pdfium from an explicit location or the default search order.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, ScanError> {
    let bindings = match library {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ScanError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open a document, mapping pdfium's errors onto [`ScanError`].
fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ScanError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ScanError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ScanError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ScanError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn page_texts_blocking(
    library: Option<&Path>,
    pdf_path: &Path,
    password: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<String>, ScanError> {
    let pdfium = bind_pdfium(library)?;
    let document = load_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let wanted = limit.unwrap_or(total_pages).min(total_pages);

    let mut texts = Vec::with_capacity(wanted);
    for (idx, page) in pages.iter().take(wanted).enumerate() {
        let text = page.text().map_err(|e| ScanError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        texts.push(text.all());
    }

    Ok(texts)
}

fn render_pages_blocking(
    library: Option<&Path>,
    pdf_path: &Path,
    password: Option<&str>,
    dpi: u32,
) -> Result<Vec<DynamicImage>, ScanError> {
    let pdfium = bind_pdfium(library)?;
    let document = load_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    info!("Rasterising {} pages of {} at {} DPI", pages.len(), pdf_path.display(), dpi);

    // PDF user space is 72 points per inch.
    let scale = dpi as f32 / 72.0;
    let mut images = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let width = (page.width().value * scale).round() as i32;
        let height = (page.height().value * scale).round() as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width.max(1))
            .set_target_height(height.max(1))
            .render_form_data(true);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ScanError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}

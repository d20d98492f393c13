//! Text extraction orchestrator: route each file to the PDF text layer or
//! to OCR, then fold everything into one document string.
//!
//! PDFs are handled first, one at a time in input order; all image files
//! then go through OCR as a single batch. Each PDF contributes one segment,
//! the image batch contributes one more, and blank segments are dropped
//! before joining with blank lines.
//!
//! Collaborators are probed lazily: pdfium is only bound when there is a
//! PDF, and the OCR engine is only checked when an image actually needs
//! recognising. A failed probe is the one fatal outcome here; every other
//! failure is recorded on the file's [`FileOutcome`] and skipped.

use crate::config::ScanConfig;
use crate::error::{ItemError, ScanError};
use crate::output::{ExtractionMethod, FileOutcome};
use crate::pipeline::collect::{file_kind, FileKind};
use crate::pipeline::ocr::{join_texts, ocr_batch_detailed, OcrEngine};
use crate::pipeline::pdf::{format_pages, has_extractable_text, PdfBackend};
use crate::pipeline::preprocess::ImagePreprocessor;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extracted document text plus what happened to each file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text: String,
    pub files: Vec<FileOutcome>,
}

/// Routes files through the PDF backend and OCR engine for one run.
pub struct Extractor<'a> {
    pdf: &'a dyn PdfBackend,
    ocr: &'a dyn OcrEngine,
    preprocessor: Option<Arc<dyn ImagePreprocessor>>,
    config: &'a ScanConfig,
    pdf_ready: bool,
    ocr_ready: bool,
}

impl<'a> Extractor<'a> {
    /// `preprocessor` is applied to every OCR image only when
    /// `config.use_preprocess` is set.
    pub fn new(
        pdf: &'a dyn PdfBackend,
        ocr: &'a dyn OcrEngine,
        preprocessor: Arc<dyn ImagePreprocessor>,
        config: &'a ScanConfig,
    ) -> Self {
        Self {
            pdf,
            ocr,
            preprocessor: config.use_preprocess.then_some(preprocessor),
            config,
            pdf_ready: false,
            ocr_ready: false,
        }
    }

    /// Extract and join the text of `files`.
    ///
    /// Returns an empty string when `files` is empty or nothing readable was
    /// found; callers must then skip summarisation.
    pub async fn extract_all(&mut self, files: &[PathBuf]) -> Result<Extraction, ScanError> {
        let (pdfs, images): (Vec<&PathBuf>, Vec<&PathBuf>) = files
            .iter()
            .filter(|p| file_kind(p).is_some())
            .partition(|p| file_kind(p) == Some(FileKind::Pdf));

        let mut segments = Vec::new();
        let mut outcomes = Vec::with_capacity(files.len());

        for path in pdfs {
            let (outcome, text) = self.extract_pdf(path).await?;
            self.report(&outcome);
            outcomes.push(outcome);
            if !text.trim().is_empty() {
                segments.push(text);
            }
        }

        if !images.is_empty() {
            let (image_outcomes, text) = self.extract_images(&images).await?;
            for outcome in &image_outcomes {
                self.report(outcome);
            }
            outcomes.extend(image_outcomes);
            if !text.trim().is_empty() {
                segments.push(text);
            }
        }

        let text = segments.join("\n\n");
        info!(
            "Extracted {} chars from {} file(s)",
            text.chars().count(),
            outcomes.len()
        );
        Ok(Extraction {
            text,
            files: outcomes,
        })
    }

    async fn ensure_pdf_ready(&mut self) -> Result<(), ScanError> {
        if !self.pdf_ready {
            self.pdf.check().await?;
            self.pdf_ready = true;
        }
        Ok(())
    }

    async fn ensure_ocr_ready(&mut self) -> Result<(), ScanError> {
        if !self.ocr_ready {
            self.ocr.check().await?;
            self.ocr_ready = true;
        }
        Ok(())
    }

    fn report(&self, outcome: &FileOutcome) {
        let Some(ref cb) = self.config.progress_callback else {
            return;
        };
        match &outcome.error {
            Some(e) => cb.on_file_error(&outcome.path, &e.to_string()),
            None => cb.on_file_complete(&outcome.path, outcome.method, outcome.chars),
        }
    }

    fn file_started(&self, path: &Path) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_start(path);
        }
    }

    /// One PDF: native text layer if it has one, otherwise OCR of every page.
    async fn extract_pdf(&mut self, path: &Path) -> Result<(FileOutcome, String), ScanError> {
        self.file_started(path);
        self.ensure_pdf_ready().await?;

        let native = has_extractable_text(
            self.pdf,
            path,
            self.config.min_native_chars,
            self.config.native_probe_pages,
        )
        .await;

        if native {
            let mut outcome = FileOutcome::new(path, ExtractionMethod::Native);
            let text = match self.pdf.page_texts(path, None).await {
                Ok(pages) => {
                    outcome.pages = pages.len();
                    format_pages(&pages)
                }
                Err(e) => {
                    warn!("Failed to extract text from PDF {}: {}", path.display(), e);
                    outcome.error = Some(ItemError::pdf_read(path, &e));
                    String::new()
                }
            };
            if text.trim().is_empty() {
                debug!("{}: text layer is blank, contributing nothing", path.display());
            }
            outcome.chars = text.chars().count();
            return Ok((outcome, text));
        }

        let mut outcome = FileOutcome::new(path, ExtractionMethod::Ocr);
        let images = match self.pdf.render_pages(path, self.config.dpi).await {
            Ok(images) => images,
            Err(e) => {
                warn!("Failed to rasterise PDF {}: {}", path.display(), e);
                outcome.error = Some(match &e {
                    ScanError::CorruptPdf { .. }
                    | ScanError::PasswordRequired { .. }
                    | ScanError::WrongPassword { .. } => ItemError::pdf_read(path, &e),
                    _ => ItemError::RenderFailed {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    },
                });
                return Ok((outcome, String::new()));
            }
        };

        outcome.pages = images.len();
        if images.is_empty() {
            return Ok((outcome, String::new()));
        }

        info!("OCR of {} page(s) from {}", images.len(), path.display());
        self.ensure_ocr_ready().await?;
        let results =
            ocr_batch_detailed(self.ocr, images, self.preprocessor.clone(), &self.config.ocr).await;
        outcome.failed_pages = results.iter().filter(|r| r.is_err()).count();

        let text = join_texts(&results);
        outcome.chars = text.trim().chars().count();
        Ok((outcome, text))
    }

    /// All image files, decoded and OCR'd as one batch.
    async fn extract_images(
        &mut self,
        paths: &[&PathBuf],
    ) -> Result<(Vec<FileOutcome>, String), ScanError> {
        let mut outcomes = Vec::with_capacity(paths.len());
        let mut decoded: Vec<(usize, DynamicImage)> = Vec::with_capacity(paths.len());

        for path in paths {
            self.file_started(path);
            let mut outcome = FileOutcome::new(path.as_path(), ExtractionMethod::Ocr);
            match decode_image(path).await {
                Ok(image) => {
                    outcome.pages = 1;
                    decoded.push((outcomes.len(), image));
                }
                Err(e) => {
                    warn!("Failed to decode image {}: {}", path.display(), e);
                    outcome.error = Some(ItemError::ImageDecode {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    });
                }
            }
            outcomes.push(outcome);
        }

        if decoded.is_empty() {
            return Ok((outcomes, String::new()));
        }

        info!("OCR of {} image(s)", decoded.len());
        self.ensure_ocr_ready().await?;
        let (owners, images): (Vec<usize>, Vec<DynamicImage>) = decoded.into_iter().unzip();
        let results =
            ocr_batch_detailed(self.ocr, images, self.preprocessor.clone(), &self.config.ocr).await;

        for (batch_idx, (owner, result)) in owners.iter().zip(&results).enumerate() {
            let outcome = &mut outcomes[*owner];
            match result {
                Ok(text) => outcome.chars = text.chars().count(),
                Err(e) => {
                    outcome.failed_pages = 1;
                    outcome.error = Some(ItemError::OcrFailed {
                        index: batch_idx,
                        detail: e.to_string(),
                    });
                }
            }
        }

        Ok((outcomes, join_texts(&results)))
    }
}

/// Decode an image file on the blocking pool.
async fn decode_image(path: &Path) -> Result<DynamicImage, ScanError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || image::open(&owned))
        .await
        .map_err(|e| ScanError::Internal(format!("Decode task panicked: {}", e)))?
        .map_err(|e| ScanError::ImageDecode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrOptions;
    use crate::pipeline::preprocess::NoopPreprocessor;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// PDFs whose file stem says what they hold: `native*` has a text layer,
    /// `scan*` has two image-only pages, `broken*` cannot be opened.
    struct FakePdf {
        checks: AtomicUsize,
    }

    #[async_trait]
    impl PdfBackend for FakePdf {
        async fn check(&self) -> Result<(), ScanError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn page_texts(
            &self,
            path: &Path,
            limit: Option<usize>,
        ) -> Result<Vec<String>, ScanError> {
            let stem = path.file_stem().unwrap().to_str().unwrap();
            let pages = if stem.starts_with("native") {
                vec![format!("{} body text. ", stem).repeat(20), String::new()]
            } else if stem.starts_with("scan") {
                vec![String::new(), String::new()]
            } else {
                return Err(ScanError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: "no header".into(),
                });
            };
            Ok(pages.into_iter().take(limit.unwrap_or(usize::MAX)).collect())
        }

        async fn render_pages(&self, path: &Path, _dpi: u32) -> Result<Vec<DynamicImage>, ScanError> {
            let stem = path.file_stem().unwrap().to_str().unwrap();
            if stem.starts_with("broken") {
                return Err(ScanError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: "no header".into(),
                });
            }
            Ok(vec![
                DynamicImage::ImageRgb8(RgbImage::new(11, 2)),
                DynamicImage::ImageRgb8(RgbImage::new(12, 2)),
            ])
        }
    }

    /// OCR returning "ocr-{width}", failing for width 12.
    #[derive(Default)]
    struct FakeOcr {
        calls: Mutex<Vec<u32>>,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        async fn check(&self) -> Result<(), ScanError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn recognize(
            &self,
            image: &DynamicImage,
            _options: &OcrOptions,
        ) -> Result<String, ScanError> {
            self.calls.lock().unwrap().push(image.width());
            if image.width() == 12 {
                return Err(ScanError::OcrFailed {
                    detail: "segfault".into(),
                });
            }
            Ok(format!("ocr-{}", image.width()))
        }
    }

    fn fakes() -> (FakePdf, FakeOcr) {
        (
            FakePdf {
                checks: AtomicUsize::new(0),
            },
            FakeOcr::default(),
        )
    }

    fn write_png(dir: &Path, name: &str, width: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::new(width, 3).save(&path).unwrap();
        path
    }

    fn config() -> ScanConfig {
        ScanConfig::builder().use_preprocess(false).build().unwrap()
    }

    #[tokio::test]
    async fn native_pdf_never_touches_ocr() {
        let (pdf, ocr) = fakes();
        let config = config();
        let mut ex = Extractor::new(&pdf, &ocr, Arc::new(NoopPreprocessor), &config);

        let out = ex.extract_all(&[PathBuf::from("native.pdf")]).await.unwrap();

        assert!(out.text.starts_with("--- Page 1 ---\nnative body text."));
        assert!(!out.text.contains("Page 2"));
        assert!(ocr.calls.lock().unwrap().is_empty());
        assert_eq!(ocr.checks.load(Ordering::SeqCst), 0);
        assert_eq!(out.files[0].method, ExtractionMethod::Native);
        assert_eq!(out.files[0].pages, 2);
    }

    #[tokio::test]
    async fn scanned_pdf_goes_through_ocr_with_empty_segment_for_failures() {
        let (pdf, ocr) = fakes();
        let config = config();
        let mut ex = Extractor::new(&pdf, &ocr, Arc::new(NoopPreprocessor), &config);

        let out = ex.extract_all(&[PathBuf::from("scan.pdf")]).await.unwrap();

        assert_eq!(out.text, "ocr-11\n\n");
        assert_eq!(out.files[0].method, ExtractionMethod::Ocr);
        assert_eq!(out.files[0].failed_pages, 1);
        assert_eq!(out.files[0].chars, 6);
    }

    #[tokio::test]
    async fn pdfs_come_before_images_and_images_form_one_batch() {
        let tmp = TempDir::new().unwrap();
        let a = write_png(tmp.path(), "a.png", 5);
        let b = write_png(tmp.path(), "b.png", 6);
        let (pdf, ocr) = fakes();
        let config = config();
        let mut ex = Extractor::new(&pdf, &ocr, Arc::new(NoopPreprocessor), &config);

        let files = vec![a, PathBuf::from("native.pdf"), b];
        let out = ex.extract_all(&files).await.unwrap();

        let native_end = out.text.find("ocr-5").unwrap();
        assert!(out.text[..native_end].contains("native body text."));
        assert!(out.text.ends_with("\n\nocr-5\n\nocr-6"));
        assert_eq!(*ocr.calls.lock().unwrap(), vec![5, 6]);
        assert_eq!(ocr.checks.load(Ordering::SeqCst), 1);
        assert_eq!(pdf.checks.load(Ordering::SeqCst), 1);
        let names: Vec<_> = out.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(names[0], PathBuf::from("native.pdf"));
    }

    #[tokio::test]
    async fn undecodable_image_contributes_nothing() {
        let tmp = TempDir::new().unwrap();
        let good = write_png(tmp.path(), "good.png", 7);
        let bad = tmp.path().join("bad.jpg");
        std::fs::write(&bad, b"not a jpeg").unwrap();
        let (pdf, ocr) = fakes();
        let config = config();
        let mut ex = Extractor::new(&pdf, &ocr, Arc::new(NoopPreprocessor), &config);

        let out = ex.extract_all(&[bad.clone(), good]).await.unwrap();

        assert_eq!(out.text, "ocr-7");
        assert!(matches!(out.files[0].error, Some(ItemError::ImageDecode { .. })));
        assert_eq!(pdf.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_ocr_failure_is_recorded_per_file() {
        let tmp = TempDir::new().unwrap();
        let ok = write_png(tmp.path(), "ok.png", 4);
        let failing = write_png(tmp.path(), "failing.png", 12);
        let (pdf, ocr) = fakes();
        let config = config();
        let mut ex = Extractor::new(&pdf, &ocr, Arc::new(NoopPreprocessor), &config);

        let out = ex.extract_all(&[ok, failing]).await.unwrap();

        assert_eq!(out.text, "ocr-4\n\n");
        assert!(matches!(
            out.files[1].error,
            Some(ItemError::OcrFailed { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn broken_pdf_is_skipped() {
        let (pdf, ocr) = fakes();
        let config = config();
        let mut ex = Extractor::new(&pdf, &ocr, Arc::new(NoopPreprocessor), &config);

        let out = ex
            .extract_all(&[PathBuf::from("broken.pdf"), PathBuf::from("native2.pdf")])
            .await
            .unwrap();

        assert!(matches!(out.files[0].error, Some(ItemError::PdfRead { .. })));
        assert!(out.text.starts_with("--- Page 1 ---\nnative2"));
        assert!(ocr.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn nothing_in_nothing_out() {
        let (pdf, ocr) = fakes();
        let config = config();
        let mut ex = Extractor::new(&pdf, &ocr, Arc::new(NoopPreprocessor), &config);

        let out = ex.extract_all(&[]).await.unwrap();
        assert_eq!(out.text, "");
        assert!(out.files.is_empty());
        assert_eq!(pdf.checks.load(Ordering::SeqCst), 0);
        assert_eq!(ocr.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_ocr_check_is_fatal() {
        struct NoEngine;

        #[async_trait]
        impl OcrEngine for NoEngine {
            async fn check(&self) -> Result<(), ScanError> {
                Err(ScanError::OcrEngineUnavailable {
                    command: "tesseract".into(),
                    detail: "not found".into(),
                })
            }

            async fn recognize(&self, _: &DynamicImage, _: &OcrOptions) -> Result<String, ScanError> {
                unreachable!("check failed")
            }
        }

        let tmp = TempDir::new().unwrap();
        let png = write_png(tmp.path(), "a.png", 3);
        let (pdf, _) = fakes();
        let config = config();
        let engine = NoEngine;
        let mut ex = Extractor::new(&pdf, &engine, Arc::new(NoopPreprocessor), &config);

        let err = ex.extract_all(&[png]).await.unwrap_err();
        assert!(matches!(err, ScanError::OcrEngineUnavailable { .. }));
    }
}

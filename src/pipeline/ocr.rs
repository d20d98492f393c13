//! OCR: run the engine over images and stitch the text together.
//!
//! A single unreadable image must never sink a multi-file batch, so
//! [`ocr`] and [`ocr_batch`] swallow per-image failures (logging them) and
//! substitute empty text. Callers that want to see the failures use
//! [`ocr_batch_detailed`], which keeps one `Result` per image.

use crate::config::OcrOptions;
use crate::error::ScanError;
use crate::pipeline::postprocess::clean_ocr_text;
use crate::pipeline::preprocess::ImagePreprocessor;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// An OCR engine: image in, plain text out.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Verify the engine can run at all. Called once per run before the
    /// first image; an error here aborts the run.
    async fn check(&self) -> Result<(), ScanError> {
        Ok(())
    }

    /// Recognise the text in one image.
    async fn recognize(
        &self,
        image: &DynamicImage,
        options: &OcrOptions,
    ) -> Result<String, ScanError>;
}

/// OCR one image; a failure is logged and yields `""`.
pub async fn ocr(engine: &dyn OcrEngine, image: &DynamicImage, options: &OcrOptions) -> String {
    match engine.recognize(image, options).await {
        Ok(text) => text,
        Err(e) => {
            warn!("OCR failed: {}", e);
            String::new()
        }
    }
}

/// OCR every image in order, optionally preprocessing each one first.
///
/// Preprocessing is CPU-heavy and runs on the blocking pool.
pub async fn ocr_batch_detailed(
    engine: &dyn OcrEngine,
    images: Vec<DynamicImage>,
    preprocessor: Option<Arc<dyn ImagePreprocessor>>,
    options: &OcrOptions,
) -> Vec<Result<String, ScanError>> {
    let total = images.len();
    let mut results = Vec::with_capacity(total);

    for (idx, image) in images.into_iter().enumerate() {
        let image = match &preprocessor {
            Some(pre) => {
                let pre = Arc::clone(pre);
                match tokio::task::spawn_blocking(move || pre.preprocess(image)).await {
                    Ok(img) => img,
                    Err(e) => {
                        let err = ScanError::Internal(format!("Preprocess task panicked: {}", e));
                        warn!("Image {}/{}: {}", idx + 1, total, err);
                        results.push(Err(err));
                        continue;
                    }
                }
            }
            None => image,
        };

        let result = engine.recognize(&image, options).await;
        match &result {
            Ok(text) => debug!("Image {}/{}: {} chars", idx + 1, total, text.chars().count()),
            Err(e) => warn!("Image {}/{}: OCR failed: {}", idx + 1, total, e),
        }
        results.push(result);
    }

    results
}

/// OCR a batch and join the texts with blank lines, in input order.
///
/// A failed image leaves an empty segment in its place.
pub async fn ocr_batch(
    engine: &dyn OcrEngine,
    images: Vec<DynamicImage>,
    preprocessor: Option<Arc<dyn ImagePreprocessor>>,
    options: &OcrOptions,
) -> String {
    join_texts(&ocr_batch_detailed(engine, images, preprocessor, options).await)
}

/// Join per-image results, substituting `""` for failures.
pub fn join_texts(results: &[Result<String, ScanError>]) -> String {
    results
        .iter()
        .map(|r| r.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── tesseract ────────────────────────────────────────────────────────────

/// [`OcrEngine`] wrapping the `tesseract` CLI tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
}

impl TesseractEngine {
    /// Engine running the given executable (a name on `PATH` or a full path).
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Engine running the executable named in `options`.
    pub fn from_options(options: &OcrOptions) -> Self {
        Self::new(options.command.clone())
    }

    fn unavailable(&self, detail: impl Into<String>) -> ScanError {
        ScanError::OcrEngineUnavailable {
            command: self.command.display().to_string(),
            detail: detail.into(),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::from_options(&OcrOptions::default())
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn check(&self) -> Result<(), ScanError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(self.unavailable(failure_detail(&output)));
        }
        debug!(
            "Using {}",
            String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or("tesseract")
        );
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(w = image.width(), h = image.height()))]
    async fn recognize(
        &self,
        image: &DynamicImage,
        options: &OcrOptions,
    ) -> Result<String, ScanError> {
        // Write the image to a temporary PNG for tesseract to read.
        let tmpdir = tempfile::TempDir::with_prefix("docscan-ocr")
            .map_err(|e| ScanError::Internal(format!("cannot create temp dir: {}", e)))?;
        let input_path = tmpdir.path().join("input.png");
        encodable(image)
            .save_with_format(&input_path, ImageFormat::Png)
            .map_err(|e| ScanError::OcrFailed {
                detail: format!("cannot write tesseract input: {}", e),
            })?;

        let output = Command::new(&self.command)
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&options.lang)
            .arg("--oem")
            .arg(options.engine_mode.to_string())
            .arg("--psm")
            .arg(options.page_segmentation_mode.to_string())
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(ScanError::OcrFailed {
                detail: failure_detail(&output),
            });
        }

        Ok(clean_ocr_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// PNG can store 8-bit gray and RGB(A) directly; anything else is converted.
fn encodable(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

/// Exit status plus the first lines of stderr.
fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr: String = stderr.lines().take(5).collect::<Vec<_>>().join("\n");
    format!(
        "exit code {}: {}",
        output.status.code().unwrap_or(-1),
        stderr.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns "text-{width}" for each image, failing on chosen widths.
    struct FakeEngine {
        fail_widths: Vec<u32>,
        seen: Mutex<Vec<(u32, bool)>>,
    }

    impl FakeEngine {
        fn failing_on(fail_widths: &[u32]) -> Self {
            Self {
                fail_widths: fail_widths.to_vec(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for FakeEngine {
        async fn recognize(
            &self,
            image: &DynamicImage,
            _options: &OcrOptions,
        ) -> Result<String, ScanError> {
            let is_gray = matches!(image, DynamicImage::ImageLuma8(_));
            self.seen.lock().unwrap().push((image.width(), is_gray));
            if self.fail_widths.contains(&image.width()) {
                return Err(ScanError::OcrFailed {
                    detail: "engine crashed".into(),
                });
            }
            Ok(format!("text-{}", image.width()))
        }
    }

    struct CountingGray {
        calls: AtomicUsize,
    }

    impl ImagePreprocessor for CountingGray {
        fn preprocess(&self, image: DynamicImage) -> DynamicImage {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DynamicImage::ImageLuma8(image.to_luma8())
        }
    }

    fn img(width: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, 4))
    }

    #[tokio::test]
    async fn batch_keeps_order_and_blank_separator() {
        let engine = FakeEngine::failing_on(&[]);
        let text = ocr_batch(&engine, vec![img(1), img(2), img(3)], None, &OcrOptions::default()).await;
        assert_eq!(text, "text-1\n\ntext-2\n\ntext-3");
    }

    #[tokio::test]
    async fn failed_image_leaves_empty_segment() {
        let engine = FakeEngine::failing_on(&[2]);
        let text = ocr_batch(&engine, vec![img(1), img(2), img(3)], None, &OcrOptions::default()).await;
        assert_eq!(text, "text-1\n\n\n\ntext-3");
    }

    #[tokio::test]
    async fn detailed_batch_reports_each_image() {
        let engine = FakeEngine::failing_on(&[1]);
        let results =
            ocr_batch_detailed(&engine, vec![img(1), img(5)], None, &OcrOptions::default()).await;
        assert!(results[0].is_err());
        assert_eq!(results[1].as_deref().unwrap(), "text-5");
    }

    #[tokio::test]
    async fn preprocessor_runs_before_engine() {
        let engine = FakeEngine::failing_on(&[]);
        let pre = Arc::new(CountingGray {
            calls: AtomicUsize::new(0),
        });
        let dyn_pre: Arc<dyn ImagePreprocessor> = pre.clone();
        ocr_batch(&engine, vec![img(1), img(2)], Some(dyn_pre), &OcrOptions::default()).await;

        assert_eq!(pre.calls.load(Ordering::SeqCst), 2);
        assert!(engine.seen.lock().unwrap().iter().all(|(_, gray)| *gray));
    }

    #[tokio::test]
    async fn single_image_failure_is_empty_text() {
        let engine = FakeEngine::failing_on(&[7]);
        assert_eq!(ocr(&engine, &img(7), &OcrOptions::default()).await, "");
        assert_eq!(ocr(&engine, &img(8), &OcrOptions::default()).await, "text-8");
    }

    #[tokio::test]
    async fn empty_batch_is_empty_string() {
        let engine = FakeEngine::failing_on(&[]);
        assert_eq!(ocr_batch(&engine, Vec::new(), None, &OcrOptions::default()).await, "");
    }

    #[tokio::test]
    async fn missing_tesseract_fails_check() {
        let engine = TesseractEngine::new("/definitely/not/tesseract");
        let err = engine.check().await.unwrap_err();
        assert!(matches!(err, ScanError::OcrEngineUnavailable { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn missing_tesseract_fails_recognize() {
        let engine = TesseractEngine::new("/definitely/not/tesseract");
        assert!(engine.recognize(&img(4), &OcrOptions::default()).await.is_err());
    }

    #[test]
    fn encodable_converts_float_images() {
        let float = DynamicImage::ImageRgb32F(image::Rgb32FImage::new(2, 2));
        assert!(matches!(*encodable(&float), DynamicImage::ImageRgb8(_)));
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(2, 2));
        assert!(matches!(encodable(&gray), Cow::Borrowed(_)));
    }
}

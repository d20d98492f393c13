//! Configuration types for a scan-and-summarise run.
//!
//! All behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. The OCR engine path, the model name and the
//! provider are all carried here and handed to the pipeline explicitly;
//! nothing is read from process-wide state once the config is built.

use crate::error::ScanError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Configuration for one scan-and-summarise run.
///
/// Built via [`ScanConfig::builder()`] or using [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docscan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .use_preprocess(false)
///     .model("gemini-2.5-flash")
///     .chunk_max_chars(4000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Run the image preprocessor before OCR. Default: true.
    pub use_preprocess: bool,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`] is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for summarisation calls. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 2048.
    pub max_tokens: usize,

    /// Rasterisation DPI for scanned PDF pages. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Maximum characters per chunk sent to the model. Default: 3000.
    pub chunk_max_chars: usize,

    /// A PDF needs more than this many characters in its first pages to be
    /// treated as having a native text layer. Default: 100.
    pub min_native_chars: usize,

    /// How many leading pages the native-text probe reads. Default: 3.
    pub native_probe_pages: usize,

    /// Number of chunk summaries requested at once. Default: 1 (sequential).
    ///
    /// Chunk calls are independent, so raising this is safe when the
    /// provider tolerates concurrent requests. Output order never changes.
    pub concurrency: usize,

    /// OCR engine parameters.
    pub ocr: OcrOptions,

    /// Image preprocessing parameters (used when `use_preprocess` is set).
    pub preprocess: PreprocessOptions,

    /// Write the extracted text here (whole-file overwrite, UTF-8).
    pub save_text_path: Option<PathBuf>,

    /// Write the final summary here (whole-file overwrite, UTF-8).
    pub save_summary_path: Option<PathBuf>,

    /// Optional progress callback for per-file and per-chunk events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            use_preprocess: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            dpi: 300,
            password: None,
            chunk_max_chars: 3000,
            min_native_chars: 100,
            native_probe_pages: 3,
            concurrency: 1,
            ocr: OcrOptions::default(),
            preprocess: PreprocessOptions::default(),
            save_text_path: None,
            save_summary_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("use_preprocess", &self.use_preprocess)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("dpi", &self.dpi)
            .field("chunk_max_chars", &self.chunk_max_chars)
            .field("min_native_chars", &self.min_native_chars)
            .field("native_probe_pages", &self.native_probe_pages)
            .field("concurrency", &self.concurrency)
            .field("ocr", &self.ocr)
            .field("preprocess", &self.preprocess)
            .field("save_text_path", &self.save_text_path)
            .field("save_summary_path", &self.save_summary_path)
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model name this run will ask the provider for.
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn use_preprocess(mut self, v: bool) -> Self {
        self.config.use_preprocess = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn chunk_max_chars(mut self, n: usize) -> Self {
        self.config.chunk_max_chars = n;
        self
    }

    pub fn min_native_chars(mut self, n: usize) -> Self {
        self.config.min_native_chars = n;
        self
    }

    pub fn native_probe_pages(mut self, n: usize) -> Self {
        self.config.native_probe_pages = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn ocr(mut self, ocr: OcrOptions) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn preprocess(mut self, options: PreprocessOptions) -> Self {
        self.config.preprocess = options;
        self
    }

    pub fn save_text_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.save_text_path = Some(path.into());
        self
    }

    pub fn save_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.save_summary_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ScanError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.chunk_max_chars == 0 {
            return Err(ScanError::InvalidConfig(
                "Chunk size must be ≥ 1 character".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ScanError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        c.preprocess.validate()?;
        Ok(self.config)
    }
}

// ── Component options ────────────────────────────────────────────────────

/// Parameters passed to the OCR engine for every image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Tesseract language code(s), e.g. "eng" or "eng+deu". Default: "eng".
    pub lang: String,

    /// Page segmentation mode. Default: 3 (fully automatic).
    pub page_segmentation_mode: u8,

    /// OCR engine mode. Default: 3 (whatever is available).
    pub engine_mode: u8,

    /// Path or name of the tesseract executable. Default: "tesseract".
    pub command: PathBuf,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            lang: "eng".to_string(),
            page_segmentation_mode: 3,
            engine_mode: 3,
            command: PathBuf::from("tesseract"),
        }
    }
}

/// Parameters of the OCR image preprocessor.
///
/// The defaults reproduce the classic scan-cleanup recipe: shrink to at most
/// 2000 px, grayscale, non-local-means denoise, Gaussian adaptive threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    /// Apply non-local-means denoising. Default: true.
    pub denoise: bool,

    /// Longest allowed edge in pixels; larger images are downscaled. Default: 2000.
    pub resize_max: u32,

    /// Denoising filter strength `h`. Default: 10.0.
    pub denoise_strength: f32,

    /// Side of the square patch compared by the denoiser (odd). Default: 7.
    pub template_window: u32,

    /// Side of the square area searched for similar patches (odd). Default: 21.
    pub search_window: u32,

    /// Neighbourhood size of the adaptive threshold (odd, ≥ 3). Default: 15.
    pub threshold_block_size: u32,

    /// Constant subtracted from the weighted local mean. Default: 8.
    pub threshold_offset: i32,

    /// Radius of the morphological opening kernel. 0 is a 1×1 kernel. Default: 0.
    pub open_radius: u8,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            denoise: true,
            resize_max: 2000,
            denoise_strength: 10.0,
            template_window: 7,
            search_window: 21,
            threshold_block_size: 15,
            threshold_offset: 8,
            open_radius: 0,
        }
    }
}

impl PreprocessOptions {
    fn validate(&self) -> Result<(), ScanError> {
        if self.resize_max == 0 {
            return Err(ScanError::InvalidConfig("resize_max must be ≥ 1".into()));
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(ScanError::InvalidConfig(format!(
                "Threshold block size must be odd and ≥ 3, got {}",
                self.threshold_block_size
            )));
        }
        if self.template_window % 2 == 0 || self.search_window % 2 == 0 {
            return Err(ScanError::InvalidConfig(
                "Denoise template and search windows must be odd".into(),
            ));
        }
        if self.search_window < self.template_window {
            return Err(ScanError::InvalidConfig(
                "Denoise search window must be ≥ template window".into(),
            ));
        }
        Ok(())
    }
}

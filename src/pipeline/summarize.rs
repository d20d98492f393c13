//! Chunked summarisation: one model call per chunk, then one call to
//! combine the chunk summaries.
//!
//! Model failures never abort a run. A failed chunk contributes an empty
//! summary; a failed combination call falls back to the chunk summaries
//! joined with blank lines. Both cases are recorded as [`ItemError`]s.

use crate::config::{ScanConfig, DEFAULT_MODEL};
use crate::error::{ItemError, ScanError};
use crate::output::ChunkOutcome;
use crate::pipeline::chunk::chunk_text;
use crate::pipeline::postprocess::clean_summary;
use crate::progress::ProgressCallback;
use crate::prompts::{chunk_prompt, combine_prompt};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A text-in, text-out language model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a single user prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ScanError>;
}

// ── edgequake-llm generator ──────────────────────────────────────────────

/// [`TextGenerator`] backed by an `edgequake_llm` provider.
pub struct LlmTextGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmTextGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }

    /// Resolve the provider from `config` (see [`resolve_provider`]).
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config.temperature, config.max_tokens))
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ScanError> {
        let messages = vec![ChatMessage::user(prompt)];
        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ScanError::LlmApiError {
                message: e.to_string(),
            })?;
        debug!(
            "Model call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ScanError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScanError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Non-empty value of an environment variable.
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with the configured model
///    or [`DEFAULT_MODEL`]; the factory reads that provider's API key.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`,
///    honoured only when both are set.
/// 4. **`GEMINI_API_KEY` present** selects gemini, the default model's home.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, ScanError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_name());
    }

    if let (Some(prov), Some(model)) = (
        env_non_empty("EDGEQUAKE_LLM_PROVIDER"),
        env_non_empty("EDGEQUAKE_MODEL"),
    ) {
        return create_provider(&prov, config.model.as_deref().unwrap_or(&model));
    }

    if env_non_empty("GEMINI_API_KEY").is_some() {
        return create_provider("gemini", config.model_name());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScanError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (default model {DEFAULT_MODEL}), OPENAI_API_KEY,\n\
                ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

// ── Summariser ───────────────────────────────────────────────────────────

/// Result of summarising one document.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// The final summary (or the joined chunk summaries on fallback).
    pub text: String,
    pub chunks: Vec<ChunkOutcome>,
    /// Set when the combination call failed.
    pub fallback: Option<ItemError>,
}

/// Drives chunking, per-chunk calls and the combination call.
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    max_chars: usize,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, max_chars: usize) -> Self {
        Self {
            generator,
            max_chars,
            concurrency: 1,
            progress: None,
        }
    }

    /// Summarise up to `n` chunks at a time. Output order is unaffected.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Summarise `text`. Blank text yields an empty summary without any
    /// model call.
    pub async fn summarize(&self, text: &str) -> Summary {
        if text.trim().is_empty() {
            return Summary::default();
        }

        let chunks = chunk_text(text, self.max_chars);
        let total = chunks.len();
        info!("Summarising {} chunk(s)", total);
        if let Some(ref cb) = self.progress {
            cb.on_summarize_start(total);
        }

        let outcomes: Vec<ChunkOutcome> = stream::iter(
            chunks
                .iter()
                .enumerate()
                .map(|(idx, chunk)| self.summarize_chunk(idx + 1, total, chunk)),
        )
        .buffered(self.concurrency)
        .collect()
        .await;

        let combined = outcomes
            .iter()
            .map(|o| o.summary.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        match self.generator.generate(&combine_prompt(&combined)).await {
            Ok(response) => Summary {
                text: clean_summary(&response),
                chunks: outcomes,
                fallback: None,
            },
            Err(e) => {
                warn!("Final summary call failed, returning chunk summaries: {}", e);
                Summary {
                    text: combined,
                    chunks: outcomes,
                    fallback: Some(ItemError::CombineFailed {
                        detail: e.to_string(),
                    }),
                }
            }
        }
    }

    async fn summarize_chunk(&self, chunk_num: usize, total: usize, chunk: &str) -> ChunkOutcome {
        let chars = chunk.chars().count();
        match self.generator.generate(&chunk_prompt(chunk)).await {
            Ok(summary) => {
                debug!("Chunk {}/{}: {} chars summarised", chunk_num, total, chars);
                if let Some(ref cb) = self.progress {
                    cb.on_chunk_complete(chunk_num, total, summary.chars().count());
                }
                ChunkOutcome {
                    chunk_num,
                    chars,
                    summary,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Chunk {}/{}: summarisation failed: {}", chunk_num, total, e);
                if let Some(ref cb) = self.progress {
                    cb.on_chunk_error(chunk_num, total, &e.to_string());
                }
                ChunkOutcome {
                    chunk_num,
                    chars,
                    summary: String::new(),
                    error: Some(ItemError::ModelFailed {
                        chunk: chunk_num,
                        detail: e.to_string(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers chunk prompts with "S<n>" and combine prompts with "FINAL".
    struct ScriptedModel {
        fail_chunks: Vec<usize>,
        fail_combine: bool,
        chunk_calls: AtomicUsize,
        combine_inputs: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new() -> Self {
            Self {
                fail_chunks: Vec::new(),
                fail_combine: false,
                chunk_calls: AtomicUsize::new(0),
                combine_inputs: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.chunk_calls.load(Ordering::SeqCst) + self.combine_inputs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, ScanError> {
            if let Some(summaries) = prompt.split("CHUNK_SUMMARIES:\n").nth(1) {
                self.combine_inputs.lock().unwrap().push(summaries.to_string());
                if self.fail_combine {
                    return Err(ScanError::LlmApiError {
                        message: "503".into(),
                    });
                }
                return Ok("```\nFINAL\n```".into());
            }
            let n = self.chunk_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_chunks.contains(&n) {
                return Err(ScanError::LlmApiError {
                    message: "429".into(),
                });
            }
            Ok(format!("S{}", n))
        }
    }

    fn three_chunk_text() -> String {
        ["Alpha paragraph text.", "Beta paragraph text.", "Gamma paragraph text."].join("\n\n")
    }

    #[tokio::test]
    async fn blank_text_makes_no_calls() {
        let model = Arc::new(ScriptedModel::new());
        let summary = Summarizer::new(model.clone(), 100).summarize(" \n ").await;
        assert_eq!(summary.text, "");
        assert!(summary.chunks.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn combines_chunk_summaries_in_order() {
        let model = Arc::new(ScriptedModel::new());
        let summary = Summarizer::new(model.clone(), 25).summarize(&three_chunk_text()).await;

        assert_eq!(summary.text, "FINAL");
        assert!(summary.fallback.is_none());
        assert_eq!(summary.chunks.len(), 3);
        let inputs = model.combine_inputs.lock().unwrap();
        assert!(inputs[0].starts_with("S1\n\nS2\n\nS3\n\n"));
    }

    #[tokio::test]
    async fn failed_chunk_becomes_empty_summary() {
        let mut model = ScriptedModel::new();
        model.fail_chunks = vec![2];
        let model = Arc::new(model);
        let summary = Summarizer::new(model.clone(), 25).summarize(&three_chunk_text()).await;

        assert_eq!(summary.chunks[1].summary, "");
        assert!(matches!(
            summary.chunks[1].error,
            Some(ItemError::ModelFailed { chunk: 2, .. })
        ));
        assert!(model.combine_inputs.lock().unwrap()[0].starts_with("S1\n\n\n\nS3"));
    }

    #[tokio::test]
    async fn combine_failure_falls_back_to_joined_summaries() {
        let mut model = ScriptedModel::new();
        model.fail_chunks = vec![1];
        model.fail_combine = true;
        let summary = Summarizer::new(Arc::new(model), 25).summarize(&three_chunk_text()).await;

        assert_eq!(summary.text, "\n\nS2\n\nS3");
        assert!(matches!(summary.fallback, Some(ItemError::CombineFailed { .. })));
    }

    #[tokio::test]
    async fn concurrent_calls_keep_chunk_order() {
        let model = Arc::new(ScriptedModel::new());
        let summary = Summarizer::new(model, 25)
            .with_concurrency(4)
            .summarize(&three_chunk_text())
            .await;
        let nums: Vec<usize> = summary.chunks.iter().map(|c| c.chunk_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
    }
}

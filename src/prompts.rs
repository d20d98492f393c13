//! Prompt templates for chunk and final summarisation.
//!
//! Two fixed templates: one turns a document chunk into a small JSON object
//! with a summary and bullet points, the other folds all chunk summaries into
//! one plain-text overview. Keeping them here lets tests inspect the exact
//! wording without a model.

/// Prompt for one document chunk.
///
/// The model is asked for JSON with keys `summary` (2–5 sentences) and
/// `bullets`. The raw response is kept verbatim; it is never parsed.
pub fn chunk_prompt(chunk: &str) -> String {
    format!(
        "You are a helpful summarization assistant. \
Summarize the following document chunk into concise bullet points and a 2-5 sentence summary. \
Preserve any headings found. Output JSON with keys: 'summary' and 'bullets'.\n\n\
DOCUMENT CHUNK:\n{chunk}\n\n\
Respond only in JSON."
    )
}

/// Prompt that combines all chunk summaries into the final summary.
pub fn combine_prompt(chunk_summaries: &str) -> String {
    format!(
        "You are a helpful summarization assistant. Combine the following chunk summaries into:\n\
1) a 4-6 sentence concise summary, and\n\
2) a combined ordered list of key bullet points (max 12 bullets).\n\n\
CHUNK_SUMMARIES:\n{chunk_summaries}\n\n\
Respond in plain text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_prompt_embeds_chunk_and_asks_for_json() {
        let p = chunk_prompt("Quarterly revenue rose.");
        assert!(p.contains("DOCUMENT CHUNK:\nQuarterly revenue rose.\n\n"));
        assert!(p.contains("2-5 sentence"));
        assert!(p.ends_with("Respond only in JSON."));
    }

    #[test]
    fn combine_prompt_embeds_summaries_and_asks_for_plain_text() {
        let p = combine_prompt("{\"summary\": \"a\"}\n\n{\"summary\": \"b\"}");
        assert!(p.contains("CHUNK_SUMMARIES:\n{\"summary\": \"a\"}"));
        assert!(p.contains("4-6 sentence"));
        assert!(p.contains("max 12 bullets"));
        assert!(p.ends_with("Respond in plain text."));
    }

    #[test]
    fn prompts_differ() {
        assert_ne!(chunk_prompt("x"), combine_prompt("x"));
    }
}

//! Boundary-seeking text chunking.
//!
//! Text is cut into pieces of at most `max_chars` characters, preferring to
//! end a piece at a paragraph break, then at a sentence end, and only as a
//! last resort in the middle of a sentence.

/// Split `text` into ordered, trimmed, non-empty chunks.
///
/// Starting at the beginning of the stripped text, each step looks at the
/// next `max_chars` characters. If the remainder fits, it becomes the last
/// chunk. Otherwise the window is cut after the last `"\n\n"` (keeping its
/// first newline), else after the last `". "` (keeping the period), else at
/// exactly `max_chars`. Chunks that are empty after trimming are dropped.
///
/// A `max_chars` of zero is treated as one.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let text = text.trim();
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        // Byte offset just past the window of `max_chars` characters.
        let window_end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                push_trimmed(&mut chunks, rest);
                break;
            }
        };

        let window = &rest[..window_end];
        let cut = window
            .rfind("\n\n")
            .or_else(|| window.rfind(". "))
            .map(|pos| pos + 1)
            .unwrap_or(window_end);

        push_trimmed(&mut chunks, &rest[..cut]);
        rest = &rest[cut..];
    }

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        chunks.push(piece.to_string());
    }
}

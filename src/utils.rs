//! Utility functions for text cleaning and message splitting.

/// Markup fragments Gemini tends to emit that Telegram's legacy Markdown
/// parser chokes on. Removal can splice the surrounding text into a new
/// fragment (`"-->--"` becomes `"----"` once `>` is dropped), so stripping
/// repeats until nothing changes.
const STRIP_PATTERNS: &[&str] = &["#", "`", "~~", "---", ">", "\\"];

/// Removes markup fragments that break Telegram Markdown rendering.
///
/// Strips in passes until a fixpoint, so the result is idempotent:
/// cleaning already-cleaned text is a no-op.
///
/// # Examples
///
/// ```
/// use gdz_bot_rs::utils::clean_text;
/// assert_eq!(clean_text("# Дано: `x > 2`"), " Дано: x  2");
/// ```
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    loop {
        let mut next = cleaned.clone();
        for pattern in STRIP_PATTERNS {
            next = next.replace(pattern, "");
        }
        if next == cleaned {
            return next;
        }
        cleaned = next;
    }
}

/// Splits text into contiguous fixed-size chunks of at most `limit` characters.
///
/// Slicing is character-based (UTF-8 safe), not word-boundary aware; the
/// last chunk may be shorter. Empty input yields no chunks.
///
/// # Examples
///
/// ```
/// use gdz_bot_rs::utils::split_message;
/// let parts = split_message(&"a".repeat(7600), 3800);
/// assert_eq!(parts.len(), 2);
/// ```
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() || limit == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

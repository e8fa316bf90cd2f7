//! Word-limit summarizer.

/// Keep the first `limit` whitespace-separated words, joined by single spaces.
///
/// The service default comes from `summary.word_limit` in the config.
pub fn summarize(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

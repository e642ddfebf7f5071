use std::time::{Duration, Instant};

/// Format a `Duration` with automatic unit scaling, e.g. `1.94ms` or `2.34s`.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Warn when more than `threshold` has passed since `start`.
pub fn log_if_slow(start: Instant, threshold: Duration, label: &str) {
    let elapsed = start.elapsed();
    if elapsed > threshold {
        tracing::warn!(
            duration = fmt_duration(elapsed),
            threshold = fmt_duration(threshold),
            "slow operation: {label}"
        );
    }
}

/// Cut `text` to at most `limit` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

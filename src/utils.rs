use std::time::{Duration, Instant};

/// Format a `Duration` as a human-readable string with automatic unit scaling.
///
/// Produces output like `1.94ms` or `2.34s` using Rust's Debug format.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Log a warning if a portal round trip took longer than `threshold`.
pub fn log_if_slow(start: Instant, threshold: Duration, method: &str, url: &str) {
    let elapsed = start.elapsed();
    if elapsed > threshold {
        tracing::warn!(
            method,
            url,
            duration = fmt_duration(elapsed),
            "slow portal request"
        );
    }
}

/// Millisecond Unix timestamp, sent as the `nd` cache-buster on query forms.
pub fn cache_buster() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

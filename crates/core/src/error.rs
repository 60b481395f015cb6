//! Error taxonomy and the failure-message normalizer.

use thiserror::Error;
use webauto_driver::DriverError;

/// Result type alias for webauto operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or contradictory session configuration. Fatal at
    /// construction, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Browser session could not be brought up.
    #[error("session launch failed: {0}")]
    Launch(String),

    /// Element lookup exhausted its deadline with the raise policy.
    #[error("element not found: {locator}")]
    NotFound { locator: String },

    /// An operation exceeded an explicit deadline.
    #[error("timeout after {ms}ms waiting for: {what}")]
    Timeout { ms: u64, what: String },

    /// Failure originating in the driver handle, propagated unchanged.
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Marker after which chromedriver-style messages carry only a stack dump.
const STACKTRACE_MARKER: &str = "Stacktrace";

/// Trailing advisory clauses stripped case-insensitively, with everything
/// that follows them.
const TRAILING_MARKERS: &[&str] = &["for documentation", "(session info"];

/// Reduces a raw driver failure message to its concise human-readable core.
///
/// Cuts at a literal `Stacktrace` marker, strips trailing documentation
/// advisories and session-info clauses regardless of how much text follows,
/// and trims whitespace. Idempotent: an already-normalized message comes
/// back unchanged.
pub fn normalize(message: &str) -> String {
    let mut cut = message.len();
    if let Some(idx) = message.find(STACKTRACE_MARKER) {
        cut = idx;
    }
    for marker in TRAILING_MARKERS {
        if let Some(idx) = find_ignore_ascii_case(&message[..cut], marker) {
            cut = idx;
        }
    }
    message[..cut].trim().to_string()
}

/// Byte-window case-insensitive substring search; ASCII-folding only, which
/// covers every marker this module looks for.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_stacktrace_suffix() {
        let raw = "Element not clickable\nStacktrace:\n  at foo()";
        assert_eq!(normalize(raw), "Element not clickable");
    }

    #[test]
    fn normalize_strips_documentation_advisory() {
        let raw = "no such element: h1\nFor documentation on this error, see: https://example.invalid";
        assert_eq!(normalize(raw), "no such element: h1");
    }

    #[test]
    fn normalize_strips_session_info_clause_case_insensitively() {
        let raw = "timeout: page load\n(SESSION INFO: chrome=115.0)";
        assert_eq!(normalize(raw), "timeout: page load");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "Element not clickable\nStacktrace:\n  at foo()",
            "no such element: h1 (Session info: chrome=115.0)",
            "plain message with no markers",
            "",
        ];
        for raw in inputs {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn normalize_leaves_clean_messages_alone() {
        assert_eq!(normalize("stale element reference"), "stale element reference");
    }
}

//! Error types for the driver boundary.

use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors surfaced by a live driver handle or while launching one.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No usable browser executable could be located.
    #[error("browser executable not found: {0}")]
    ExecutableNotFound(String),

    /// The browser process failed to start.
    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Element lookup produced no match.
    #[error("no such element: {query}")]
    NotFound { query: String },

    /// A previously resolved element is no longer attached to the DOM.
    #[error("stale element reference: {0}")]
    StaleElement(String),

    /// An operation exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Script evaluation failed inside the page.
    #[error("script evaluation failed: {0}")]
    Script(String),

    /// Navigation did not complete.
    #[error("navigation failed: {url}: {message}")]
    Navigation { url: String, message: String },

    /// The browser, page, or session is gone.
    #[error("target closed: {0}")]
    TargetClosed(String),

    /// Protocol-level failure talking to the browser.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error (profile preparation, process plumbing).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriverError {
    /// Returns true if this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout(_))
    }

    /// Returns true if this error is a failed element lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound { .. })
    }

    /// Returns true if this error is a stale element reference.
    pub fn is_stale(&self) -> bool {
        matches!(self, DriverError::StaleElement(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_their_variants() {
        assert!(DriverError::Timeout("goto".into()).is_timeout());
        assert!(
            DriverError::NotFound {
                query: "css=h1".into()
            }
            .is_not_found()
        );
        assert!(DriverError::StaleElement("node 12".into()).is_stale());
        assert!(!DriverError::Protocol("boom".into()).is_timeout());
    }
}

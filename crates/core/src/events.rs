//! Trace hooks around driver operations and failure classification.
//!
//! The listener wraps a session's operation boundaries: every hook emits a
//! structured trace event, and `on_exception` routes failures to a log
//! severity without ever changing whether they propagate.

use tracing::{debug, error, info, warn};
use webauto_driver::{Driver, DriverError, Strategy};

use crate::error::normalize;

/// Cap applied to script text and markup snippets in trace events.
const SNIPPET_CAP: usize = 100;

/// Placeholder used when the page location itself cannot be retrieved.
const URL_UNAVAILABLE: &str = "<couldn't fetch URL>";

/// Placeholder used when an accepted dialog carried no readable message.
const ALERT_TEXT_UNAVAILABLE: &str = "<no alert text>";

/// Markers for benign markup-probe noise: attribute lookups the tracer
/// itself performs while building log snippets. Failures naming them are
/// logging noise, never automation faults.
const SUPPRESSED_MARKERS: &[&str] = &["outerhtml", "innertext"];

/// Message phrases that mark a failure as expected-transient even when the
/// error kind is opaque.
const EXPECTED_PHRASES: &[&str] = &["no such element", "stale element reference", "timeout"];

/// Severity bucket for a driver-originated failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Benign noise; logged at debug only, never warning or above.
    Suppressed,
    /// Expected transient state of an eventually-consistent page.
    Expected,
    /// A real fault.
    Fault,
}

/// Maps a failure to its severity bucket.
///
/// Suppression is checked first and short-circuits; the expected class is
/// only considered for non-suppressed failures. Classification never alters
/// propagation.
pub fn classify(error: &DriverError) -> FailureClass {
    let message = normalize(&error.to_string()).to_lowercase();
    if SUPPRESSED_MARKERS.iter().any(|m| message.contains(m)) {
        return FailureClass::Suppressed;
    }
    let expected_kind = error.is_not_found() || error.is_stale() || error.is_timeout();
    if expected_kind || EXPECTED_PHRASES.iter().any(|p| message.contains(p)) {
        return FailureClass::Expected;
    }
    FailureClass::Fault
}

/// Structured trace listener installed on every session.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceListener;

impl TraceListener {
    pub fn new() -> Self {
        Self
    }

    pub fn before_navigate(&self, url: &str) {
        info!(target = "webauto", %url, "-> navigate");
    }

    /// Logs where navigation landed, which redirects can make different
    /// from the requested URL.
    pub fn after_navigate(&self, url: &str, title: &str) {
        info!(target = "webauto", %url, %title, "<- navigate");
    }

    pub fn before_find(&self, strategy: Strategy, value: &str) {
        debug!(target = "webauto", %strategy, value, "-> find");
    }

    pub fn after_find(&self, strategy: Strategy, value: &str) {
        debug!(target = "webauto", %strategy, value, "<- find");
    }

    pub fn before_click(&self, snippet: &str) {
        info!(target = "webauto", element = %truncate(snippet), "-> click");
    }

    pub fn before_execute_script(&self, script: &str) {
        debug!(target = "webauto", script = %truncate(script), "-> execute script");
    }

    pub fn after_execute_script(&self) {
        debug!(target = "webauto", "<- execute script");
    }

    pub fn before_frame_switch(&self, index: Option<usize>) {
        info!(target = "webauto", ?index, "-> switch frame");
    }

    pub fn after_frame_switch(&self, index: Option<usize>) {
        info!(target = "webauto", ?index, "<- switch frame");
    }

    pub fn before_alert_accept(&self, text: Option<&str>) {
        let text = text.unwrap_or(ALERT_TEXT_UNAVAILABLE);
        info!(target = "webauto", %text, "-> accept alert");
    }

    pub fn after_alert_accept(&self) {
        info!(target = "webauto", "<- accept alert");
    }

    /// Classifies a failed operation and logs it at the matching severity.
    /// The caller still propagates (or swallows) the failure itself.
    pub async fn on_exception(&self, error: &DriverError, driver: &dyn Driver) -> FailureClass {
        let class = classify(error);
        let message = normalize(&error.to_string());
        match class {
            FailureClass::Suppressed => {
                debug!(target = "webauto", %message, "suppressed driver noise");
            }
            FailureClass::Expected => {
                let location = current_location(driver).await;
                warn!(target = "webauto", %message, %location, "expected driver failure");
            }
            FailureClass::Fault => {
                let location = current_location(driver).await;
                error!(target = "webauto", %message, %location, "driver fault");
            }
        }
        class
    }
}

async fn current_location(driver: &dyn Driver) -> String {
    driver
        .current_url()
        .await
        .unwrap_or_else(|_| URL_UNAVAILABLE.to_string())
}

/// Collapses newlines and caps length for log payloads.
fn truncate(text: &str) -> String {
    let collapsed = text.replace('\n', " ");
    collapsed.chars().take(SNIPPET_CAP).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_stale_and_timeout_kinds_are_expected() {
        let errors = [
            DriverError::NotFound {
                query: "css=h1".into(),
            },
            DriverError::StaleElement("node 4".into()),
            DriverError::Timeout("goto".into()),
        ];
        for error in errors {
            assert_eq!(classify(&error), FailureClass::Expected, "{error}");
        }
    }

    #[test]
    fn expected_phrases_match_case_insensitively_in_opaque_errors() {
        let error = DriverError::Protocol("STALE ELEMENT REFERENCE: node detached".into());
        assert_eq!(classify(&error), FailureClass::Expected);
    }

    #[test]
    fn unknown_failures_are_faults() {
        let error = DriverError::Protocol("websocket connection reset".into());
        assert_eq!(classify(&error), FailureClass::Fault);
    }

    #[test]
    fn markup_probe_noise_is_suppressed() {
        let error = DriverError::Script("outerHTML probe failed: node gone".into());
        assert_eq!(classify(&error), FailureClass::Suppressed);
        let error = DriverError::Script("cannot read innerText of null".into());
        assert_eq!(classify(&error), FailureClass::Suppressed);
    }

    #[test]
    fn suppression_beats_expected_when_both_markers_present() {
        // Message carries both a suppressed marker and an expected phrase;
        // suppression short-circuits.
        let error = DriverError::Script("outerHTML probe failed: no such element: h1".into());
        assert_eq!(classify(&error), FailureClass::Suppressed);

        // Even an expected *kind* loses to a suppressed marker.
        let error = DriverError::NotFound {
            query: "probe innerText".into(),
        };
        assert_eq!(classify(&error), FailureClass::Suppressed);
    }

    #[test]
    fn classification_reads_the_normalized_message() {
        // The marker sits after the stacktrace cut, so it must not count.
        let error = DriverError::Protocol("connection reset\nStacktrace: at outerHTML()".into());
        assert_eq!(classify(&error), FailureClass::Fault);
    }

    #[test]
    fn truncate_collapses_newlines_and_caps_length() {
        let long = format!("line1\nline2{}", "x".repeat(200));
        let out = truncate(&long);
        assert!(!out.contains('\n'));
        assert_eq!(out.chars().count(), SNIPPET_CAP);
    }
}

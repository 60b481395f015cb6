//! Driver-handle boundary for webauto.
//!
//! This crate owns the narrow interface the convenience layer consumes —
//! navigation, script execution, element lookup, current URL, quit, plus the
//! small set of interaction extensions (pointer moves, same-origin frame
//! routing, alert acceptance) — and one concrete implementation backed by
//! Chromium over the DevTools protocol ([`CdpDriver`]).
//!
//! Everything above this boundary is driver-agnostic: tests run against
//! scripted stand-ins, production runs against [`CdpDriver`].

mod cdp;
mod error;
mod spec;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

pub use cdp::CdpDriver;
pub use error::{DriverError, Result};
pub use spec::{LaunchSpec, MobileProfile};

/// Element lookup strategy. Closed enumeration; pairs with a value string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// CSS selector.
    Css,
    /// Bare tag name.
    Tag,
    /// XPath expression.
    XPath,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Css => "css",
            Strategy::Tag => "tag",
            Strategy::XPath => "xpath",
        };
        f.write_str(name)
    }
}

/// One located page element.
#[async_trait]
pub trait Element: fmt::Debug + Send + Sync {
    /// Clicks the element.
    async fn click(&self) -> Result<()>;

    /// Sends text to the element as keystrokes.
    async fn send_keys(&self, text: &str) -> Result<()>;

    /// Returns the element's outer markup.
    async fn outer_html(&self) -> Result<String>;

    /// Returns the element's visible text.
    async fn text(&self) -> Result<String>;
}

/// A live remote browser session.
///
/// Single-owner, cooperative-blocking contract: the handle is not meant for
/// concurrent use from multiple tasks; callers needing parallel sessions
/// launch one driver each.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigates to a URL and waits for the load to settle.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluates a script in the page, returning its JSON value.
    async fn execute_script(&self, code: &str) -> Result<Value>;

    /// Single-shot element lookup. Fails with [`DriverError::NotFound`]
    /// when nothing matches right now; polling lives above this boundary.
    async fn find(&self, strategy: Strategy, value: &str) -> Result<Box<dyn Element>>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String>;

    /// Moves the pointer to an absolute viewport position.
    async fn move_pointer(&self, x: f64, y: f64) -> Result<()>;

    /// Routes subsequent script evaluation through the same-origin frame at
    /// `index`, or back to the top document for `None`.
    async fn switch_frame(&self, index: Option<usize>) -> Result<()>;

    /// Accepts the currently open JavaScript dialog.
    async fn accept_alert(&self) -> Result<()>;

    /// Message of the most recent JavaScript dialog, if one opened.
    async fn alert_text(&self) -> Result<Option<String>>;

    /// Terminates the browser session. Idempotent: repeat calls are no-ops.
    async fn quit(&self) -> Result<()>;
}

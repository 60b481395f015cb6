//! Polling wait/retry primitives over a live driver handle.
//!
//! Remote page state is eventually consistent: an element that is not in
//! the DOM right now may appear a poll later. These primitives own the
//! polling loop; the driver's `find` stays single-shot.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use futures_util::stream;
use tokio::time::Instant;
use tracing::warn;
use webauto_driver::{Driver, Element, Strategy};

use crate::error::{Error, Result};

/// Interval between presence polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What a wait does when its deadline passes without a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMissing {
    /// Propagate a not-found failure.
    #[default]
    Raise,
    /// Return an absent result with no failure raised.
    Suppress,
}

/// Where a text predicate looks inside the candidate element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextScope {
    /// Anywhere in the element's subtree.
    #[default]
    Subtree,
    /// The element's direct text nodes only.
    SelfOnly,
}

/// Polls until an element matching `(strategy, value)` is present or the
/// deadline passes.
///
/// The first check happens immediately, so a zero timeout costs exactly one
/// poll. On expiry the miss policy decides between a not-found error and
/// `Ok(None)`. Driver failures other than not-found propagate at once.
pub async fn wait_for_presence(
    driver: &dyn Driver,
    strategy: Strategy,
    value: &str,
    timeout: Duration,
    on_missing: OnMissing,
) -> Result<Option<Box<dyn Element>>> {
    let deadline = Instant::now() + timeout;
    loop {
        match driver.find(strategy, value).await {
            Ok(element) => return Ok(Some(element)),
            Err(err) if err.is_not_found() => {
                let now = Instant::now();
                if now >= deadline {
                    return match on_missing {
                        OnMissing::Raise => Err(Error::NotFound {
                            locator: format!("{strategy}={value}"),
                        }),
                        OnMissing::Suppress => Ok(None),
                    };
                }
                tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Waits for an element of `tag` whose text matches `text` within `scope`.
///
/// Caller text is escaped into a valid XPath string literal, so quote
/// characters cannot break or repurpose the structural query.
pub async fn wait_for_text_match(
    driver: &dyn Driver,
    tag: &str,
    text: &str,
    scope: TextScope,
    timeout: Duration,
    on_missing: OnMissing,
) -> Result<Option<Box<dyn Element>>> {
    let xpath = text_match_xpath(tag, text, scope)?;
    wait_for_presence(driver, Strategy::XPath, &xpath, timeout, on_missing).await
}

/// Lazy, non-restartable sequence of successful lookups of one locator.
///
/// Each advance runs a full presence wait; the stream yields on success and
/// ends cleanly the first time the lookup misses its deadline. The final
/// miss is logged at warning level with the query and reason.
pub fn repeated_lookup(
    driver: Arc<dyn Driver>,
    strategy: Strategy,
    value: impl Into<String>,
    timeout: Duration,
) -> impl Stream<Item = Box<dyn Element>> {
    let value = value.into();
    stream::unfold((driver, value), move |(driver, value)| async move {
        let outcome =
            wait_for_presence(driver.as_ref(), strategy, &value, timeout, OnMissing::Raise).await;
        match outcome {
            Ok(Some(element)) => Some((element, (driver, value))),
            Ok(None) => None,
            Err(err) => {
                warn!(
                    target = "webauto",
                    query = %format!("{strategy}={value}"),
                    reason = %err,
                    "no longer able to find element; ending sequence"
                );
                None
            }
        }
    })
}

/// Builds the structural query for a text match.
fn text_match_xpath(tag: &str, text: &str, scope: TextScope) -> Result<String> {
    if tag.is_empty()
        || !tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '*')
    {
        return Err(Error::Config(format!("invalid tag name for text match: {tag:?}")));
    }
    let literal = xpath_literal(text);
    Ok(match scope {
        TextScope::Subtree => format!("//{tag}[contains(., {literal})]"),
        TextScope::SelfOnly => format!("//{tag}[contains(text(), {literal})]"),
    })
}

/// Renders caller text as an XPath 1.0 string literal.
///
/// XPath 1.0 has no escape sequences inside string literals; text holding
/// both quote kinds has to be rebuilt with `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(r#", "'", "#))
    }
}

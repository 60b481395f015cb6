//! Pacing and jitter helpers for traffic that should not look scripted.
//!
//! Uniform instantaneous input is the easiest automation tell there is.
//! These helpers spread typing, scrolling, and pointer movement over
//! randomized delays. None of them are load-bearing: a page that works
//! without them works with them.

use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};
use webauto_driver::Element;

use crate::error::Result;
use crate::session::Session;

/// Script reading the viewport geometry the pointer gesture needs.
pub const VIEWPORT_METRICS_SCRIPT: &str = "({w: window.innerWidth, h: window.innerHeight})";

/// Optional gestures layered onto [`mimic_human`].
#[derive(Debug, Clone, Copy)]
pub struct HumanizeOptions {
    /// Scroll the page a few viewports. Default: true.
    pub scroll: bool,
    /// Nudge the pointer to a random viewport point. Default: true.
    pub mouse_move: bool,
    /// Skip the summary log line. Default: false.
    pub quiet: bool,
}

impl Default for HumanizeOptions {
    fn default() -> Self {
        Self {
            scroll: true,
            mouse_move: true,
            quiet: false,
        }
    }
}

/// Draws a uniform delay from `[min_ms, max_ms]`.
///
/// Sampling happens eagerly so the rng never lives across an await.
pub fn sample_ms(min_ms: u64, max_ms: u64) -> Duration {
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// Types `text` into `element` one character at a time with a random pause
/// between keystrokes.
///
/// Every character is delivered in order even when the pause bounds are
/// zero.
pub async fn pace_typing(
    element: &dyn Element,
    text: &str,
    min_ms: u64,
    max_ms: u64,
) -> Result<()> {
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        element.send_keys(ch.encode_utf8(&mut buf)).await?;
        let pause = sample_ms(min_ms, max_ms);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
    Ok(())
}

/// Scrolls the page by a random number of viewports in `[min, max]`, with a
/// reading-length pause after each.
pub async fn random_scroll(session: &Session, min: u32, max: u32) -> Result<()> {
    let count = if min >= max {
        min
    } else {
        rand::thread_rng().gen_range(min..=max)
    };
    for _ in 0..count {
        session
            .execute_script("window.scrollBy(0, window.innerHeight)")
            .await?;
        tokio::time::sleep(sample_ms(1000, 3000)).await;
    }
    Ok(())
}

/// Moves the pointer to a random point near the middle of the viewport.
///
/// Pointer coordinates are viewport relative, so the offset is applied
/// from the viewport center rather than a document position.
///
/// Infallible by contract: any failure is logged and swallowed, since a
/// cosmetic gesture must never fail the flow that asked for it.
pub async fn random_mouse_move(session: &Session) {
    if let Err(err) = try_mouse_move(session).await {
        error!(target = "webauto", error = %err, "pointer gesture failed");
    }
}

async fn try_mouse_move(session: &Session) -> Result<()> {
    let metrics = session.execute_script(VIEWPORT_METRICS_SCRIPT).await?;
    let width = metrics["w"].as_f64().unwrap_or(0.0);
    let height = metrics["h"].as_f64().unwrap_or(0.0);
    if width < 1.0 || height < 1.0 {
        return Ok(());
    }
    let (dx, dy) = {
        let mut rng = rand::thread_rng();
        (
            rng.gen_range(-0.25..=0.25) * width,
            rng.gen_range(-0.25..=0.25) * height,
        )
    };
    let x = (width / 2.0 + dx).clamp(0.0, width - 1.0);
    let y = (height / 2.0 + dy).clamp(0.0, height - 1.0);
    session.driver().move_pointer(x, y).await?;
    Ok(())
}

/// Dwells on the current page like a reader would: a random sleep plus the
/// gestures enabled in `options`.
pub async fn mimic_human(
    session: &Session,
    min_sleep_ms: u64,
    max_sleep_ms: u64,
    options: HumanizeOptions,
) {
    if !options.quiet {
        info!(
            target = "webauto",
            min_ms = min_sleep_ms,
            max_ms = max_sleep_ms,
            scroll = options.scroll,
            mouse_move = options.mouse_move,
            "mimicking human dwell"
        );
    }
    tokio::time::sleep(sample_ms(min_sleep_ms, max_sleep_ms)).await;
    if options.scroll {
        if let Err(err) = random_scroll(session, 1, 3).await {
            warn!(target = "webauto", error = %err, "scroll gesture failed");
        }
    }
    if options.mouse_move {
        random_mouse_move(session).await;
    }
}

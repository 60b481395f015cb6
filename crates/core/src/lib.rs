//! High-level browser automation sessions over a CDP driver.
//!
//! The crate wraps the low-level [`webauto_driver`] handle in a [`Session`]
//! that owns configuration resolution, traced page operations, polling
//! element lookups, and browser teardown. The usual entry point is
//! [`Session::scoped`], which launches a browser, runs a closure against
//! it, and quits exactly once no matter how the closure ends:
//!
//! ```no_run
//! use webauto::{Session, SessionConfig, Strategy};
//!
//! # async fn run() -> webauto::Result<()> {
//! Session::scoped(SessionConfig::default(), |session| async move {
//!     session.navigate("https://example.org").await?;
//!     let link = session.find(Strategy::Css, "a").await?;
//!     session.click(link.as_ref()).await?;
//!     Ok(())
//! })
//! .await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod humanize;
pub mod locator;
pub mod logging;
pub mod session;
pub mod testing;

pub use config::{Engine, SessionConfig, USER_AGENT_POOL};
pub use error::{Error, Result, normalize};
pub use events::{FailureClass, TraceListener, classify};
pub use humanize::{HumanizeOptions, mimic_human, pace_typing, random_mouse_move, random_scroll};
pub use locator::{OnMissing, TextScope, repeated_lookup, wait_for_presence, wait_for_text_match};
pub use logging::init_logging;
pub use session::Session;
pub use webauto_driver::{
    CdpDriver, Driver, DriverError, Element, LaunchSpec, MobileProfile, Strategy,
};

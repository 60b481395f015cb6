//! Session lifecycle and traced page operations.
//!
//! A [`Session`] wraps one live driver handle and the configuration it was
//! launched from. Every page operation routes through the session's trace
//! listener, so callers get hook-style logging and failure classification
//! without wiring it up themselves.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;
use webauto_driver::{CdpDriver, Driver, DriverError, Element, Strategy};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{FailureClass, TraceListener};
use crate::locator::{self, OnMissing, TextScope};

/// Script injected after launch to hide the automation signal pages probe
/// for first.
const MASK_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// One live browser session.
#[derive(Clone)]
pub struct Session {
    driver: Arc<dyn Driver>,
    config: SessionConfig,
    listener: TraceListener,
}

impl Session {
    /// Launches a browser per `config` and attaches to it.
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        let spec = config.resolve()?;
        let driver = CdpDriver::launch(spec).await?;
        Self::attach(Arc::new(driver), config).await
    }

    /// Attaches to an already-launched driver.
    ///
    /// Runs the post-launch setup the configuration asks for, currently the
    /// automation-signal mask on the standard engine.
    pub async fn attach(driver: Arc<dyn Driver>, config: SessionConfig) -> Result<Self> {
        if config.needs_masking_script() {
            driver.execute_script(MASK_SCRIPT).await?;
        }
        Ok(Self {
            driver,
            config,
            listener: TraceListener::new(),
        })
    }

    /// Runs `body` against a fresh session, then quits the browser exactly
    /// once, whether the body returned, failed, or was cancelled.
    ///
    /// Teardown failures are logged and never mask the body's outcome.
    pub async fn scoped<T, F, Fut>(config: SessionConfig, body: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Self::launch(config).await?;
        let mut guard = QuitGuard {
            driver: Some(session.driver.clone()),
        };
        let outcome = body(session).await;
        if let Some(driver) = guard.driver.take() {
            if let Err(err) = driver.quit().await {
                warn!(target = "webauto", error = %err, "session teardown failed");
            }
        }
        outcome
    }

    /// The underlying driver handle.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Navigates to `url`.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.listener.before_navigate(url);
        match self.driver.navigate(url).await {
            Ok(()) => {
                // Trace where navigation actually landed, not just where it
                // was pointed; redirects make those differ.
                let landed = self
                    .driver
                    .current_url()
                    .await
                    .unwrap_or_else(|_| url.to_string());
                let title = self
                    .driver
                    .execute_script("document.title")
                    .await
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                self.listener.after_navigate(&landed, &title);
                Ok(())
            }
            Err(err) => Err(self.raise(err).await),
        }
    }

    /// Evaluates `code` in the current frame and returns its value.
    pub async fn execute_script(&self, code: &str) -> Result<Value> {
        self.listener.before_execute_script(code);
        match self.driver.execute_script(code).await {
            Ok(value) => {
                self.listener.after_execute_script();
                Ok(value)
            }
            Err(err) => Err(self.raise(err).await),
        }
    }

    /// Single-shot lookup with no waiting.
    pub async fn find_now(&self, strategy: Strategy, value: &str) -> Result<Box<dyn Element>> {
        self.listener.before_find(strategy, value);
        match self.driver.find(strategy, value).await {
            Ok(element) => {
                self.listener.after_find(strategy, value);
                Ok(element)
            }
            Err(err) => Err(self.raise(err).await),
        }
    }

    /// Lookup that polls up to the configured implicit wait.
    pub async fn find(&self, strategy: Strategy, value: &str) -> Result<Box<dyn Element>> {
        self.find_within(strategy, value, self.config.implicit_wait)
            .await
    }

    /// Lookup that polls up to an explicit deadline.
    pub async fn find_within(
        &self,
        strategy: Strategy,
        value: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Element>> {
        self.listener.before_find(strategy, value);
        let found = match locator::wait_for_presence(
            self.driver.as_ref(),
            strategy,
            value,
            timeout,
            OnMissing::Raise,
        )
        .await
        {
            Ok(found) => found,
            Err(err) => return Err(self.raise_lookup(err).await),
        };
        self.listener.after_find(strategy, value);
        // Raise policy never yields an absent success.
        found.ok_or_else(|| Error::NotFound {
            locator: format!("{strategy}={value}"),
        })
    }

    /// Lookup that polls up to the deadline and treats a miss as absence
    /// rather than failure.
    pub async fn try_find(
        &self,
        strategy: Strategy,
        value: &str,
        timeout: Duration,
    ) -> Result<Option<Box<dyn Element>>> {
        self.listener.before_find(strategy, value);
        let found = match locator::wait_for_presence(
            self.driver.as_ref(),
            strategy,
            value,
            timeout,
            OnMissing::Suppress,
        )
        .await
        {
            Ok(found) => found,
            Err(err) => return Err(self.raise_lookup(err).await),
        };
        if found.is_some() {
            self.listener.after_find(strategy, value);
        }
        Ok(found)
    }

    /// Lookup by tag and contained text, up to the configured implicit wait.
    pub async fn find_by_text(
        &self,
        tag: &str,
        text: &str,
        scope: TextScope,
    ) -> Result<Box<dyn Element>> {
        let found = match locator::wait_for_text_match(
            self.driver.as_ref(),
            tag,
            text,
            scope,
            self.config.implicit_wait,
            OnMissing::Raise,
        )
        .await
        {
            Ok(found) => found,
            Err(err) => return Err(self.raise_lookup(err).await),
        };
        found.ok_or_else(|| Error::NotFound {
            locator: format!("{tag} containing {text:?}"),
        })
    }

    /// Clicks `element`, reporting the element's markup in the trace.
    ///
    /// The markup probe is best-effort: a stale or detached element fails
    /// the probe, and that failure is classified rather than raised so the
    /// click itself still gets its chance to surface the real error.
    pub async fn click(&self, element: &dyn Element) -> Result<()> {
        match element.outer_html().await {
            Ok(snippet) => self.listener.before_click(&snippet),
            Err(err) => {
                let probe = DriverError::Script(format!("outerHTML probe failed: {err}"));
                self.listener.on_exception(&probe, self.driver.as_ref()).await;
            }
        }
        match element.click().await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.raise(err).await),
        }
    }

    /// Routes script evaluation to frame `index`, or back to the top
    /// document when `None`.
    pub async fn switch_frame(&self, index: Option<usize>) -> Result<()> {
        self.listener.before_frame_switch(index);
        match self.driver.switch_frame(index).await {
            Ok(()) => {
                self.listener.after_frame_switch(index);
                Ok(())
            }
            Err(err) => Err(self.raise(err).await),
        }
    }

    /// Accepts the currently open JavaScript dialog.
    pub async fn accept_alert(&self) -> Result<()> {
        let text = self.driver.alert_text().await.ok().flatten();
        self.listener.before_alert_accept(text.as_deref());
        match self.driver.accept_alert().await {
            Ok(()) => {
                self.listener.after_alert_accept();
                Ok(())
            }
            Err(err) => Err(self.raise(err).await),
        }
    }

    pub async fn current_url(&self) -> Result<String> {
        Ok(self.driver.current_url().await?)
    }

    /// Shuts the browser down. Safe to skip; [`Session::scoped`] callers
    /// never need this.
    pub async fn close(self) -> Result<()> {
        Ok(self.driver.quit().await?)
    }

    /// Classifies and logs a driver failure, then converts it for the
    /// caller.
    async fn raise(&self, err: DriverError) -> Error {
        self.listener.on_exception(&err, self.driver.as_ref()).await;
        err.into()
    }

    /// Classifies a polling-lookup failure before propagating it, so an
    /// exhausted deadline gets the same expected-class warning as a
    /// single-shot miss.
    async fn raise_lookup(&self, err: Error) -> Error {
        match &err {
            Error::Driver(inner) => {
                self.listener.on_exception(inner, self.driver.as_ref()).await;
            }
            Error::NotFound { locator } => {
                let miss = DriverError::NotFound {
                    query: locator.clone(),
                };
                self.listener.on_exception(&miss, self.driver.as_ref()).await;
            }
            _ => {}
        }
        err
    }

    /// Classifies a failure without raising it, for call sites that decide
    /// on the class.
    pub async fn classify(&self, err: &DriverError) -> FailureClass {
        self.listener.on_exception(err, self.driver.as_ref()).await
    }
}

/// Quits the session's driver on drop so cancellation of a scoped body
/// still tears the browser down. Disarmed before the inline quit.
struct QuitGuard {
    driver: Option<Arc<dyn Driver>>,
}

impl Drop for QuitGuard {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            tokio::spawn(async move {
                if let Err(err) = driver.quit().await {
                    warn!(target = "webauto", error = %err, "session teardown failed");
                }
            });
        }
    }
}

//! Chromium-backed [`Driver`] implementation over the DevTools protocol.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element as CdpElementHandle, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{DriverError, Result};
use crate::spec::LaunchSpec;
use crate::{Driver, Element, Strategy};

/// Deadline for a full page load during [`Driver::navigate`].
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Window after launch during which handler noise stays at trace level
/// when the spec asked for a quiet launch.
const QUIET_LAUNCH_WINDOW: Duration = Duration::from_secs(10);

/// Live Chromium session driven over CDP.
///
/// Launched from a [`LaunchSpec`]; owns the browser process, the CDP event
/// handler task, and one page. `quit` is idempotent and must be called to
/// release the process; the drop guard only covers sessions that never quit.
pub struct CdpDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    frame: Mutex<Option<usize>>,
    dialog_message: Arc<Mutex<Option<String>>>,
    kill_fallback: bool,
    // Keeps the scratch profile alive for the whole session.
    _scratch_profile: Option<tempfile::TempDir>,
}

impl CdpDriver {
    /// Launches Chromium according to `spec` and opens a blank page.
    pub async fn launch(spec: LaunchSpec) -> Result<Self> {
        let (user_data_dir, scratch_profile) = prepare_profile(&spec)?;

        let mut builder = BrowserConfig::builder().args(spec.args.clone());
        builder = if spec.headless {
            builder.headless_mode(HeadlessMode::New)
        } else {
            builder.with_head()
        };
        if let Some(exe) = &spec.executable {
            builder = builder.chrome_executable(exe);
        }
        if let Some(dir) = &user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        for ext in &spec.extensions {
            builder = builder.extension(ext.display().to_string());
        }
        let config = builder.build().map_err(DriverError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::LaunchFailed(e.to_string()))?;

        let quiet = spec.quiet_launch;
        let started = Instant::now();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    if quiet && started.elapsed() < QUIET_LAUNCH_WINDOW {
                        trace!(target = "webauto", error = %err, "cdp handler event");
                    } else {
                        debug!(target = "webauto", error = %err, "cdp handler event");
                    }
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::LaunchFailed(e.to_string()))?;

        // Dialog text is only available from the opening event, so capture
        // it as it happens for later alert handling.
        let dialog_message = Arc::new(Mutex::new(None));
        let mut dialogs = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(|e| DriverError::LaunchFailed(e.to_string()))?;
        let dialog_store = dialog_message.clone();
        let dialog_task = tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                *dialog_store.lock().await = Some(event.message.clone());
            }
        });

        if let Some(profile) = &spec.mobile {
            let metrics = SetDeviceMetricsOverrideParams::builder()
                .width(profile.width as i64)
                .height(profile.height as i64)
                .device_scale_factor(profile.pixel_ratio)
                .mobile(true)
                .build()
                .map_err(DriverError::Protocol)?;
            page.execute(metrics)
                .await
                .map_err(|e| DriverError::Protocol(e.to_string()))?;
            let ua = SetUserAgentOverrideParams::builder()
                .user_agent(profile.user_agent.clone())
                .build()
                .map_err(DriverError::Protocol)?;
            page.execute(ua)
                .await
                .map_err(|e| DriverError::Protocol(e.to_string()))?;
        }

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            tasks: Mutex::new(vec![handler_task, dialog_task]),
            frame: Mutex::new(None),
            dialog_message,
            kill_fallback: spec.kill_fallback,
            _scratch_profile: scratch_profile,
        })
    }

    /// Maps a lookup failure: chromiumoxide's element miss becomes
    /// not-found, while transport and dead-session failures keep their
    /// kind so callers do not retry a lost browser.
    fn map_find_error(strategy: Strategy, value: &str, error: CdpError) -> DriverError {
        match error {
            CdpError::NotFound => DriverError::NotFound {
                query: format!("{strategy}={value}"),
            },
            other => Self::classify_cdp(other.to_string()),
        }
    }

    fn classify_cdp(message: String) -> DriverError {
        let lowered = message.to_lowercase();
        if lowered.contains("timeout") {
            DriverError::Timeout(message)
        } else if lowered.contains("detached") || lowered.contains("stale") {
            DriverError::StaleElement(message)
        } else if lowered.contains("closed") {
            DriverError::TargetClosed(message)
        } else {
            DriverError::Protocol(message)
        }
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let goto = self.page.goto(url);
        match tokio::time::timeout(NAVIGATION_TIMEOUT, goto).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(DriverError::Timeout(format!(
                "navigation to {url} exceeded {}s",
                NAVIGATION_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn execute_script(&self, code: &str) -> Result<Value> {
        // Same-origin frame routing: rebind window/document to the active
        // frame so expressions evaluate against it.
        let routed = match *self.frame.lock().await {
            Some(i) => format!(
                "(function(window, document) {{ return ({code}); }})\
                 (window.frames[{i}], window.frames[{i}].document)"
            ),
            None => code.to_string(),
        };
        let evaluated = self
            .page
            .evaluate(routed)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(evaluated.value().cloned().unwrap_or(Value::Null))
    }

    async fn find(&self, strategy: Strategy, value: &str) -> Result<Box<dyn Element>> {
        let found = match strategy {
            Strategy::Css | Strategy::Tag => self.page.find_element(value).await,
            Strategy::XPath => self.page.find_xpath(value).await,
        };
        match found {
            Ok(element) => Ok(Box::new(CdpElement { inner: element })),
            Err(e) => Err(Self::map_find_error(strategy, value, e)),
        }
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| Self::classify_cdp(e.to_string()))?
            .ok_or_else(|| DriverError::TargetClosed("page has no URL".into()))
    }

    async fn move_pointer(&self, x: f64, y: f64) -> Result<()> {
        let event = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(DriverError::Protocol)?;
        self.page
            .execute(event)
            .await
            .map_err(|e| Self::classify_cdp(e.to_string()))?;
        Ok(())
    }

    async fn switch_frame(&self, index: Option<usize>) -> Result<()> {
        if let Some(i) = index {
            // Fail fast if the frame does not exist rather than at the next
            // script call.
            let exists = self
                .execute_script(&format!("window.frames.length > {i}"))
                .await?;
            if exists != Value::Bool(true) {
                return Err(DriverError::NotFound {
                    query: format!("frame[{i}]"),
                });
            }
        }
        *self.frame.lock().await = index;
        Ok(())
    }

    async fn accept_alert(&self) -> Result<()> {
        let params = HandleJavaScriptDialogParams::builder()
            .accept(true)
            .build()
            .map_err(DriverError::Protocol)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| Self::classify_cdp(e.to_string()))?;
        // The dialog is gone; its message must not leak into the next one.
        *self.dialog_message.lock().await = None;
        Ok(())
    }

    async fn alert_text(&self) -> Result<Option<String>> {
        Ok(self.dialog_message.lock().await.clone())
    }

    async fn quit(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let close_result = browser.close().await;
        if close_result.is_err() && self.kill_fallback {
            // Graceful close failed; force the process down. Skipped for
            // externally managed launchers, which own their own cleanup and
            // error out on a second shutdown.
            let _ = browser.kill().await;
        }
        let _ = browser.wait().await;
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        close_result
            .map(|_| ())
            .map_err(|e| Self::classify_cdp(e.to_string()))
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        // quit() leaves both slots empty; anything else means the session
        // escaped its scope without teardown.
        if let Ok(guard) = self.browser.try_lock() {
            if guard.is_some() {
                warn!(
                    target = "webauto",
                    "driver dropped without quit(); browser process may linger"
                );
            }
        }
        if let Ok(mut guard) = self.tasks.try_lock() {
            for task in guard.drain(..) {
                task.abort();
            }
        }
    }
}

/// Materializes download preferences into the profile that will be used,
/// creating a scratch profile when the spec did not pin one.
fn prepare_profile(
    spec: &LaunchSpec,
) -> Result<(Option<PathBuf>, Option<tempfile::TempDir>)> {
    let Some(prefs) = spec.download_prefs() else {
        return Ok((spec.user_data_dir.clone(), None));
    };

    match &spec.user_data_dir {
        Some(dir) => {
            write_profile_prefs(dir, &prefs)?;
            Ok((Some(dir.clone()), None))
        }
        None => {
            let scratch = tempfile::TempDir::with_prefix("webauto-profile-")?;
            write_profile_prefs(scratch.path(), &prefs)?;
            Ok((Some(scratch.path().to_path_buf()), Some(scratch)))
        }
    }
}

/// Writes (or merges into) `<profile>/Default/Preferences`, the same file
/// chromedriver uses to apply download options.
fn write_profile_prefs(profile_root: &Path, prefs: &Value) -> Result<()> {
    let default_dir = profile_root.join("Default");
    std::fs::create_dir_all(&default_dir)?;
    let prefs_path = default_dir.join("Preferences");

    let mut existing: Value = match std::fs::read_to_string(&prefs_path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|_| Value::Object(Default::default())),
        Err(_) => Value::Object(Default::default()),
    };
    merge_json(&mut existing, prefs);
    std::fs::write(&prefs_path, serde_json::to_vec_pretty(&existing)?)?;
    Ok(())
}

fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                merge_json(base_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

struct CdpElement {
    inner: CdpElementHandle,
}

impl fmt::Debug for CdpElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpElement").finish_non_exhaustive()
    }
}

#[async_trait]
impl Element for CdpElement {
    async fn click(&self) -> Result<()> {
        self.inner
            .click()
            .await
            .map_err(|e| CdpDriver::classify_cdp(e.to_string()))?;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.inner
            .type_str(text)
            .await
            .map_err(|e| CdpDriver::classify_cdp(e.to_string()))?;
        Ok(())
    }

    async fn outer_html(&self) -> Result<String> {
        let returns = self
            .inner
            .call_js_fn("function() { return this.outerHTML; }", false)
            .await
            .map_err(|e| CdpDriver::classify_cdp(e.to_string()))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    async fn text(&self) -> Result<String> {
        let text = self
            .inner
            .inner_text()
            .await
            .map_err(|e| CdpDriver::classify_cdp(e.to_string()))?;
        Ok(text.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_json_overlays_nested_objects() {
        let mut base = json!({ "download": { "prompt_for_download": true }, "other": 1 });
        merge_json(
            &mut base,
            &json!({ "download": { "default_directory": "/tmp/dl" } }),
        );
        assert_eq!(base["download"]["default_directory"], "/tmp/dl");
        assert_eq!(base["download"]["prompt_for_download"], true);
        assert_eq!(base["other"], 1);
    }

    #[test]
    fn write_profile_prefs_creates_default_preferences() {
        let dir = tempfile::tempdir().unwrap();
        write_profile_prefs(dir.path(), &json!({ "safebrowsing": { "enabled": true } })).unwrap();
        let written = std::fs::read_to_string(dir.path().join("Default/Preferences")).unwrap();
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["safebrowsing"]["enabled"], true);
    }

    #[test]
    fn only_genuine_misses_map_to_not_found() {
        let miss = CdpDriver::map_find_error(Strategy::Css, "h1", CdpError::NotFound);
        assert!(miss.is_not_found());

        // A dead session is not a miss; retrying the lookup cannot help.
        let dead = CdpDriver::map_find_error(Strategy::Css, "h1", CdpError::NoResponse);
        assert!(matches!(dead, DriverError::Protocol(_)));
    }

    #[test]
    fn cdp_error_classification_buckets_by_message() {
        assert!(CdpDriver::classify_cdp("Timeout waiting for response".into()).is_timeout());
        assert!(CdpDriver::classify_cdp("node is detached from document".into()).is_stale());
        assert!(matches!(
            CdpDriver::classify_cdp("browser closed".into()),
            DriverError::TargetClosed(_)
        ));
        assert!(matches!(
            CdpDriver::classify_cdp("unexpected".into()),
            DriverError::Protocol(_)
        ));
    }
}

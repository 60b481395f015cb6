//! In-memory driver double for exercising session and locator logic
//! without a browser process.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use webauto_driver::{Driver, DriverError, Element, Strategy};

/// Scripted [`Driver`] that records everything done to it.
///
/// Lookups consume a planned sequence of hit/miss outcomes; an exhausted
/// plan misses. Everything else succeeds unless told otherwise.
#[derive(Default)]
pub struct StubDriver {
    find_plan: Mutex<VecDeque<bool>>,
    scripts: Mutex<Vec<String>>,
    script_results: Mutex<HashMap<String, Value>>,
    navigations: Mutex<Vec<String>>,
    url: Mutex<Option<String>>,
    url_queries: AtomicUsize,
    alert_text: Mutex<Option<String>>,
    pointer_moves: Mutex<Vec<(f64, f64)>>,
    frame: Mutex<Option<usize>>,
    alerts_accepted: AtomicUsize,
    quit_calls: AtomicUsize,
    fail_quit: Mutex<Option<String>>,
    keystrokes: Arc<Mutex<Vec<String>>>,
    clicks: Arc<Mutex<usize>>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self {
            url: Mutex::new(Some("https://stub.invalid/".to_string())),
            ..Self::default()
        }
    }

    /// Scripts the outcome of upcoming lookups, oldest first.
    pub fn plan_finds(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.find_plan.lock().unwrap().extend(outcomes);
    }

    /// Makes `execute_script` return `value` for an exact `script` match.
    pub fn set_script_result(&self, script: impl Into<String>, value: Value) {
        self.script_results
            .lock()
            .unwrap()
            .insert(script.into(), value);
    }

    /// Sets the reported URL; `None` makes `current_url` fail.
    pub fn set_url(&self, url: Option<&str>) {
        *self.url.lock().unwrap() = url.map(str::to_string);
    }

    /// Makes `quit` fail with `message` (every call).
    pub fn fail_quit(&self, message: &str) {
        *self.fail_quit.lock().unwrap() = Some(message.to_string());
    }

    /// Sets the message reported for the open dialog.
    pub fn set_alert_text(&self, text: &str) {
        *self.alert_text.lock().unwrap() = Some(text.to_string());
    }

    /// How many times `current_url` was queried.
    pub fn url_queries(&self) -> usize {
        self.url_queries.load(Ordering::SeqCst)
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn pointer_moves(&self) -> Vec<(f64, f64)> {
        self.pointer_moves.lock().unwrap().clone()
    }

    pub fn frame(&self) -> Option<usize> {
        *self.frame.lock().unwrap()
    }

    pub fn alerts_accepted(&self) -> usize {
        self.alerts_accepted.load(Ordering::SeqCst)
    }

    pub fn quit_calls(&self) -> usize {
        self.quit_calls.load(Ordering::SeqCst)
    }

    /// Keystrokes received by every element this driver handed out.
    pub fn keystrokes(&self) -> Vec<String> {
        self.keystrokes.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> usize {
        *self.clicks.lock().unwrap()
    }
}

#[async_trait]
impl Driver for StubDriver {
    async fn navigate(&self, url: &str) -> webauto_driver::Result<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn execute_script(&self, code: &str) -> webauto_driver::Result<Value> {
        self.scripts.lock().unwrap().push(code.to_string());
        Ok(self
            .script_results
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn find(
        &self,
        _strategy: Strategy,
        value: &str,
    ) -> webauto_driver::Result<Box<dyn Element>> {
        let hit = self.find_plan.lock().unwrap().pop_front().unwrap_or(false);
        if hit {
            Ok(Box::new(StubElement {
                keystrokes: self.keystrokes.clone(),
                clicks: self.clicks.clone(),
            }))
        } else {
            Err(DriverError::NotFound {
                query: value.to_string(),
            })
        }
    }

    async fn current_url(&self) -> webauto_driver::Result<String> {
        self.url_queries.fetch_add(1, Ordering::SeqCst);
        self.url
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DriverError::Protocol("no page attached".to_string()))
    }

    async fn move_pointer(&self, x: f64, y: f64) -> webauto_driver::Result<()> {
        self.pointer_moves.lock().unwrap().push((x, y));
        Ok(())
    }

    async fn switch_frame(&self, index: Option<usize>) -> webauto_driver::Result<()> {
        *self.frame.lock().unwrap() = index;
        Ok(())
    }

    async fn accept_alert(&self) -> webauto_driver::Result<()> {
        self.alerts_accepted.fetch_add(1, Ordering::SeqCst);
        *self.alert_text.lock().unwrap() = None;
        Ok(())
    }

    async fn alert_text(&self) -> webauto_driver::Result<Option<String>> {
        Ok(self.alert_text.lock().unwrap().clone())
    }

    async fn quit(&self) -> webauto_driver::Result<()> {
        self.quit_calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_quit.lock().unwrap().clone() {
            Some(message) => Err(DriverError::Protocol(message)),
            None => Ok(()),
        }
    }
}

/// Element handed out by [`StubDriver`]; input lands in the driver's
/// shared logs.
#[derive(Debug)]
pub struct StubElement {
    keystrokes: Arc<Mutex<Vec<String>>>,
    clicks: Arc<Mutex<usize>>,
}

impl StubElement {
    /// Standalone element for tests that never touch a driver.
    pub fn detached() -> (Self, Arc<Mutex<Vec<String>>>) {
        let keystrokes = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                keystrokes: keystrokes.clone(),
                clicks: Arc::new(Mutex::new(0)),
            },
            keystrokes,
        )
    }
}

#[async_trait]
impl Element for StubElement {
    async fn click(&self) -> webauto_driver::Result<()> {
        *self.clicks.lock().unwrap() += 1;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> webauto_driver::Result<()> {
        self.keystrokes.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn outer_html(&self) -> webauto_driver::Result<String> {
        Ok("<div id=\"stub\"></div>".to_string())
    }

    async fn text(&self) -> webauto_driver::Result<String> {
        Ok("stub".to_string())
    }
}

//! Resolved launch recipes.
//!
//! A [`LaunchSpec`] is the fully owned handoff between configuration
//! resolution (which lives above this crate) and the launch internals of a
//! concrete driver. It carries no optional toggles left to interpret: every
//! field is already the effective value.

use std::path::PathBuf;

use serde_json::{Value, json};

/// Fixed mobile-viewport emulation profile.
#[derive(Debug, Clone)]
pub struct MobileProfile {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    pub user_agent: String,
}

impl Default for MobileProfile {
    fn default() -> Self {
        Self {
            width: 360,
            height: 740,
            pixel_ratio: 4.0,
            user_agent: "Mozilla/5.0 (Linux; Android 7.0; SM-G950U; wv) \
                         AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 \
                         Chrome/90.0.4430.91 Mobile Safari/537.36"
                .to_string(),
        }
    }
}

/// Fully resolved browser-launch recipe.
///
/// Built once per session request; the driver consumes it verbatim and never
/// re-derives flags.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    /// Command-line switches, order insensitive.
    pub args: Vec<String>,
    /// Explicit browser executable; `None` lets the driver auto-discover.
    pub executable: Option<PathBuf>,
    /// Profile root to launch with; `None` means a throwaway profile.
    pub user_data_dir: Option<PathBuf>,
    /// Download target directory; materialized as profile preferences.
    pub download_dir: Option<PathBuf>,
    /// Extension packages to load on startup.
    pub extensions: Vec<PathBuf>,
    /// Mobile-viewport emulation applied after page bootstrap.
    pub mobile: Option<MobileProfile>,
    /// Whether the browser renders headless.
    pub headless: bool,
    /// Gag the launcher's diagnostic stream during startup only.
    pub quiet_launch: bool,
    /// Force-kill the child when graceful close fails. Disabled when an
    /// external launcher owns process cleanup and a second shutdown would
    /// error.
    pub kill_fallback: bool,
}

impl LaunchSpec {
    /// Returns the Chrome `Preferences` fragment for the download directory,
    /// or `None` when no download directory was requested.
    ///
    /// Chromedriver applies download options by writing them into the
    /// profile's `Default/Preferences` before launch; the CDP driver does
    /// the same with this fragment.
    pub fn download_prefs(&self) -> Option<Value> {
        let dir = self.download_dir.as_ref()?;
        Some(json!({
            "download": {
                "default_directory": dir.display().to_string(),
                "prompt_for_download": false,
                "directory_upgrade": true,
            },
            "safebrowsing": { "enabled": true },
        }))
    }
}

//! Suite configuration
//!
//! Everything is read from environment-style variables once at process start.
//! Every variable is optional; invalid values are reported and the default is
//! kept.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Path under which the target application mounts its REST API.
pub const API_PREFIX: &str = "/api";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// A username/password pair used to log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Browser window and emulated viewport size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Root of the web UI
    pub base_url: String,
    /// Root the API client joins endpoints against
    pub api_base_url: String,
    pub admin: Credentials,
    pub user: Credentials,
    pub headless: bool,
    /// Delay inserted after browser navigation
    pub slow_mo: Duration,
    /// Default timeout for every network and browser operation
    pub timeout: Duration,
    pub screenshot_dir: PathBuf,
    pub viewport: Viewport,
    /// Scenarios run concurrently by the runner
    pub workers: usize,
    /// Attempt budget for self-repairing fixtures
    pub fixture_attempts: u32,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            admin: Credentials::new("admin", "admin123"),
            user: Credentials::new("testuser", "test123"),
            headless: true,
            slow_mo: Duration::ZERO,
            timeout: Duration::from_secs(30),
            screenshot_dir: PathBuf::from("reports/screenshots"),
            viewport: Viewport::default(),
            workers: 2,
            fixture_attempts: 3,
        }
    }
}

impl SuiteConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// `API_BASE_URL` falls back to `BASE_URL` when unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(base_url) = get("BASE_URL") {
            config.base_url = trim_trailing_slash(&base_url);
        }
        config.api_base_url = get("API_BASE_URL")
            .map(|url| trim_trailing_slash(&url))
            .unwrap_or_else(|| config.base_url.clone());

        if let Some(username) = get("ADMIN_USERNAME") {
            config.admin.username = username;
        }
        if let Some(password) = get("ADMIN_PASSWORD") {
            config.admin.password = password;
        }
        if let Some(username) = get("USER_USERNAME") {
            config.user.username = username;
        }
        if let Some(password) = get("USER_PASSWORD") {
            config.user.password = password;
        }

        if let Some(raw) = get("HEADLESS") {
            match parse_bool(&raw) {
                Some(headless) => config.headless = headless,
                None => warn!("Invalid HEADLESS value: {}", raw),
            }
        }
        if let Some(ms) = parse_number::<u64>(get("SLOW_MO"), "SLOW_MO") {
            config.slow_mo = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_number::<u64>(get("TIMEOUT"), "TIMEOUT") {
            if ms == 0 {
                warn!("TIMEOUT must be positive, keeping {:?}", config.timeout);
            } else {
                config.timeout = Duration::from_millis(ms);
            }
        }
        if let Some(dir) = get("SCREENSHOT_DIR") {
            config.screenshot_dir = PathBuf::from(dir);
        }
        if let Some(width) = parse_number::<u32>(get("VIEWPORT_WIDTH"), "VIEWPORT_WIDTH") {
            config.viewport.width = width;
        }
        if let Some(height) = parse_number::<u32>(get("VIEWPORT_HEIGHT"), "VIEWPORT_HEIGHT") {
            config.viewport.height = height;
        }
        if let Some(workers) = parse_number::<usize>(get("WORKERS"), "WORKERS") {
            config.workers = workers.max(1);
        }
        if let Some(attempts) = parse_number::<u32>(get("FIXTURE_ATTEMPTS"), "FIXTURE_ATTEMPTS") {
            config.fixture_attempts = attempts.max(1);
        }

        config
    }

    /// Credentials for the given role, if the role logs in at all
    pub fn credentials_for(&self, role: crate::client::Role) -> Option<&Credentials> {
        match role {
            crate::client::Role::Admin => Some(&self.admin),
            crate::client::Role::User => Some(&self.user),
            crate::client::Role::Anonymous => None,
        }
    }
}

fn trim_trailing_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T: std::str::FromStr>(raw: Option<String>, key: &str) -> Option<T> {
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} value: {}", key, raw);
            None
        }
    }
}

//! Browser seam for UI scenarios.
//!
//! One [`BrowserProcess`] is shared by the whole run. Each UI scenario gets
//! its own [`BrowsingContext`] (isolated cookies and storage) with a single
//! [`PageHandle`] inside it. The real backend lives in [`chromium`]; tests
//! plug in recording fakes through the same traits.

#[cfg(feature = "chromium")]
pub mod chromium;

use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{SuiteConfig, Viewport};
use crate::error::{BrowserError, BrowserResult};

#[cfg(feature = "chromium")]
pub use chromium::ChromiumLauncher;

/// Settings applied when launching the browser and opening pages.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Pause after each navigation
    pub slow_mo: Duration,
    /// Upper bound for any single browser operation
    pub timeout: Duration,
    pub viewport: Viewport,
}

impl LaunchOptions {
    pub fn from_config(config: &SuiteConfig) -> Self {
        Self {
            headless: config.headless,
            slow_mo: config.slow_mo,
            timeout: config.timeout,
            viewport: config.viewport,
        }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from_config(&SuiteConfig::default())
    }
}

/// Starts a browser process.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> BrowserResult<Arc<dyn BrowserProcess>>;
}

/// A running browser shared across scenarios.
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    /// Create an isolated context. Contexts never share cookies or storage.
    async fn new_context(&self, options: &LaunchOptions) -> BrowserResult<Box<dyn BrowsingContext>>;

    async fn close(&self) -> BrowserResult<()>;
}

#[async_trait]
pub trait BrowsingContext: Send + Sync {
    fn id(&self) -> &str;

    /// Open a page and navigate it to `url`
    async fn new_page(&self, url: &str) -> BrowserResult<Box<dyn PageHandle>>;

    async fn close(&self) -> BrowserResult<()>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    /// Write a full-page PNG to `path`
    async fn screenshot(&self, path: &Path) -> BrowserResult<()>;

    async fn close(&self) -> BrowserResult<()>;
}

/// Run a browser operation under `limit`, turning expiry into
/// [`BrowserError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> BrowserResult<T>
where
    F: Future<Output = BrowserResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout(
            limit.as_millis() as u64,
            operation.to_string(),
        )),
    }
}

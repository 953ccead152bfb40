//! Chromium backend over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{with_timeout, BrowserLauncher, BrowserProcess, BrowsingContext, LaunchOptions, PageHandle};
use crate::error::{BrowserError, BrowserResult};

/// Launches a local Chrome/Chromium.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> BrowserResult<Arc<dyn BrowserProcess>> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.viewport.width, options.viewport.height)
            .request_timeout(options.timeout)
            .arg("--disable-gpu")
            .arg("--no-sandbox");
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = with_timeout(options.timeout, "launch browser", async {
            Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))
        })
        .await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        info!(headless = options.headless, "Browser launched");
        Ok(Arc::new(ChromiumProcess {
            browser: Arc::new(Mutex::new(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            timeout: options.timeout,
        }))
    }
}

struct ChromiumProcess {
    browser: Arc<Mutex<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    timeout: std::time::Duration,
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    async fn new_context(&self, options: &LaunchOptions) -> BrowserResult<Box<dyn BrowsingContext>> {
        let id = with_timeout(options.timeout, "create browsing context", async {
            let browser = self.browser.lock().await;
            browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map(|response| response.result.browser_context_id)
                .map_err(|e| BrowserError::Context(e.to_string()))
        })
        .await?;

        debug!(context = %id.inner(), "Browsing context created");
        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            label: id.inner().clone(),
            id,
            options: options.clone(),
        }))
    }

    async fn close(&self) -> BrowserResult<()> {
        let result = with_timeout(self.timeout, "close browser", async {
            let mut browser = self.browser.lock().await;
            browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::Close("browser".to_string(), e.to_string()))
        })
        .await;

        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }
        result
    }
}

struct ChromiumContext {
    browser: Arc<Mutex<Browser>>,
    id: BrowserContextId,
    label: String,
    options: LaunchOptions,
}

#[async_trait]
impl BrowsingContext for ChromiumContext {
    fn id(&self) -> &str {
        &self.label
    }

    async fn new_page(&self, url: &str) -> BrowserResult<Box<dyn PageHandle>> {
        let params = CreateTargetParams::builder()
            .url(url)
            .browser_context_id(self.id.clone())
            .build()
            .map_err(BrowserError::Page)?;

        let page = with_timeout(self.options.timeout, "open page", async {
            let browser = self.browser.lock().await;
            browser
                .new_page(params)
                .await
                .map_err(|e| BrowserError::Page(e.to_string()))
        })
        .await?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(self.options.viewport.width))
            .height(i64::from(self.options.viewport.height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(BrowserError::Page)?;
        with_timeout(self.options.timeout, "set viewport", async {
            page.execute(metrics)
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::Page(e.to_string()))
        })
        .await?;

        if !self.options.slow_mo.is_zero() {
            tokio::time::sleep(self.options.slow_mo).await;
        }

        Ok(Box::new(ChromiumPage {
            page,
            options: self.options.clone(),
        }))
    }

    async fn close(&self) -> BrowserResult<()> {
        with_timeout(self.options.timeout, "close browsing context", async {
            let browser = self.browser.lock().await;
            browser
                .execute(DisposeBrowserContextParams::new(self.id.clone()))
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::Close("browsing context".to_string(), e.to_string()))
        })
        .await
    }
}

struct ChromiumPage {
    page: Page,
    options: LaunchOptions,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        with_timeout(self.options.timeout, "navigate", async {
            self.page
                .goto(url)
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::Page(e.to_string()))
        })
        .await?;
        if !self.options.slow_mo.is_zero() {
            tokio::time::sleep(self.options.slow_mo).await;
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> BrowserResult<()> {
        let png = with_timeout(self.options.timeout, "screenshot", async {
            self.page
                .screenshot(ScreenshotParams::builder().full_page(true).build())
                .await
                .map_err(|e| BrowserError::Screenshot(e.to_string()))
        })
        .await?;

        tokio::fs::write(path, png).await.map_err(|e| {
            warn!(path = %path.display(), "Could not write screenshot: {}", e);
            BrowserError::Screenshot(format!("{}: {}", path.display(), e))
        })
    }

    async fn close(&self) -> BrowserResult<()> {
        with_timeout(self.options.timeout, "close page", async {
            self.page
                .clone()
                .close()
                .await
                .map_err(|e| BrowserError::Close("page".to_string(), e.to_string()))
        })
        .await
    }
}

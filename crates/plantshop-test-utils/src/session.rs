//! Per-scenario sessions and the run-wide context they share.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::browser::{BrowserLauncher, BrowserProcess, BrowsingContext, LaunchOptions, PageHandle};
use crate::cleanup::{CleanupReport, CreatedResources};
use crate::client::{ApiClient, AuthOutcome, Role};
use crate::config::SuiteConfig;
use crate::diagnostics::capture_screenshot;
use crate::error::{BrowserResult, SetupError, SetupResult};
use crate::fixtures::Fixtures;
use crate::response::ResourceId;

/// Tag that makes a scenario acquire a browser page
pub const UI_TAG: &str = "ui";

/// State shared by every scenario of one run.
///
/// Built once at suite start and handed to each [`Session`]. The browser is
/// launched lazily by the first scenario that needs it.
pub struct RunContext {
    config: SuiteConfig,
    launcher: Arc<dyn BrowserLauncher>,
    browser: OnceCell<Arc<dyn BrowserProcess>>,
}

impl RunContext {
    /// Context using the default browser backend
    pub fn new(config: SuiteConfig) -> Self {
        Self::with_launcher(config, default_launcher())
    }

    pub fn with_launcher(config: SuiteConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            config,
            launcher,
            browser: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions::from_config(&self.config)
    }

    /// The shared browser, launched on first call
    pub async fn browser(&self) -> BrowserResult<Arc<dyn BrowserProcess>> {
        let browser = self
            .browser
            .get_or_try_init(|| async { self.launcher.launch(&self.launch_options()).await })
            .await?;
        Ok(Arc::clone(browser))
    }

    pub fn browser_launched(&self) -> bool {
        self.browser.initialized()
    }

    /// Close the shared browser if one was launched
    pub async fn shutdown(&self) -> BrowserResult<()> {
        match self.browser.get() {
            Some(browser) => {
                info!("Closing shared browser");
                browser.close().await
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("config", &self.config)
            .field("browser_launched", &self.browser_launched())
            .finish()
    }
}

#[cfg(feature = "chromium")]
fn default_launcher() -> Arc<dyn BrowserLauncher> {
    Arc::new(crate::browser::ChromiumLauncher)
}

#[cfg(not(feature = "chromium"))]
fn default_launcher() -> Arc<dyn BrowserLauncher> {
    Arc::new(UnavailableLauncher)
}

#[cfg(not(feature = "chromium"))]
struct UnavailableLauncher;

#[cfg(not(feature = "chromium"))]
#[async_trait::async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> BrowserResult<Arc<dyn BrowserProcess>> {
        Err(crate::error::BrowserError::Launch(
            "built without the chromium feature".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Setup,
    Running,
    Teardown,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Setup => "setup",
            SessionState::Running => "running",
            SessionState::Teardown => "teardown",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Name and tags of the scenario a session serves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScenarioInfo {
    pub name: String,
    /// Tags without the leading `@`
    pub tags: Vec<String>,
}

impl ScenarioInfo {
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            tags: tags
                .into_iter()
                .map(|t| t.as_ref().trim().trim_start_matches('@').to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('@');
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_ui(&self) -> bool {
        self.has_tag(UI_TAG)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Passed,
    Failed,
    Skipped,
}

/// What teardown did. Teardown itself never fails; problems land here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub screenshot: Option<PathBuf>,
    pub cleanup: Option<CleanupReport>,
    pub errors: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.cleanup.as_ref().map_or(true, CleanupReport::is_clean)
    }
}

/// Everything one scenario owns.
pub struct Session {
    run: Arc<RunContext>,
    state: SessionState,
    scenario: Option<ScenarioInfo>,
    api: Option<ApiClient>,
    context: Option<Box<dyn BrowsingContext>>,
    page: Option<Box<dyn PageHandle>>,
    resources: CreatedResources,
    test_data: HashMap<String, Value>,
}

impl Session {
    pub fn new(run: Arc<RunContext>) -> Self {
        Self {
            run,
            state: SessionState::Uninitialized,
            scenario: None,
            api: None,
            context: None,
            page: None,
            resources: CreatedResources::default(),
            test_data: HashMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn scenario(&self) -> Option<&ScenarioInfo> {
        self.scenario.as_ref()
    }

    pub fn config(&self) -> &SuiteConfig {
        self.run.config()
    }

    pub fn base_url(&self) -> &str {
        &self.run.config().base_url
    }

    pub fn api_base_url(&self) -> &str {
        &self.run.config().api_base_url
    }

    /// Acquire the API client and, for UI scenarios, a context and page.
    ///
    /// On error the session keeps whatever it already acquired so that
    /// [`Session::teardown`] can release it.
    pub async fn setup(&mut self, scenario: ScenarioInfo) -> SetupResult<()> {
        if self.state != SessionState::Uninitialized {
            return Err(SetupError::InvalidState {
                expected: SessionState::Uninitialized.to_string(),
                actual: self.state.to_string(),
            });
        }
        self.state = SessionState::Setup;
        let is_ui = scenario.is_ui();
        info!(scenario = %scenario.name, ui = is_ui, "Setting up scenario session");
        self.scenario = Some(scenario);

        self.api = Some(ApiClient::from_config(self.run.config())?);

        if is_ui {
            let options = self.run.launch_options();
            let browser = self.run.browser().await?;
            let context = browser.new_context(&options).await?;
            debug!(context = context.id(), "Browsing context ready");
            let context = self.context.insert(context);
            let page = context.new_page(&self.run.config().base_url).await?;
            self.page = Some(page);
        }

        self.state = SessionState::Running;
        Ok(())
    }

    /// The session's API client
    pub fn api(&self) -> SetupResult<&ApiClient> {
        self.api.as_ref().ok_or_else(|| not_running(self.state))
    }

    pub fn api_mut(&mut self) -> SetupResult<&mut ApiClient> {
        let state = self.state;
        self.api.as_mut().ok_or_else(|| not_running(state))
    }

    pub fn page(&self) -> Option<&dyn PageHandle> {
        self.page.as_deref()
    }

    pub fn has_browser(&self) -> bool {
        self.context.is_some()
    }

    /// Log in with the configured credentials for `role`.
    /// `Anonymous` has no credentials and is rejected.
    pub async fn authenticate_as(&mut self, role: Role) -> SetupResult<AuthOutcome> {
        let credentials = self
            .run
            .config()
            .credentials_for(role)
            .cloned()
            .ok_or_else(|| SetupError::Precondition(format!("no credentials for role {}", role)))?;
        let api = self.api_mut()?;
        api.authenticate(&credentials.username, &credentials.password)
            .await
    }

    pub fn logout(&mut self) {
        if let Some(api) = self.api.as_mut() {
            api.logout();
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.api.as_ref().and_then(ApiClient::token)
    }

    pub fn role(&self) -> Role {
        self.api.as_ref().map_or(Role::Anonymous, ApiClient::role)
    }

    pub fn resources(&self) -> &CreatedResources {
        &self.resources
    }

    pub fn track_sale(&mut self, id: impl Into<ResourceId>) {
        self.resources.track_sale(id);
    }

    pub fn track_plant(&mut self, id: impl Into<ResourceId>) {
        self.resources.track_plant(id);
    }

    pub fn forget_sale(&mut self, id: &ResourceId) {
        self.resources.forget_sale(id);
    }

    pub fn forget_plant(&mut self, id: &ResourceId) {
        self.resources.forget_plant(id);
    }

    pub fn remember(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.test_data.insert(key.into(), value.into());
    }

    pub fn recall(&self, key: &str) -> Option<&Value> {
        self.test_data.get(key)
    }

    /// Fixture helpers acting through this session's client
    pub fn fixtures(&mut self) -> SetupResult<Fixtures<'_>> {
        let client = self.api.clone().ok_or_else(|| not_running(self.state))?;
        Ok(Fixtures::new(client, self.run.config(), &mut self.resources))
    }

    /// Release everything the session holds.
    ///
    /// Order: failure screenshot, page, context, tracked resources, API
    /// client. Each step runs even if an earlier one failed. A second call
    /// is a no-op.
    pub async fn teardown(&mut self, outcome: ScenarioOutcome) -> TeardownReport {
        let mut report = TeardownReport::default();
        match self.state {
            SessionState::Closed | SessionState::Teardown => return report,
            SessionState::Uninitialized => {
                self.state = SessionState::Closed;
                return report;
            }
            SessionState::Setup | SessionState::Running => {}
        }
        self.state = SessionState::Teardown;
        let title = self
            .scenario
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default();

        if outcome == ScenarioOutcome::Failed {
            if let Some(page) = self.page.as_deref() {
                match capture_screenshot(page, &self.run.config().screenshot_dir, &title).await {
                    Ok(path) => report.screenshot = Some(path),
                    Err(e) => {
                        warn!(scenario = %title, "Failure screenshot not captured: {}", e);
                        report.errors.push(e.to_string());
                    }
                }
            }
        }

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
                report.errors.push(e.to_string());
            }
        }
        if let Some(context) = self.context.take() {
            if let Err(e) = context.close().await {
                warn!(context = context.id(), "Failed to close browsing context: {}", e);
                report.errors.push(e.to_string());
            }
        }

        let resources = self.resources.drain();
        if !resources.is_empty() {
            match self.cleanup_client().await {
                Ok(client) => report.cleanup = Some(client.cleanup_tracked(&resources).await),
                Err(e) => {
                    warn!("Skipping resource cleanup: {}", e);
                    report.errors.push(e.to_string());
                }
            }
        }

        if let Some(mut api) = self.api.take() {
            api.logout();
        }
        self.test_data.clear();
        self.state = SessionState::Closed;
        info!(scenario = %title, ?outcome, clean = report.is_clean(), "Scenario session closed");
        report
    }

    /// Admin client for cleanup, reusing the session's when it already is one
    async fn cleanup_client(&self) -> SetupResult<ApiClient> {
        if let Some(api) = &self.api {
            if api.role() == Role::Admin {
                return Ok(api.clone());
            }
        }
        let admin = &self.run.config().admin;
        let mut client = match &self.api {
            Some(api) => api.anonymous(),
            None => ApiClient::from_config(self.run.config())?,
        };
        client.authenticate(&admin.username, &admin.password).await?;
        Ok(client)
    }
}

fn not_running(state: SessionState) -> SetupError {
    SetupError::InvalidState {
        expected: SessionState::Running.to_string(),
        actual: state.to_string(),
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("scenario", &self.scenario)
            .field("api", &self.api)
            .field("has_browser", &self.context.is_some())
            .field("resources", &self.resources)
            .field("test_data", &self.test_data)
            .finish()
    }
}

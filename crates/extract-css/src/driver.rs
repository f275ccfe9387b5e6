//! PageDriver - the seam between the extraction pipeline and a browser.
//!
//! The pipeline never talks to a browser directly. Everything it needs from a
//! rendered page goes through [`PageDriver`], so the Chromium implementation
//! can be swapped for [`MockDriver`] in tests or for a custom launcher via a
//! browser override.
//!
//! ```text
//! ┌──────────────────┐   launch    ┌──────────────────────────────┐
//! │ DriverLauncher   │────────────►│ PageDriver                   │
//! │  ChromiumLauncher│             │  start_css_coverage          │
//! │  MockLauncher    │             │  navigate / response_body    │
//! └──────────────────┘             │  stylesheet_tree             │
//!                                  │  coverage_records            │
//!                                  │  inline_style_attributes     │
//!                                  │  close                       │
//!                                  └──────────────────────────────┘
//! ```

use crate::coverage::CoverageRecord;
use crate::result::{ExtractError, ExtractResult};
use crate::stylesheet::StylesheetNode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Navigation readiness condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// `load` event fired
    Load,
    /// `DOMContentLoaded` event fired
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// No network activity for a quiet period
    #[default]
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    /// At most two requests in flight for a quiet period
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

impl WaitUntil {
    /// Whether this condition waits for the network to settle
    #[must_use]
    pub const fn waits_for_network(self) -> bool {
        matches!(self, Self::NetworkIdle0 | Self::NetworkIdle2)
    }
}

impl std::str::FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            "networkidle0" => Ok(Self::NetworkIdle0),
            "networkidle2" => Ok(Self::NetworkIdle2),
            other => Err(format!(
                "unknown wait condition '{other}' (expected load, domcontentloaded, networkidle0 or networkidle2)"
            )),
        }
    }
}

/// Options passed through to the driver on navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Readiness condition
    pub wait_until: WaitUntil,
    /// Navigation timeout
    pub timeout: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Response of the main navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    /// HTTP status code
    pub status: u16,
    /// HTTP status text
    pub status_text: String,
    /// `Content-Type` header or MIME type
    pub content_type: Option<String>,
    /// Final document URL after redirects, if the driver knows it
    pub final_url: Option<String>,
}

impl NavigationResponse {
    /// A 200 OK HTML response
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            content_type: Some("text/html".to_string()),
            final_url: None,
        }
    }

    /// Whether the status is an HTTP error (>= 400)
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Whether the navigated resource is itself a stylesheet
    #[must_use]
    pub fn is_stylesheet(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            ct.split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/css"))
        })
    }
}

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Path to the browser binary (None = auto-detect)
    pub executable_path: Option<String>,
    /// Extra command-line arguments for the browser
    pub args: Vec<String>,
    /// User agent override
    pub user_agent: Option<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            executable_path: None,
            args: Vec::new(),
            user_agent: None,
        }
    }
}

impl LaunchConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set browser executable path
    #[must_use]
    pub fn with_executable_path(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Add browser arguments
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }
}

/// Abstract page driver
///
/// Implementations own one browser page. The three channel reads take
/// `&self` and are independent, so the pipeline runs them concurrently.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Begin collecting CSS coverage; called before navigation
    async fn start_css_coverage(&self) -> ExtractResult<()>;

    /// Navigate to `url`
    async fn navigate(&self, url: &str, options: &NavigateOptions) -> ExtractResult<NavigationResponse>;

    /// Body of the main navigation response
    async fn response_body(&self) -> ExtractResult<String>;

    /// All stylesheets of the document in document order
    async fn stylesheet_tree(&self) -> ExtractResult<Vec<StylesheetNode>>;

    /// CSS exercised on the page, per resource
    async fn coverage_records(&self) -> ExtractResult<Vec<CoverageRecord>>;

    /// Raw `style` attribute values of every element carrying one
    async fn inline_style_attributes(&self) -> ExtractResult<Vec<String>>;

    /// Release the page and its browser
    async fn close(&mut self) -> ExtractResult<()>;
}

/// Launches page drivers
#[async_trait]
pub trait DriverLauncher: Send + Sync + std::fmt::Debug {
    /// Launch a browser and open a page
    async fn launch(&self, config: &LaunchConfig) -> ExtractResult<Box<dyn PageDriver>>;
}

/// Channel a [`MockDriver`] can be told to fail on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockChannel {
    /// `stylesheet_tree`
    StylesheetTree,
    /// `coverage_records`
    Coverage,
    /// `inline_style_attributes`
    InlineStyles,
}

/// Mock driver for unit testing
///
/// Clones share their call history, so a test can keep a clone around to
/// inspect what the pipeline did with a driver it launched.
#[derive(Debug, Clone)]
pub struct MockDriver {
    /// Navigation response to report
    pub response: NavigationResponse,
    /// Response body
    pub body: String,
    /// Stylesheet tree to report
    pub sheets: Vec<StylesheetNode>,
    /// Coverage records to report
    pub coverage: Vec<CoverageRecord>,
    /// Inline style attribute values to report
    pub inline_attributes: Vec<String>,
    /// Artificial navigation latency
    pub navigate_delay: Option<Duration>,
    /// Channel that fails when read
    pub failing_channel: Option<MockChannel>,
    /// Fail on close
    pub fail_close: bool,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            response: NavigationResponse::ok(),
            body: String::new(),
            sheets: Vec::new(),
            coverage: Vec::new(),
            inline_attributes: Vec::new(),
            navigate_delay: None,
            failing_channel: None,
            fail_close: false,
            call_history: Arc::default(),
        }
    }
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this status
    #[must_use]
    pub fn with_status(mut self, status: u16, status_text: impl Into<String>) -> Self {
        self.response.status = status;
        self.response.status_text = status_text.into();
        self
    }

    /// Report this content type and body
    #[must_use]
    pub fn with_document(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.response.content_type = Some(content_type.into());
        self.body = body.into();
        self
    }

    /// Report these stylesheets
    #[must_use]
    pub fn with_sheets(mut self, sheets: Vec<StylesheetNode>) -> Self {
        self.sheets = sheets;
        self
    }

    /// Report these coverage records
    #[must_use]
    pub fn with_coverage(mut self, coverage: Vec<CoverageRecord>) -> Self {
        self.coverage = coverage;
        self
    }

    /// Report these inline style attribute values
    #[must_use]
    pub fn with_inline_attributes<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inline_attributes = values.into_iter().map(Into::into).collect();
        self
    }

    /// Delay navigation
    #[must_use]
    pub const fn with_navigate_delay(mut self, delay: Duration) -> Self {
        self.navigate_delay = Some(delay);
        self
    }

    /// Fail when `channel` is read
    #[must_use]
    pub const fn with_failing_channel(mut self, channel: MockChannel) -> Self {
        self.failing_channel = Some(channel);
        self
    }

    /// Fail on close
    #[must_use]
    pub const fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(method))
    }

    fn record(&self, call: impl Into<String>) {
        self.call_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.into());
    }

    fn check_channel(&self, channel: MockChannel) -> ExtractResult<()> {
        if self.failing_channel == Some(channel) {
            return Err(ExtractError::page(format!("mock failure reading {channel:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn start_css_coverage(&self) -> ExtractResult<()> {
        self.record("start_css_coverage");
        Ok(())
    }

    async fn navigate(&self, url: &str, options: &NavigateOptions) -> ExtractResult<NavigationResponse> {
        self.record(format!("navigate:{url}:{:?}", options.wait_until));
        if let Some(delay) = self.navigate_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.response.clone())
    }

    async fn response_body(&self) -> ExtractResult<String> {
        self.record("response_body");
        Ok(self.body.clone())
    }

    async fn stylesheet_tree(&self) -> ExtractResult<Vec<StylesheetNode>> {
        self.record("stylesheet_tree");
        self.check_channel(MockChannel::StylesheetTree)?;
        Ok(self.sheets.clone())
    }

    async fn coverage_records(&self) -> ExtractResult<Vec<CoverageRecord>> {
        self.record("coverage_records");
        self.check_channel(MockChannel::Coverage)?;
        Ok(self.coverage.clone())
    }

    async fn inline_style_attributes(&self) -> ExtractResult<Vec<String>> {
        self.record("inline_style_attributes");
        self.check_channel(MockChannel::InlineStyles)?;
        Ok(self.inline_attributes.clone())
    }

    async fn close(&mut self) -> ExtractResult<()> {
        self.record("close");
        if self.fail_close {
            return Err(ExtractError::page("mock close failure"));
        }
        Ok(())
    }
}

/// Launcher handing out clones of a [`MockDriver`]
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    driver: MockDriver,
    launches: Arc<Mutex<Vec<LaunchConfig>>>,
}

impl MockLauncher {
    /// Create launcher for `driver`
    #[must_use]
    pub fn new(driver: MockDriver) -> Self {
        Self {
            driver,
            launches: Arc::default(),
        }
    }

    /// The driver handed out (shares call history with launched copies)
    #[must_use]
    pub const fn driver(&self) -> &MockDriver {
        &self.driver
    }

    /// Configurations passed to `launch`, in order
    #[must_use]
    pub fn launches(&self) -> Vec<LaunchConfig> {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DriverLauncher for MockLauncher {
    async fn launch(&self, config: &LaunchConfig) -> ExtractResult<Box<dyn PageDriver>> {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(config.clone());
        Ok(Box::new(self.driver.clone()))
    }
}

//! Options for [`crate::extract_css_with`].

use crate::aggregate::{AggregateOptions, InlineStylesMode, OriginsMode};
use crate::browser_override::BrowserOverride;
use crate::driver::{LaunchConfig, NavigateOptions, WaitUntil};
use crate::inline::InlineSelector;
use std::time::Duration;

/// Extraction options
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Navigation readiness condition
    pub wait_until: WaitUntil,
    /// Navigation timeout
    pub timeout: Duration,
    /// Structured or flattened output
    pub origins: OriginsMode,
    /// Inline style handling
    pub inline_styles: InlineStylesMode,
    /// Selector strategy for inline rules
    pub inline_selector: InlineSelector,
    /// Launch configuration for the default launcher
    pub launch: LaunchConfig,
    /// Substitute browser
    pub browser_override: Option<BrowserOverride>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::default(),
            timeout: Duration::from_secs(30),
            origins: OriginsMode::default(),
            inline_styles: InlineStylesMode::default(),
            inline_selector: InlineSelector::default(),
            launch: LaunchConfig::default(),
            browser_override: None,
        }
    }
}

impl ExtractOptions {
    /// Create new options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set navigation readiness condition
    #[must_use]
    pub const fn with_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set origins mode
    #[must_use]
    pub const fn with_origins(mut self, origins: OriginsMode) -> Self {
        self.origins = origins;
        self
    }

    /// Set inline styles mode
    #[must_use]
    pub const fn with_inline_styles(mut self, inline_styles: InlineStylesMode) -> Self {
        self.inline_styles = inline_styles;
        self
    }

    /// Set inline selector strategy
    #[must_use]
    pub const fn with_inline_selector(mut self, selector: InlineSelector) -> Self {
        self.inline_selector = selector;
        self
    }

    /// Set launch configuration
    #[must_use]
    pub fn with_launch(mut self, launch: LaunchConfig) -> Self {
        self.launch = launch;
        self
    }

    /// Use a substitute browser
    #[must_use]
    pub fn with_browser_override(mut self, browser_override: BrowserOverride) -> Self {
        self.browser_override = Some(browser_override);
        self
    }

    /// Navigation options passed to the driver
    #[must_use]
    pub const fn navigate_options(&self) -> NavigateOptions {
        NavigateOptions {
            wait_until: self.wait_until,
            timeout: self.timeout,
        }
    }

    /// Aggregation options
    #[must_use]
    pub const fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            origins: self.origins,
            inline_styles: self.inline_styles,
        }
    }
}

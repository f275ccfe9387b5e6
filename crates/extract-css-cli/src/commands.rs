//! CLI command definitions using clap

use clap::{Parser, ValueEnum};
use extract_css::{
    ExtractOptions, InlineSelector, InlineStylesMode, LaunchConfig, OriginsMode, WaitUntil,
};
use std::path::PathBuf;
use std::time::Duration;

/// extract-css: print all CSS used by a web page
#[derive(Parser, Debug)]
#[command(name = "extract-css")]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Page (or stylesheet) URL to extract CSS from
    pub url: String,

    /// Print provenance entries as JSON instead of flattened CSS
    #[arg(long, value_enum, default_value = "exclude")]
    pub origins: OriginsArg,

    /// Fold inline style attributes into the result
    #[arg(long, value_enum, default_value = "include")]
    pub inline_styles: InlineStylesArg,

    /// Selector wrapped around inline style declarations
    #[arg(long, value_enum, default_value = "fixed")]
    pub inline_selector: InlineSelectorArg,

    /// When navigation counts as finished
    /// (load, domcontentloaded, networkidle0, networkidle2)
    #[arg(long, default_value = "networkidle0")]
    pub wait_until: WaitUntil,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value = "30000")]
    pub timeout: u64,

    /// Browser binary to launch instead of the auto-detected one
    #[arg(long, env = "EXTRACT_CSS_BROWSER")]
    pub executable_path: Option<PathBuf>,

    /// Browser override as JSON, e.g.
    /// '{"executablePath": "/usr/bin/chromium", "args": ["--no-zygote"]}'
    #[arg(long)]
    pub browser_override: Option<String>,

    /// Extra browser argument (repeatable)
    #[arg(long = "browser-arg", allow_hyphen_values = true)]
    pub browser_args: Vec<String>,

    /// Disable the browser sandbox (for containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// User agent override
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Extraction options described by the arguments
    #[must_use]
    pub fn extract_options(&self) -> ExtractOptions {
        let mut launch = LaunchConfig::default()
            .with_headless(!self.headful)
            .with_args(self.browser_args.iter().cloned());
        if self.no_sandbox {
            launch = launch.with_no_sandbox();
        }
        if let Some(ref path) = self.executable_path {
            launch = launch.with_executable_path(path.to_string_lossy());
        }
        if let Some(ref ua) = self.user_agent {
            launch = launch.with_user_agent(ua.clone());
        }

        ExtractOptions::new()
            .with_wait_until(self.wait_until)
            .with_timeout(Duration::from_millis(self.timeout))
            .with_origins(self.origins.into())
            .with_inline_styles(self.inline_styles.into())
            .with_inline_selector(self.inline_selector.into())
            .with_launch(launch)
    }
}

/// Output shape argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OriginsArg {
    /// Provenance entries as JSON
    Include,
    /// Flattened CSS text
    #[default]
    Exclude,
}

impl From<OriginsArg> for OriginsMode {
    fn from(arg: OriginsArg) -> Self {
        match arg {
            OriginsArg::Include => Self::Include,
            OriginsArg::Exclude => Self::Exclude,
        }
    }
}

/// Inline styles argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InlineStylesArg {
    /// Include inline style attributes
    #[default]
    Include,
    /// Leave them out
    Exclude,
}

impl From<InlineStylesArg> for InlineStylesMode {
    fn from(arg: InlineStylesArg) -> Self {
        match arg {
            InlineStylesArg::Include => Self::Include,
            InlineStylesArg::Exclude => Self::Exclude,
        }
    }
}

/// Inline selector argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InlineSelectorArg {
    /// `[x-extract-css-inline-style]` for every rule
    #[default]
    Fixed,
    /// Selector suffixed with a hash of the declarations
    ContentHash,
}

impl From<InlineSelectorArg> for InlineSelector {
    fn from(arg: InlineSelectorArg) -> Self {
        match arg {
            InlineSelectorArg::Fixed => Self::Fixed,
            InlineSelectorArg::ContentHash => Self::ContentHash,
        }
    }
}

//! extract-css CLI library
//!
//! Argument parsing, option mapping and output rendering for the
//! `extract-css` binary.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;

pub use commands::{Cli, InlineSelectorArg, InlineStylesArg, OriginsArg};
pub use config::{init_logging, Verbosity};
pub use error::{CliError, CliResult};

use extract_css::{extract_css_with, Aggregated, BrowserOverride, DriverLauncher};
use std::path::Path;
use std::sync::Arc;

/// Run an extraction for `cli` and render the result
///
/// Flattened CSS is returned verbatim; provenance entries are rendered as
/// pretty-printed JSON. A `--browser-override` is checked before anything
/// is launched and drives `launcher` with its own binary and arguments.
pub async fn extract(cli: &Cli, launcher: Arc<dyn DriverLauncher>) -> CliResult<String> {
    let mut options = cli.extract_options();
    if let Some(ref raw) = cli.browser_override {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let browser_override = BrowserOverride::from_json(&value, Some(Arc::clone(&launcher)))?;
        options = options.with_browser_override(browser_override);
    }
    tracing::debug!(url = %cli.url, "starting extraction");
    let result = extract_css_with(launcher.as_ref(), &cli.url, &options).await?;
    render(&result)
}

/// Render an extraction result for output
pub fn render(result: &Aggregated) -> CliResult<String> {
    match result {
        Aggregated::Text(text) => Ok(text.clone()),
        Aggregated::Entries(entries) => Ok(serde_json::to_string_pretty(entries)?),
    }
}

/// Write rendered output to `path`, or to stdout when `path` is `None`
pub fn write_output(rendered: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(path) => {
            std::fs::write(path, rendered)?;
            tracing::info!(bytes = rendered.len(), path = %path.display(), "wrote output");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

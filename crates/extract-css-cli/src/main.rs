//! extract-css: print all CSS used by a web page
//!
//! ## Usage
//!
//! ```bash
//! extract-css https://example.com                     # Flattened CSS
//! extract-css https://example.com --origins include   # Provenance as JSON
//! extract-css https://example.com -o site.css         # Write to a file
//! ```

use clap::Parser;
use console::style;
use extract_css_cli::{init_logging, write_output, Cli, CliResult, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", style("Error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    init_logging(verbosity);

    let rt = tokio::runtime::Runtime::new()?;
    let rendered = rt.block_on(extract(&cli))?;
    write_output(&rendered, cli.output.as_deref())
}

#[cfg(feature = "browser")]
async fn extract(cli: &Cli) -> CliResult<String> {
    extract_css_cli::extract(cli, std::sync::Arc::new(extract_css::ChromiumLauncher)).await
}

#[cfg(not(feature = "browser"))]
async fn extract(_cli: &Cli) -> CliResult<String> {
    Err(extract_css_cli::CliError::invalid_argument(
        "browser support not enabled. Rebuild with --features browser",
    ))
}

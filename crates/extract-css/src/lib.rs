//! extract-css: all the CSS a rendered page uses, with provenance
//!
//! Loads a page in a headless browser and gathers its CSS from three
//! independent channels, then merges them into one ordered, deduplicated
//! list of provenance entries or into flattened text.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐ launch ┌──────────────┐
//! │ DriverLauncher ├───────►│ PageDriver   │
//! └────────────────┘        └──────┬───────┘
//!                                  │ navigate, then concurrently:
//!        ┌───────────────────────┼────────────────────────┐
//!        ▼                       ▼                        ▼
//! ┌──────────────┐      ┌────────────────┐      ┌──────────────────┐
//! │ stylesheet   │      │ coverage       │      │ inline style     │
//! │ tree walker  │      │ filter         │      │ synthesizer      │
//! └──────┬───────┘      └───────┬────────┘      └────────┬─────────┘
//!        └──────────────────────┼────────────────────────┘
//!                               ▼
//!                        ┌─────────────┐
//!                        │ aggregate   │──► Text | Entries
//!                        └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "browser")]
//! # async fn run() -> extract_css::ExtractResult<()> {
//! use extract_css::{extract_css, ExtractOptions};
//!
//! let css = extract_css("https://example.com", &ExtractOptions::default()).await?;
//! println!("{}", css.to_text());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod aggregate;
#[cfg(feature = "browser")]
mod browser;
mod browser_override;
mod coverage;
mod driver;
mod extract;
mod inline;
mod options;
mod provenance;
mod result;
mod stylesheet;

pub use aggregate::{
    aggregate, flatten, merge_channels, AggregateOptions, Aggregated, ChannelOutputs,
    InlineStylesMode, OriginsMode,
};
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumLauncher};
pub use browser_override::BrowserOverride;
pub use coverage::{filter_coverage, CoverageRecord};
pub use driver::{
    DriverLauncher, LaunchConfig, MockChannel, MockDriver, MockLauncher, NavigateOptions,
    NavigationResponse, PageDriver, WaitUntil,
};
#[cfg(feature = "browser")]
pub use extract::extract_css;
pub use extract::extract_css_with;
pub use inline::{
    synthesize_inline_styles, InlineSelector, CONTENT_HASH_HEX_DIGITS, INLINE_STYLE_SELECTOR,
};
pub use options::ExtractOptions;
pub use provenance::{Origin, ProvenanceEntry};
pub use result::{ExtractError, ExtractResult};
pub use stylesheet::{
    collect_stylesheet_tree, OwnerKind, RuleRecord, StylesheetNode, TreeEntry, MAX_IMPORT_DEPTH,
};

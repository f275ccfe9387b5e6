//! Inline style synthesis.
//!
//! Turns `style="..."` attribute values into standalone rule blocks so they
//! can sit next to stylesheet CSS:
//!
//! ```text
//! <h1 style="color: red; font-size: 10px;">
//!
//! [x-extract-css-inline-style] { color: red; font-size: 10px; }
//! ```

use crate::provenance::{Origin, ProvenanceEntry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Selector shared by every inline rule under [`InlineSelector::Fixed`]
pub const INLINE_STYLE_SELECTOR: &str = "[x-extract-css-inline-style]";

/// Number of hex digits used by [`InlineSelector::ContentHash`]
pub const CONTENT_HASH_HEX_DIGITS: usize = 8;

/// Strategy for the selector wrapped around inline declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InlineSelector {
    /// Every inline rule gets [`INLINE_STYLE_SELECTOR`]
    #[default]
    Fixed,
    /// `[x-extract-css-inline-style-XXXXXXXX]`, where the suffix is the first
    /// eight lowercase hex digits of SHA-256 over the declarations with
    /// ASCII whitespace runs collapsed to a single space and both ends
    /// trimmed. Identical declarations share a selector. The suffix is
    /// stable across releases.
    ContentHash,
}

impl InlineSelector {
    /// Selector for one inline declaration block
    #[must_use]
    pub fn selector_for(self, declarations: &str) -> String {
        match self {
            Self::Fixed => INLINE_STYLE_SELECTOR.to_string(),
            Self::ContentHash => {
                let digest = Sha256::digest(normalize_declarations(declarations).as_bytes());
                let hex: String = digest
                    .iter()
                    .map(|byte| format!("{byte:02x}"))
                    .collect::<String>();
                format!(
                    "[x-extract-css-inline-style-{}]",
                    &hex[..CONTENT_HASH_HEX_DIGITS]
                )
            }
        }
    }
}

/// Wrap every non-blank `style` attribute value in a rule block
///
/// Duplicates are kept: each value stands for a distinct element and the
/// output order matches element discovery order.
#[must_use]
pub fn synthesize_inline_styles(
    attributes: &[String],
    document_url: &str,
    selector: InlineSelector,
) -> Vec<ProvenanceEntry> {
    let entries: Vec<ProvenanceEntry> = attributes
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|declarations| {
            ProvenanceEntry::new(
                Origin::Inline,
                document_url,
                format!("{} {{ {declarations} }}", selector.selector_for(declarations)),
            )
        })
        .collect();
    tracing::debug!(
        attributes = attributes.len(),
        rules = entries.len(),
        "synthesized inline style rules"
    );
    entries
}

fn normalize_declarations(declarations: &str) -> String {
    declarations
        .split_ascii_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

//! Provenance entries: a fragment of CSS plus where it was discovered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a piece of CSS was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// A `<style>` element (or a document-level constructed stylesheet)
    Style,
    /// A `<link rel="stylesheet">` loaded file
    Link,
    /// A file pulled in through `@import`
    Import,
    /// An element's `style` attribute
    Inline,
    /// An external resource reported by the coverage channel, which cannot
    /// tell a linked file from an imported one
    LinkOrImport,
}

impl Origin {
    /// Whether this origin names an external resource (its location is the
    /// resource URL rather than the document URL)
    #[must_use]
    pub const fn is_external(self) -> bool {
        matches!(self, Self::Link | Self::Import | Self::LinkOrImport)
    }

    /// Whether this origin belongs to the linked-resource class that is
    /// reduced to one representative per URL
    #[must_use]
    pub const fn is_linked_resource(self) -> bool {
        matches!(self, Self::Link | Self::LinkOrImport)
    }

    /// Wire name of this origin
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Link => "link",
            Self::Import => "import",
            Self::Inline => "inline",
            Self::LinkOrImport => "link-or-import",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record of discovered CSS
///
/// `text` is `None` for marker entries, which only record that a resource or
/// an `@import` was encountered at this position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEntry {
    /// How the CSS was discovered
    pub origin: Origin,
    /// Document URL for `style`/`inline`, resource URL otherwise
    pub source_location: String,
    /// Literal CSS text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ProvenanceEntry {
    /// Create an entry carrying CSS text
    #[must_use]
    pub fn new(origin: Origin, source_location: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin,
            source_location: source_location.into(),
            text: Some(text.into()),
        }
    }

    /// Create a marker entry without text
    #[must_use]
    pub fn marker(origin: Origin, source_location: impl Into<String>) -> Self {
        Self {
            origin,
            source_location: source_location.into(),
            text: None,
        }
    }

    /// Whether this entry carries non-empty CSS text
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether this is a marker entry
    #[must_use]
    pub fn is_marker(&self) -> bool {
        self.text.is_none()
    }
}

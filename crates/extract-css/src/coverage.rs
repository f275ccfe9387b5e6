//! Coverage channel filtering.
//!
//! The coverage channel reports the CSS the browser actually exercised,
//! keyed by resource URL. It is the reliable source of text for linked and
//! imported files, but it also reports `<style>` content under the document
//! URL, which the stylesheet tree already covers. Records keyed by the
//! document URL are dropped.
//!
//! This is an approximation: a separate resource that genuinely lives at the
//! document URL cannot be told apart from inline `<style>` content and is
//! dropped as well.

use crate::provenance::{Origin, ProvenanceEntry};
use serde::{Deserialize, Serialize};

/// CSS text reported by the coverage channel for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRecord {
    /// URL of the resource the text belongs to
    pub resource_url: String,
    /// CSS text
    pub text: String,
}

impl CoverageRecord {
    /// Create a coverage record
    #[must_use]
    pub fn new(resource_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            resource_url: resource_url.into(),
            text: text.into(),
        }
    }
}

/// Drop records belonging to the document itself and tag the rest as
/// external resources
#[must_use]
pub fn filter_coverage(records: Vec<CoverageRecord>, document_url: &str) -> Vec<ProvenanceEntry> {
    let document = strip_fragment(document_url);
    let total = records.len();
    let entries: Vec<ProvenanceEntry> = records
        .into_iter()
        .filter(|record| strip_fragment(&record.resource_url) != document)
        .map(|record| ProvenanceEntry {
            origin: Origin::LinkOrImport,
            source_location: record.resource_url,
            text: Some(record.text),
        })
        .collect();
    tracing::debug!(
        total,
        kept = entries.len(),
        "filtered coverage records against document URL"
    );
    entries
}

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(base, _)| base)
}

//! Aggregation of the three discovery channels.
//!
//! A pure, synchronous merge over already-materialized channel outputs:
//!
//! ```text
//! coverage ──┐
//! tree ──────┼──► concat ──► collapse cumulative <style> entries
//! inline ────┘                 ──► one representative per linked URL
//!                              ──► at most one text per external URL
//!                              ──► Text | Entries
//! ```

use crate::provenance::{Origin, ProvenanceEntry};
use crate::stylesheet::TreeEntry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Whether to return provenance entries or flattened text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginsMode {
    /// Return the structured entry list
    Include,
    /// Return flattened CSS text
    #[default]
    Exclude,
}

/// Whether to fold inline `style` attributes into the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineStylesMode {
    /// Include synthesized inline rules
    #[default]
    Include,
    /// Leave inline styles out entirely
    Exclude,
}

/// Output shaping options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateOptions {
    /// Structured or flattened output
    pub origins: OriginsMode,
    /// Inline style handling
    pub inline_styles: InlineStylesMode,
}

impl AggregateOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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
}

/// Materialized outputs of the three leaf collectors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOutputs {
    /// Filtered coverage entries
    pub coverage: Vec<ProvenanceEntry>,
    /// Stylesheet tree entries
    pub tree: Vec<TreeEntry>,
    /// Synthesized inline entries
    pub inline: Vec<ProvenanceEntry>,
}

/// Aggregated CSS, either flattened or with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Aggregated {
    /// Flattened CSS text
    Text(String),
    /// Ordered provenance entries
    Entries(Vec<ProvenanceEntry>),
}

impl Aggregated {
    /// Flattened text regardless of mode
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Entries(entries) => flatten(entries),
        }
    }

    /// Entries, if this is structured output
    #[must_use]
    pub fn entries(&self) -> Option<&[ProvenanceEntry]> {
        match self {
            Self::Text(_) => None,
            Self::Entries(entries) => Some(entries),
        }
    }
}

/// Merge the channels and shape the result according to `options`
#[must_use]
pub fn aggregate(channels: ChannelOutputs, options: &AggregateOptions) -> Aggregated {
    let entries = merge_channels(channels, options.inline_styles);
    match options.origins {
        OriginsMode::Include => Aggregated::Entries(entries),
        OriginsMode::Exclude => Aggregated::Text(flatten(&entries)),
    }
}

/// Join the text of every entry that has one, in order
#[must_use]
pub fn flatten(entries: &[ProvenanceEntry]) -> String {
    entries
        .iter()
        .filter_map(|entry| entry.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merge channel outputs into one ordered, deduplicated entry list
///
/// Coverage entries come first, then the stylesheet tree, then inline
/// rules. Intermediate cumulative `style` entries are collapsed to the last
/// one of each run, so a `<style>` sheet split by `@import` keeps its rules
/// on either side of the imported text. Linked resources keep one representative per URL,
/// preferring one that carries text, and no external URL carries text twice.
#[must_use]
pub fn merge_channels(channels: ChannelOutputs, inline_styles: InlineStylesMode) -> Vec<ProvenanceEntry> {
    let ChannelOutputs {
        coverage,
        tree,
        inline,
    } = channels;

    let mut merged: Vec<ProvenanceEntry> = coverage;
    merged.extend(collapse_cumulative(tree));
    if inline_styles == InlineStylesMode::Include {
        merged.extend(inline);
    }
    for entry in &mut merged {
        if entry.text.as_deref().is_some_and(str::is_empty) {
            entry.text = None;
        }
    }

    // URL -> index of its representative among linked-resource entries
    let mut representatives: HashMap<String, usize> = HashMap::new();
    for (index, entry) in merged.iter().enumerate() {
        if !entry.origin.is_linked_resource() {
            continue;
        }
        let replace = match representatives.get(&entry.source_location).copied() {
            None => true,
            Some(current) => !merged[current].has_text() && entry.has_text(),
        };
        if replace {
            representatives.insert(entry.source_location.clone(), index);
        }
    }

    let total = merged.len();
    let mut with_text: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(total);
    for (index, mut entry) in merged.into_iter().enumerate() {
        if entry.origin.is_linked_resource() {
            if representatives.get(&entry.source_location) != Some(&index) {
                continue;
            }
            if entry.has_text() && !with_text.insert(entry.source_location.clone()) {
                entry.text = None;
            }
        } else if entry.origin.is_external()
            && entry.has_text()
            && !with_text.insert(entry.source_location.clone())
        {
            continue;
        }
        result.push(entry);
    }

    tracing::debug!(input = total, output = result.len(), "merged CSS channels");
    result
}

fn collapse_cumulative(tree: Vec<TreeEntry>) -> impl Iterator<Item = ProvenanceEntry> {
    let mut last: HashMap<usize, usize> = HashMap::new();
    for (index, item) in tree.iter().enumerate() {
        last.insert(item.segment, index);
    }
    tree.into_iter()
        .enumerate()
        .filter(move |(index, item)| last.get(&item.segment) == Some(index))
        .map(|(_, item)| item.entry)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coverage::{filter_coverage, CoverageRecord};
    use crate::inline::{synthesize_inline_styles, InlineSelector};
    use crate::stylesheet::{collect_stylesheet_tree, RuleRecord, StylesheetNode};

    const DOC: &str = "http://localhost/page.html";

    fn channels(
        sheets: &[StylesheetNode],
        coverage: Vec<CoverageRecord>,
        inline: &[&str],
    ) -> ChannelOutputs {
        let inline: Vec<String> = inline.iter().map(|s| (*s).to_string()).collect();
        ChannelOutputs {
            coverage: filter_coverage(coverage, DOC),
            tree: collect_stylesheet_tree(sheets, DOC),
            inline: synthesize_inline_styles(&inline, DOC, InlineSelector::Fixed),
        }
    }

    fn text_of(channels: ChannelOutputs) -> String {
        aggregate(channels, &AggregateOptions::default()).to_text()
    }

    mod option_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let options = AggregateOptions::default();
            assert_eq!(options.origins, OriginsMode::Exclude);
            assert_eq!(options.inline_styles, InlineStylesMode::Include);
        }

        #[test]
        fn test_deserialize_partial_options() {
            let options: AggregateOptions = serde_json::from_str(r#"{"origins":"include"}"#).unwrap();
            assert_eq!(options.origins, OriginsMode::Include);
            assert_eq!(options.inline_styles, InlineStylesMode::Include);
        }

        #[test]
        fn test_builder() {
            let options = AggregateOptions::new()
                .with_origins(OriginsMode::Include)
                .with_inline_styles(InlineStylesMode::Exclude);
            assert_eq!(options.origins, OriginsMode::Include);
            assert_eq!(options.inline_styles, InlineStylesMode::Exclude);
        }
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_all_channels_empty() {
            assert_eq!(text_of(ChannelOutputs::default()), "");
            let structured = aggregate(
                ChannelOutputs::default(),
                &AggregateOptions::new().with_origins(OriginsMode::Include),
            );
            assert_eq!(structured, Aggregated::Entries(vec![]));
        }

        #[test]
        fn test_link_text_comes_from_coverage() {
            let out = channels(
                &[StylesheetNode::link("a.css", vec![])],
                vec![CoverageRecord::new("a.css", ".x{color:red}")],
                &[],
            );
            assert_eq!(text_of(out), ".x{color:red}");
        }

        #[test]
        fn test_coverage_wins_over_tree_text() {
            let out = channels(
                &[StylesheetNode::link("a.css", vec![RuleRecord::plain(".x { color: red; }")])],
                vec![CoverageRecord::new("a.css", ".x{color:red}")],
                &[],
            );
            let entries = merge_channels(out, InlineStylesMode::Include);
            assert_eq!(entries, vec![ProvenanceEntry::new(Origin::LinkOrImport, "a.css", ".x{color:red}")]);
        }

        #[test]
        fn test_tree_text_used_without_coverage() {
            let out = channels(
                &[StylesheetNode::link("a.css", vec![RuleRecord::plain(".x {}")])],
                vec![],
                &[],
            );
            let entries = merge_channels(out, InlineStylesMode::Include);
            assert_eq!(entries, vec![ProvenanceEntry::new(Origin::Link, "a.css", ".x {}")]);
        }

        #[test]
        fn test_marker_kept_when_no_text_anywhere() {
            let out = channels(&[StylesheetNode::link("a.css", vec![])], vec![], &[]);
            let entries = merge_channels(out, InlineStylesMode::Include);
            assert_eq!(entries, vec![ProvenanceEntry::marker(Origin::Link, "a.css")]);
        }

        #[test]
        fn test_style_reported_once() {
            let out = channels(
                &[StylesheetNode::style(
                    DOC,
                    vec![RuleRecord::plain(".fixture { color: red; }"), RuleRecord::plain(".b {}")],
                )],
                vec![CoverageRecord::new(DOC, ".fixture { color: red; }\n.b {}")],
                &[],
            );
            let text = text_of(out);
            assert_eq!(text.matches(".fixture").count(), 1);
            assert_eq!(text, ".fixture { color: red; }\n.b {}");
        }

        #[test]
        fn test_channel_priority_order() {
            let out = channels(
                &[StylesheetNode::style(DOC, vec![RuleRecord::plain(".style {}")])],
                vec![CoverageRecord::new("http://localhost/a.css", ".link {}")],
                &["color: red;"],
            );
            assert_eq!(
                text_of(out),
                ".link {}\n.style {}\n[x-extract-css-inline-style] { color: red; }"
            );
        }

        #[test]
        fn test_import_text_follows_marker() {
            let b = StylesheetNode::detached("b.css", vec![RuleRecord::plain(".y{}")]);
            let out = channels(
                &[StylesheetNode::style(DOC, vec![RuleRecord::import("b.css", b)])],
                vec![],
                &[],
            );
            let entries = merge_channels(out, InlineStylesMode::Include);
            let marker = entries
                .iter()
                .position(|e| e.origin == Origin::Import && e.is_marker())
                .unwrap();
            assert_eq!(entries[marker + 1].text.as_deref(), Some(".y{}"));
            assert_eq!(flatten(&entries), "@import url(\"b.css\");\n.y{}");
        }

        #[test]
        fn test_style_import_precedes_later_rules() {
            let b = StylesheetNode::detached("b.css", vec![RuleRecord::plain(".y{}")]);
            let out = channels(
                &[StylesheetNode::style(
                    DOC,
                    vec![RuleRecord::import("b.css", b), RuleRecord::plain(".fixture { color: red; }")],
                )],
                vec![],
                &[],
            );
            assert_eq!(text_of(out), "@import url(\"b.css\");\n.y{}\n.fixture { color: red; }");
        }

        #[test]
        fn test_rules_around_style_import_keep_order() {
            let b = StylesheetNode::detached("b.css", vec![RuleRecord::plain(".y{}")]);
            let out = channels(
                &[StylesheetNode::style(
                    DOC,
                    vec![
                        RuleRecord::plain(".before{}"),
                        RuleRecord::import("b.css", b),
                        RuleRecord::plain(".after{}"),
                    ],
                )],
                vec![],
                &[],
            );
            assert_eq!(text_of(out), ".before{}\n@import url(\"b.css\");\n.y{}\n.after{}");
        }

        #[test]
        fn test_link_import_precedes_later_rules() {
            let b = StylesheetNode::detached("b.css", vec![RuleRecord::plain(".y{}")]);
            let out = channels(
                &[StylesheetNode::link("a.css", vec![RuleRecord::import("b.css", b), RuleRecord::plain(".a{}")])],
                vec![],
                &[],
            );
            let merged = merge_channels(out, InlineStylesMode::Include);
            assert_eq!(flatten(&merged), "@import url(\"b.css\");\n.y{}\n.a{}");
            let a_texts = merged
                .iter()
                .filter(|e| e.source_location == "a.css" && e.has_text())
                .count();
            assert_eq!(a_texts, 1);
        }

        #[test]
        fn test_imported_text_deduplicated_against_coverage() {
            let b = StylesheetNode::detached("b.css", vec![RuleRecord::plain(".y{}")]);
            let out = channels(
                &[StylesheetNode::link("a.css", vec![RuleRecord::import("b.css", b)])],
                vec![
                    CoverageRecord::new("a.css", "@import url(\"b.css\");"),
                    CoverageRecord::new("b.css", ".y{}"),
                ],
                &[],
            );
            let entries = merge_channels(out, InlineStylesMode::Include);
            let b_texts = entries
                .iter()
                .filter(|e| e.source_location == "b.css" && e.has_text())
                .count();
            assert_eq!(b_texts, 1);
            // the import marker still records where b.css was pulled in
            assert!(entries
                .iter()
                .any(|e| e.origin == Origin::Import && e.source_location == "b.css" && e.is_marker()));
        }

        #[test]
        fn test_empty_text_becomes_marker() {
            let merged = merge_channels(
                ChannelOutputs {
                    coverage: vec![ProvenanceEntry::new(Origin::LinkOrImport, "a.css", "")],
                    ..ChannelOutputs::default()
                },
                InlineStylesMode::Include,
            );
            assert_eq!(merged, vec![ProvenanceEntry::marker(Origin::LinkOrImport, "a.css")]);
        }
    }

    mod inline_mode_tests {
        use super::*;

        #[test]
        fn test_inline_excluded() {
            let out = channels(&[], vec![], &["color: red; font-size: 12px;", "color: blue"]);
            let result = aggregate(
                out,
                &AggregateOptions::new().with_inline_styles(InlineStylesMode::Exclude),
            );
            assert_eq!(result, Aggregated::Text(String::new()));
        }

        #[test]
        fn test_inline_duplicates_survive_merge() {
            let out = channels(&[], vec![], &["color: red;", "color: red;"]);
            let entries = merge_channels(out, InlineStylesMode::Include);
            assert_eq!(entries.len(), 2);
        }
    }

    mod structured_output_tests {
        use super::*;

        #[test]
        fn test_structured_flattens_to_same_text() {
            let b = StylesheetNode::detached("b.css", vec![RuleRecord::plain(".y{}")]);
            let make = || {
                channels(
                    &[
                        StylesheetNode::link("a.css", vec![RuleRecord::import("b.css", b.clone())]),
                        StylesheetNode::style(DOC, vec![RuleRecord::plain(".s {}"), RuleRecord::plain(".t {}")]),
                    ],
                    vec![CoverageRecord::new("a.css", ".a {}")],
                    &["color: red;"],
                )
            };
            let text = aggregate(make(), &AggregateOptions::default());
            let structured = aggregate(make(), &AggregateOptions::new().with_origins(OriginsMode::Include));
            assert_eq!(text, Aggregated::Text(flatten(structured.entries().unwrap())));
        }

        #[test]
        fn test_serialize_untagged() {
            let text = serde_json::to_value(Aggregated::Text(".a{}".to_string())).unwrap();
            assert_eq!(text, serde_json::json!(".a{}"));
            let entries = serde_json::to_value(Aggregated::Entries(vec![ProvenanceEntry::marker(
                Origin::Import,
                "b.css",
            )]))
            .unwrap();
            assert_eq!(
                entries,
                serde_json::json!([{"origin": "import", "sourceLocation": "b.css"}])
            );
        }
    }
}

//! Stylesheet tree collection.
//!
//! Flattens the document's stylesheets, including nested `@import` sheets,
//! into provenance entries in document order. Rules arrive as an explicit
//! tagged variant from the page driver, so no rule type inspection happens
//! here.
//!
//! Document sheets are split into runs at each `@import`; every run is
//! reported cumulatively and the imported sheet is spliced in between runs.
//! External sheets (linked or imported) carry a single text entry per URL,
//! with their own nested imports expanded in place.
//!
//! ```text
//! <style>  @import "b.css"; .a {}        style   "@import ..."        run 0
//!                                        import  b.css (marker)
//!                                        import  b.css ".b {}"
//!                                        style   ".a {}"              run 1
//! ```

use crate::provenance::{Origin, ProvenanceEntry};
use serde::{Deserialize, Serialize};

/// Maximum `@import` nesting followed before traversal stops descending
pub const MAX_IMPORT_DEPTH: usize = 16;

/// Kind of element that owns a stylesheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// `<style>` element
    Style,
    /// `<link rel="stylesheet">` element
    Link,
}

/// A stylesheet as reported by the page driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylesheetNode {
    /// Owning element kind; `None` for sheets without an owner element
    /// (constructed sheets, imported sheets)
    #[serde(default)]
    pub owner_kind: Option<OwnerKind>,
    /// Resolved href; the document URL for `<style>` sheets
    #[serde(default)]
    pub href: Option<String>,
    /// Rules in source order
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
}

impl StylesheetNode {
    /// Sheet owned by a `<style>` element
    #[must_use]
    pub fn style(href: impl Into<String>, rules: Vec<RuleRecord>) -> Self {
        Self {
            owner_kind: Some(OwnerKind::Style),
            href: Some(href.into()),
            rules,
        }
    }

    /// Sheet owned by a `<link>` element
    #[must_use]
    pub fn link(href: impl Into<String>, rules: Vec<RuleRecord>) -> Self {
        Self {
            owner_kind: Some(OwnerKind::Link),
            href: Some(href.into()),
            rules,
        }
    }

    /// Sheet without an owner element
    #[must_use]
    pub fn detached(href: impl Into<String>, rules: Vec<RuleRecord>) -> Self {
        Self {
            owner_kind: None,
            href: Some(href.into()),
            rules,
        }
    }
}

/// One rule of a stylesheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleRecord {
    /// Any rule other than `@import`, as its serialized CSS text
    Plain {
        /// Rule text
        text: String,
    },
    /// An `@import` rule
    Import {
        /// Resolved URL of the imported sheet
        href: String,
        /// The `@import ...` statement itself
        #[serde(default)]
        text: Option<String>,
        /// The imported sheet, if the browser loaded it
        #[serde(default)]
        nested: Option<Box<StylesheetNode>>,
    },
}

impl RuleRecord {
    /// Plain rule
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    /// `@import` rule with a loaded nested sheet
    #[must_use]
    pub fn import(href: impl Into<String>, nested: StylesheetNode) -> Self {
        let href = href.into();
        Self::Import {
            text: Some(format!("@import url(\"{href}\");")),
            href,
            nested: Some(Box::new(nested)),
        }
    }
}

/// A collected entry tagged with the run that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Cumulative run the entry belongs to. Within a run each entry
    /// supersedes the previous one; entries that are not cumulative get a
    /// run of their own.
    pub segment: usize,
    /// The entry
    pub entry: ProvenanceEntry,
}

/// Flatten a stylesheet tree into ordered entries, depth-first
#[must_use]
pub fn collect_stylesheet_tree(sheets: &[StylesheetNode], document_url: &str) -> Vec<TreeEntry> {
    let mut walker = TreeWalker {
        document_url,
        entries: Vec::new(),
        next_segment: 0,
        import_chain: Vec::new(),
    };
    for sheet in sheets {
        match sheet.owner_kind {
            Some(OwnerKind::Link) => {
                let href = sheet.href.as_deref().unwrap_or(document_url);
                walker.visit_external(Origin::Link, href, Some(sheet), 0);
            }
            Some(OwnerKind::Style) | None => walker.visit_document(sheet),
        }
    }
    tracing::debug!(
        sheets = sheets.len(),
        entries = walker.entries.len(),
        "collected stylesheet tree"
    );
    walker.entries
}

struct TreeWalker<'a> {
    document_url: &'a str,
    entries: Vec<TreeEntry>,
    next_segment: usize,
    import_chain: Vec<&'a str>,
}

impl<'a> TreeWalker<'a> {
    /// `<style>` and ownerless root sheets: one cumulative entry per rule
    /// boundary, restarting after every `@import`.
    fn visit_document(&mut self, node: &'a StylesheetNode) {
        let mut segment = self.new_segment();
        let mut texts: Vec<&str> = Vec::new();
        for rule in &node.rules {
            match rule {
                RuleRecord::Plain { text } => {
                    texts.push(text);
                    self.push_run(segment, &texts);
                }
                RuleRecord::Import { href, text, nested } => {
                    if let Some(statement) = text {
                        texts.push(statement);
                        self.push_run(segment, &texts);
                    }
                    self.visit_external(Origin::Import, href, nested.as_deref(), 1);
                    segment = self.new_segment();
                    texts.clear();
                }
            }
        }
    }

    fn push_run(&mut self, segment: usize, texts: &[&str]) {
        let entry = ProvenanceEntry::new(Origin::Style, self.document_url, texts.join("\n"));
        self.entries.push(TreeEntry { segment, entry });
    }

    /// Linked or imported sheet: a marker, markers for its nested imports,
    /// then one entry with the sheet's text and nested imports expanded.
    fn visit_external(
        &mut self,
        origin: Origin,
        href: &'a str,
        node: Option<&'a StylesheetNode>,
        depth: usize,
    ) {
        self.push(ProvenanceEntry::marker(origin, href));
        let Some(node) = node else {
            return;
        };
        if !self.may_descend(href, depth) {
            return;
        }
        self.import_chain.push(href);
        let text = self.expand(node, depth);
        self.import_chain.pop();
        if !text.is_empty() {
            self.push(ProvenanceEntry::new(origin, href, text));
        }
    }

    fn expand(&mut self, node: &'a StylesheetNode, depth: usize) -> String {
        let mut parts: Vec<String> = Vec::new();
        for rule in &node.rules {
            match rule {
                RuleRecord::Plain { text } => parts.push(text.clone()),
                RuleRecord::Import { href, text, nested } => {
                    if let Some(statement) = text {
                        parts.push(statement.clone());
                    }
                    self.push(ProvenanceEntry::marker(Origin::Import, href));
                    let Some(nested) = nested.as_deref() else {
                        continue;
                    };
                    if !self.may_descend(href, depth + 1) {
                        continue;
                    }
                    self.import_chain.push(href);
                    let inner = self.expand(nested, depth + 1);
                    self.import_chain.pop();
                    if !inner.is_empty() {
                        parts.push(inner);
                    }
                }
            }
        }
        parts.join("\n")
    }

    fn may_descend(&self, href: &str, depth: usize) -> bool {
        if depth > MAX_IMPORT_DEPTH {
            tracing::warn!(href, depth, "@import nesting too deep, not descending");
            return false;
        }
        if self.import_chain.iter().any(|seen| *seen == href) {
            tracing::warn!(href, "@import cycle detected, not descending");
            return false;
        }
        true
    }

    fn push(&mut self, entry: ProvenanceEntry) {
        let segment = self.new_segment();
        self.entries.push(TreeEntry { segment, entry });
    }

    fn new_segment(&mut self) -> usize {
        let segment = self.next_segment;
        self.next_segment += 1;
        segment
    }
}

// src/html/links.rs
// =============================================================================
// This module extracts link candidates from an HTML page.
//
// We use the `scraper` crate which:
// - Parses HTML into a tree (error tolerant, like a browser)
// - Lets us walk every node of that tree in document order
//
// For every element we look at its attributes:
// - (link, href), (a, href), (script, src), (img, src) become candidates
//   tagged with the element name, so the crawler knows which ones are pages
// - style="..." attributes and <style> blocks are scanned for url(...)
//
// Resolving and filtering happen later, in the crawler. This module only
// reports what the page references.
// =============================================================================

use super::css::extract_css_urls;
use scraper::Html;
use tracing::debug;

// The (tag, attribute) pairs whose values the mirror follows
const FOLLOWED_ATTRIBUTES: &[(&str, &str)] = &[
    ("link", "href"),
    ("a", "href"),
    ("script", "src"),
    ("img", "src"),
];

// Something on a page that might need downloading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A href/src value, with the tag it was found on
    Attribute { tag: String, link: String },
    /// A url(...) from inline CSS; always an asset, never a page
    Style { link: String },
}

impl Candidate {
    pub fn link(&self) -> &str {
        match self {
            Candidate::Attribute { link, .. } => link,
            Candidate::Style { link } => link,
        }
    }

    /// Anchors are the only candidates the crawler recurses into
    pub fn is_anchor(&self) -> bool {
        matches!(self, Candidate::Attribute { tag, .. } if tag == "a")
    }
}

pub fn is_followed_attribute(tag: &str, attribute: &str) -> bool {
    FOLLOWED_ATTRIBUTES
        .iter()
        .any(|&(t, a)| t == tag && a == attribute)
}

// Walks the whole document (depth-first, pre-order) and collects candidates
//
// Parameters:
//   html: the page body
//
// Returns: every candidate in document order. Duplicates are kept; the
// crawler's visited sets take care of them.
pub fn extract_candidates(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        debug!(errors = document.errors.len(), "recovered from malformed HTML");
    }

    let mut candidates = Vec::new();

    for node in document.tree.root().descendants() {
        let element = match node.value().as_element() {
            Some(element) => element,
            None => continue,
        };
        let tag = element.name();

        for (key, value) in element.attrs() {
            if is_followed_attribute(tag, key) && !value.is_empty() {
                candidates.push(Candidate::Attribute {
                    tag: tag.to_string(),
                    link: value.to_string(),
                });
            }
            if key == "style" {
                candidates.extend(
                    extract_css_urls(value)
                        .into_iter()
                        .map(|link| Candidate::Style { link }),
                );
            }
        }

        if tag == "style" {
            if let Some(text) = node.first_child().and_then(|child| child.value().as_text()) {
                candidates.extend(
                    extract_css_urls(text)
                        .into_iter()
                        .map(|link| Candidate::Style { link }),
                );
            }
        }
    }

    candidates
}

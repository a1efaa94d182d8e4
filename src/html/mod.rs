// src/html/mod.rs
// =============================================================================
// HTML and CSS handling for the mirror.
//
// Submodules:
// - links: walks a fetched page and reports which URLs it references
// - css: finds and rewrites url(...) references in CSS text
// - rewrite: turns absolute links in a saved page into local paths
// =============================================================================

mod css;
mod links;
mod rewrite;

pub use links::{extract_candidates, Candidate};
pub use rewrite::convert_links;

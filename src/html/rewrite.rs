// src/html/rewrite.rs
// =============================================================================
// Rewrites a saved HTML page so its links work offline (--convert-links).
//
// How it works:
// 1. Read the saved file and parse it into a mutable DOM (markup5ever_rcdom)
// 2. Walk every element:
//    - href / src values go through urls::local_reference
//    - style="..." values and <style> blocks get their url(...) rewritten
// 3. Serialize the tree back to HTML and overwrite the file
//
// scraper's tree is read-only, which is why this module talks to html5ever
// directly. Links that are already local are left alone, so a second pass
// over the same file changes nothing.
// =============================================================================

use super::css::rewrite_css_urls;
use crate::error::{MirrorError, Result};
use crate::urls::local_reference;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::fs;
use std::path::Path;

// Rewrites links in the HTML file at `path`, in place
//
// Returns the number of values that changed. Files that are not .html are
// left untouched (Ok(0)). On any error the file is not modified.
pub fn convert_links(path: &Path) -> Result<usize> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
        return Ok(0);
    }

    let original = fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
    let (rewritten, changed) = rewrite_document(&original)?;

    if changed > 0 && rewritten != original {
        fs::write(path, rewritten).map_err(|e| MirrorError::io(path, e))?;
    }

    Ok(changed)
}

// Rewrites links in an HTML string; returns the new HTML and the number of
// changed values
pub fn rewrite_document(html: &str) -> Result<(String, usize)> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);

    let mut changed = 0;
    rewrite_node(&dom.document, &mut changed);

    let mut bytes = Vec::new();
    let document: SerializableHandle = dom.document.clone().into();
    serialize(&mut bytes, &document, SerializeOpts::default())
        .map_err(|e| MirrorError::Rewrite(e.to_string()))?;
    let html = String::from_utf8(bytes).map_err(|e| MirrorError::Rewrite(e.to_string()))?;

    Ok((html, changed))
}

fn rewrite_node(handle: &Handle, changed: &mut usize) {
    if let NodeData::Element {
        ref name,
        ref attrs,
        ..
    } = handle.data
    {
        for attr in attrs.borrow_mut().iter_mut() {
            let rewritten = match &*attr.name.local {
                "href" | "src" => local_reference(&attr.value),
                "style" => rewrite_css_urls(&attr.value),
                _ => continue,
            };
            if rewritten != *attr.value {
                attr.value = rewritten.into();
                *changed += 1;
            }
        }

        if &*name.local == "style" {
            if let Some(child) = handle.children.borrow().first() {
                if let NodeData::Text { ref contents } = child.data {
                    let mut text = contents.borrow_mut();
                    let rewritten = rewrite_css_urls(&text);
                    if rewritten != **text {
                        *text = rewritten.into();
                        *changed += 1;
                    }
                }
            }
        }
    }

    for child in handle.children.borrow().iter() {
        rewrite_node(child, changed);
    }
}

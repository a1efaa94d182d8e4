// src/html/css.rs
// =============================================================================
// Finds and rewrites url(...) references inside CSS text.
//
// CSS shows up in two places in a page: inline style="..." attributes and
// <style> blocks. We don't parse CSS properly; a regex over url(...) is
// enough to find backgrounds, fonts and other assets.
// =============================================================================

use crate::urls::local_reference;
use regex::{Captures, Regex};
use std::sync::LazyLock;

// url(foo.png), url('foo.png'), url("foo.png")
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(['"]?([^'"()]+)['"]?\)"#).expect("CSS url pattern is valid")
});

// Any url(...) at all, quotes included in the capture
static CSS_URL_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"url\(([^)]+)\)").expect("CSS url pattern is valid"));

// Returns every url(...) target in the CSS, in order of appearance
pub fn extract_css_urls(css: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

// Rewrites every url(...) target to its local mirror path
//
// Output is always the single-quoted form url('...'), so running this
// twice gives the same text as running it once.
pub fn rewrite_css_urls(css: &str) -> String {
    CSS_URL_ANY
        .replace_all(css, |caps: &Captures| {
            let target = caps[1].trim().trim_matches(|c| c == '\'' || c == '"');
            format!("url('{}')", local_reference(target))
        })
        .into_owned()
}

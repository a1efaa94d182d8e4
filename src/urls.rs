// src/urls.rs
// =============================================================================
// URL and path helpers shared by the crawler, the downloader and the
// offline link rewriter.
//
// What lives here:
// - Domain extraction (the mirror never leaves the root's hostname)
// - Resolving relative links against the page they were found on
// - The --reject (file type) and --exclude (path) filters
// - Mapping a URL to the file it is saved as, and to the relative
//   reference the rewriter puts back into saved HTML
//
// Everything in this file is pure: no network, no disk. That keeps it easy
// to test and lets every other module agree on one URL -> path convention.
// =============================================================================

use crate::error::{MirrorError, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Name given to directory-like URLs (`/`, `/docs/`) on disk
pub const INDEX_FILE: &str = "index.html";

// Splits a comma-separated CLI list ("pdf,zip" or "/private,/tmp") into
// trimmed, non-empty entries
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Returns true for absolute http:// and https:// URLs
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

// Extracts the hostname (without port) from a URL
//
// Example: "https://example.com:8080/page" -> "example.com"
pub fn extract_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|_| MirrorError::InvalidUrl(url.to_string()))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| MirrorError::NoDomain(url.to_string()))
}

// Resolves a link (possibly relative) to an absolute URL
//
// Fragments are dropped ("page#top" is the same document as "page"), and
// links that cannot point at a downloadable resource return None.
pub fn resolve_url(base: &str, link: &str) -> Option<String> {
    let link = link.trim();
    let link = match link.find('#') {
        Some(idx) => &link[..idx],
        None => link,
    };

    if link.is_empty()
        || link.starts_with("mailto:")
        || link.starts_with("tel:")
        || link.starts_with("javascript:")
        || link.starts_with("data:")
    {
        return None;
    }

    let base = Url::parse(base).ok()?;
    base.join(link).ok().map(|url| url.to_string())
}

// True when the URL is just "scheme://host" or "scheme://host/"
pub fn is_bare_root(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path() == "/" && parsed.query().is_none(),
        Err(_) => false,
    }
}

// For links that look like a directory, returns the canonical index page
//
// "https://example.com/docs/"           -> "https://example.com/docs/index.html"
// "https://example.com/docs/index.html" -> unchanged
// "https://example.com/docs/page"       -> None
pub fn directory_index(url: &str) -> Option<String> {
    if url.ends_with("/index.html") {
        Some(url.to_string())
    } else if url.ends_with('/') {
        Some(format!("{}{}", url, INDEX_FILE))
    } else {
        None
    }
}

// The part of a URL the filters look at: its path when it parses, the raw
// string otherwise
fn filter_target(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

// Checks a URL against the --reject list of suffixes
//
// Example: reject_types = ["pdf", "zip"] rejects "https://x.com/a/report.pdf"
pub fn is_rejected_type(url: &str, reject_types: &[String]) -> bool {
    if reject_types.is_empty() {
        return false;
    }
    let target = filter_target(url);
    reject_types.iter().any(|ext| target.ends_with(ext.as_str()))
}

// Checks a URL against the --exclude list of path fragments
//
// Only entries starting with '/' are considered, matching what the CLI
// accepts.
pub fn is_rejected_path(url: &str, reject_paths: &[String]) -> bool {
    if reject_paths.is_empty() {
        return false;
    }
    let target = filter_target(url);
    reject_paths
        .iter()
        .filter(|path| path.starts_with('/'))
        .any(|path| target.contains(path.as_str()))
}

// Maps a URL to the file it is saved as under `root`
//
// Parameters:
//   root: the domain directory (e.g. "./example.com")
//   url: the resource being saved
//   is_html: whether the server said the body is text/html
//
// Examples (root = "out/example.com"):
//   https://example.com            -> out/example.com/index.html
//   https://example.com/docs/      -> out/example.com/docs/index.html
//   https://example.com/img/a.png  -> out/example.com/img/a.png
//   https://example.com/about      -> out/example.com/about.html  (if is_html)
pub fn mirror_file_path(root: &Path, url: &Url, is_html: bool) -> PathBuf {
    let path = url.path();
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let file_name = if path.ends_with('/') {
        None
    } else {
        segments.pop()
    };

    let mut out = root.to_path_buf();
    for segment in segments {
        out.push(segment);
    }

    let file_name = match file_name {
        None => INDEX_FILE.to_string(),
        Some(name) if is_html && !name.ends_with(".html") => format!("{}.html", name),
        Some(name) => name.to_string(),
    };
    out.push(file_name);
    out
}

// Converts a link found in saved HTML into a path inside the local mirror
//
// - "http(s)://host/a/b.jpg" and "//host/a/b.jpg" -> "host/a/b.jpg"
// - a bare domain or a trailing slash gets "index.html", the same name the
//   downloader uses
// - root-relative "/x/y" -> "x/y"
// - anything else (relative links, fragments, mailto:, already rewritten
//   links) is returned unchanged, which makes rewriting idempotent
pub fn local_reference(link: &str) -> String {
    let absolute = if link.starts_with("//") {
        Some(format!("http:{}", link))
    } else if is_http_url(link) {
        Some(link.to_string())
    } else {
        None
    };

    if let Some(absolute) = absolute {
        let parsed = match Url::parse(&absolute) {
            Ok(parsed) => parsed,
            Err(_) => return link.to_string(),
        };
        let host = match parsed.host_str() {
            Some(host) => host,
            None => return link.to_string(),
        };
        return join_local(host, parsed.path());
    }

    if let Some(rest) = link.strip_prefix('/') {
        return join_local("", rest);
    }

    link.to_string()
}

fn join_local(host: &str, path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let mut local = if host.is_empty() {
        trimmed.to_string()
    } else if trimmed.is_empty() {
        format!("{}/", host)
    } else {
        format!("{}/{}", host, trimmed)
    };
    if local.is_empty() || local.ends_with('/') {
        local.push_str(INDEX_FILE);
    }
    local
}

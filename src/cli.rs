// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two modes:
// - site-mirror <URL>            download one file
// - site-mirror --mirror <URL>   mirror the whole site
//
// --convert-links, --reject and --exclude only make sense while mirroring,
// so clap refuses them without --mirror. Likewise -O names a single file
// and can't be combined with --mirror.
// =============================================================================

use crate::mirror::MirrorOptions;
use crate::urls::{is_http_url, parse_list};
use clap::Parser;
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version = "0.1.0",
    about = "Download a file, or mirror a whole website for offline viewing",
    long_about = "site-mirror downloads a single URL, or with --mirror walks every page on the \
                  URL's domain and saves pages, images, scripts and stylesheets under a \
                  directory named after the domain."
)]
pub struct Cli {
    /// URL to download or mirror (e.g., https://example.com)
    #[arg(value_parser = parse_http_url)]
    pub url: String,

    /// Mirror the whole site instead of downloading one file
    #[arg(long)]
    pub mirror: bool,

    /// Rewrite links in saved pages so they work offline
    #[arg(long, requires = "mirror")]
    pub convert_links: bool,

    /// Comma-separated file suffixes to skip (e.g., -R=pdf,zip)
    #[arg(short = 'R', long = "reject", value_name = "LIST", requires = "mirror")]
    pub reject: Option<String>,

    /// Comma-separated paths to skip, each starting with '/' (e.g., -X=/private,/tmp)
    #[arg(
        short = 'X',
        long = "exclude",
        value_name = "LIST",
        requires = "mirror",
        value_parser = parse_exclude
    )]
    pub exclude: Option<String>,

    /// Directory to save into
    #[arg(short = 'P', long = "directory-prefix", value_name = "DIR", default_value = ".")]
    pub directory_prefix: PathBuf,

    /// File name for a single download
    #[arg(
        short = 'O',
        long = "output-document",
        value_name = "FILE",
        conflicts_with = "mirror"
    )]
    pub output_document: Option<String>,

    /// How many links may be handled at the same time while mirroring
    #[arg(long, default_value_t = MirrorOptions::DEFAULT_CONCURRENCY, value_parser = parse_positive)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Print the mirror summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

// The URL must be absolute and http(s), in both modes
fn parse_http_url(raw: &str) -> Result<String, String> {
    if !is_http_url(raw) {
        return Err(format!("'{}' is not an http(s) URL", raw));
    }
    Url::parse(raw).map_err(|e| e.to_string())?;
    Ok(raw.to_string())
}

// Every --exclude entry must be an absolute path
fn parse_exclude(raw: &str) -> Result<String, String> {
    match parse_list(raw).iter().find(|path| !path.starts_with('/')) {
        Some(bad) => Err(format!("'{}' must start with '/'", bad)),
        None => Ok(raw.to_string()),
    }
}

fn parse_positive(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("site-mirror").chain(args.iter().copied()))
    }

    #[test]
    fn test_plain_download() {
        let cli = parse(&["https://example.com/file.zip"]).unwrap();
        assert!(!cli.mirror);
        assert_eq!(cli.directory_prefix, PathBuf::from("."));
        assert_eq!(cli.concurrency, MirrorOptions::DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_mirror_with_filters() {
        let cli = parse(&[
            "--mirror",
            "--convert-links",
            "-R=pdf,zip",
            "--exclude=/private,/tmp",
            "https://example.com",
        ])
        .unwrap();
        assert!(cli.mirror);
        assert!(cli.convert_links);
        assert_eq!(cli.reject.as_deref(), Some("pdf,zip"));
        assert_eq!(cli.exclude.as_deref(), Some("/private,/tmp"));
    }

    #[test]
    fn test_mirror_only_flags_require_mirror() {
        assert!(parse(&["--convert-links", "https://example.com"]).is_err());
        assert!(parse(&["-R=pdf", "https://example.com"]).is_err());
        assert!(parse(&["-X=/private", "https://example.com"]).is_err());
    }

    #[test]
    fn test_exclude_paths_must_start_with_slash() {
        assert!(parse(&["--mirror", "-X=private", "https://example.com"]).is_err());
        assert!(parse(&["--mirror", "-X=/ok,bad", "https://example.com"]).is_err());
    }

    #[test]
    fn test_output_document_conflicts_with_mirror() {
        assert!(parse(&["--mirror", "-O=page.html", "https://example.com"]).is_err());
        let cli = parse(&["-O=page.html", "https://example.com"]).unwrap();
        assert_eq!(cli.output_document.as_deref(), Some("page.html"));
    }

    #[test]
    fn test_url_must_be_absolute_http() {
        assert!(parse(&["ftp://example.com/file.zip"]).is_err());
        assert!(parse(&["--mirror", "ftp://example.com"]).is_err());
        assert!(parse(&["example.com/file.zip"]).is_err());
        assert!(parse(&["http://"]).is_err());
        assert!(parse(&["http://example.com/file.zip"]).is_ok());
    }

    #[test]
    fn test_concurrency_must_be_positive() {
        assert!(parse(&["--mirror", "--concurrency", "0", "https://example.com"]).is_err());
    }
}

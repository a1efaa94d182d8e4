// src/mirror/options.rs
// =============================================================================
// Settings for one mirror run.
//
// Built once (by main.rs from the command line, or directly in tests) and
// then owned by the shared MirrorContext. Nothing reads configuration from
// globals.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// The page the mirror starts from; its hostname is the mirror's scope
    pub url: String,
    /// Where the domain directory is created
    pub output_dir: PathBuf,
    /// Suffixes never downloaded (--reject)
    pub reject_types: Vec<String>,
    /// Path fragments never fetched (--exclude)
    pub reject_paths: Vec<String>,
    /// Rewrite saved pages for offline viewing (--convert-links)
    pub convert_links: bool,
    /// How many links may be handled at the same time
    pub concurrency: usize,
    /// Per-request timeout
    pub timeout: Duration,
}

impl MirrorOptions {
    pub const DEFAULT_CONCURRENCY: usize = 8;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_dir: PathBuf::from("."),
            reject_types: Vec::new(),
            reject_paths: Vec::new(),
            convert_links: false,
            concurrency: Self::DEFAULT_CONCURRENCY,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn reject_types(mut self, types: Vec<String>) -> Self {
        self.reject_types = types;
        self
    }

    pub fn reject_paths(mut self, paths: Vec<String>) -> Self {
        self.reject_paths = paths;
        self
    }

    pub fn convert_links(mut self, convert: bool) -> Self {
        self.convert_links = convert;
        self
    }

    // A pool of zero permits would never let anything run
    pub fn concurrency(mut self, permits: usize) -> Self {
        self.concurrency = permits.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

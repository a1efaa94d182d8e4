// src/error.rs
// =============================================================================
// Error types for the mirror engine.
//
// The binary itself uses anyhow (see main.rs), but the engine returns this
// typed enum so callers can tell a bad status code from a disk error, and so
// the single-shot asset API can say "already processed" explicitly.
//
// Rust concepts:
// - thiserror: derives std::error::Error and Display from attributes
// - #[from]: lets the ? operator convert a reqwest::Error automatically
// =============================================================================

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// The string could not be parsed as an absolute URL
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// The URL parsed, but has no host we can scope the mirror to
    #[error("could not extract domain name for '{0}'")]
    NoDomain(String),

    /// Connection, TLS, timeout or body read failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with something other than 2xx
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The asset was already handled earlier in this run
    #[error("URL already processed: {0}")]
    AlreadyProcessed(String),

    #[error("could not rewrite links: {0}")]
    Rewrite(String),
}

impl MirrorError {
    /// Helper for wrapping an io::Error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;

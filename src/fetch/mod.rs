// src/fetch/mod.rs
// =============================================================================
// Network access for the mirror.
//
// Submodules:
// - http: the shared HTTP client and the one-request primitive
// - download: saving a single URL to a single file on disk
//
// Nothing in here knows about crawling, visited sets or domains. The mirror
// module builds on top of these pieces.
// =============================================================================

mod download;
mod http;

pub use download::{download_into, save_response, single_file_path, Saved};
pub use http::{content_type, Fetcher};

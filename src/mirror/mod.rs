// src/mirror/mod.rs
// =============================================================================
// This module is the mirror engine.
//
// Features:
// - Recursive crawling of every page on the root URL's domain
// - Downloading each page and asset exactly once per run
// - A fixed pool of permits bounding how many links are handled at once
// - --reject / --exclude filtering and optional offline link rewriting
//
// Submodules:
// - options: the settings of one run
// - state: visited sets, permit pool and counters shared by all tasks
// - assets: the asset downloader
// - crawler: the recursive page walk that ties everything together
// =============================================================================

mod assets;
mod crawler;
mod options;
mod state;

pub use crawler::Crawler;
pub use options::MirrorOptions;
pub use state::MirrorSummary;

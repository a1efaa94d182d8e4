// src/mirror/assets.rs
// =============================================================================
// Downloads the assets of a mirror run: images, scripts, stylesheets, and
// the raw bytes of every page.
//
// Each URL goes through:
// 1. The assets VisitedSet (first caller wins, everyone else returns;
//    the URL counts as settled once the winner is done with it)
// 2. A sanity check (non-empty, http/https)
// 3. The --reject suffix filter
// 4. fetch::download_into, which writes under the domain directory and
//    refuses to overwrite existing files
//
// download_asset() never returns an error: failures are logged and counted,
// and the crawl carries on. try_download_asset() is the same pipeline for
// callers that want to know what happened.
// =============================================================================

use super::state::MirrorContext;
use crate::error::{MirrorError, Result};
use crate::fetch::{download_into, Fetcher, Saved};
use crate::urls::{is_http_url, is_rejected_type};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

// Why an asset was not downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InvalidUrl,
    RejectedType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Saved(Saved),
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct AssetDownloader {
    ctx: Arc<MirrorContext>,
    fetcher: Fetcher,
}

impl AssetDownloader {
    pub fn new(ctx: Arc<MirrorContext>, fetcher: Fetcher) -> Self {
        Self { ctx, fetcher }
    }

    // Downloads one asset, logging the outcome instead of returning it
    pub async fn download_asset(&self, url: &str) {
        match self.try_download_asset(url).await {
            Ok(AssetOutcome::Saved(Saved::Written { path, bytes })) => {
                self.ctx.stats.record_saved();
                info!(url, path = %path.display(), bytes, "Downloaded");
            }
            Ok(AssetOutcome::Saved(Saved::AlreadyOnDisk(path))) => {
                self.ctx.stats.record_existing();
                debug!(url, path = %path.display(), "File already on disk");
            }
            Ok(AssetOutcome::Skipped(SkipReason::InvalidUrl)) => {
                self.ctx.stats.record_skipped();
                info!(url, "Invalid URL");
            }
            Ok(AssetOutcome::Skipped(SkipReason::RejectedType)) => {
                self.ctx.stats.record_skipped();
                info!(url, "Skipping rejected file");
            }
            Err(MirrorError::AlreadyProcessed(_)) => {
                trace!(url, "Asset already processed");
            }
            Err(e) => {
                self.ctx.stats.record_failed();
                warn!(url, error = %e, "Download failed");
            }
        }
    }

    // Downloads one asset and reports exactly what happened
    //
    // Returns Err(AlreadyProcessed) when the URL was handled earlier in this
    // run. Each URL is claimed before it is checked, so a skipped URL is not
    // checked again; a failed one is released so a later reference retries it. The claim is held until the file is
    // complete (or removed), so `assets.settled(url)` means "done writing".
    pub async fn try_download_asset(&self, url: &str) -> Result<AssetOutcome> {
        let Some(_claim) = self.ctx.assets.claim(url) else {
            return Err(MirrorError::AlreadyProcessed(url.to_string()));
        };

        if url.is_empty() || !is_http_url(url) {
            return Ok(AssetOutcome::Skipped(SkipReason::InvalidUrl));
        }

        if is_rejected_type(url, &self.ctx.options.reject_types) {
            return Ok(AssetOutcome::Skipped(SkipReason::RejectedType));
        }

        debug!(url, "Downloading");
        let saved = download_into(&self.fetcher, url, &self.ctx.root_dir, &mut |done, total| {
            trace!(url, done, total, "progress");
        })
        .await;

        match saved {
            Ok(saved) => Ok(AssetOutcome::Saved(saved)),
            Err(e) => {
                // A failed transfer leaves the URL unvisited for later references
                self.ctx.assets.forget(url);
                Err(e)
            }
        }
    }
}

// src/mirror/state.rs
// =============================================================================
// Shared state for one mirror run.
//
// One MirrorContext is created per run and handed (inside an Arc) to every
// task. It owns:
// - two VisitedSets, one for pages and one for assets
// - the permit pool that caps how many links are handled at once
// - counters for the final summary
//
// Locks here are only ever held for a single check-and-mark. No lock is
// held across a network call.
//
// Rust concepts:
// - Mutex: std's blocking mutex is fine because critical sections are tiny
// - Atomics: lock-free counters shared between tasks
// - RAII: LinkSlot gives its permit back when it is dropped
// =============================================================================

use super::options::MirrorOptions;
use crate::error::{MirrorError, Result};
use crate::urls::{extract_domain, is_http_url};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Semaphore, SemaphorePermit};
use url::Url;

// A set of URLs that have been claimed by some task
//
// Each entry carries a "done" flag, raised when the claiming task drops its
// Claim. Other tasks can wait on it with `settled`.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: Mutex<HashMap<String, Arc<watch::Sender<bool>>>>,
}

// Proof that this task won a URL; dropping it marks the URL settled
#[derive(Debug)]
pub struct Claim {
    done: Arc<watch::Sender<bool>>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.done.send_replace(true);
    }
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    // Marks the URL as visited
    //
    // Returns true only for the first caller; the check and the insert happen
    // under one lock, so two tasks can never both win.
    pub fn mark(&self, url: &str) -> bool {
        self.claim(url).is_some()
    }

    // Like mark, but the URL only counts as settled once the Claim is dropped
    pub fn claim(&self, url: &str) -> Option<Claim> {
        let mut seen = self.lock();
        if seen.contains_key(url) {
            return None;
        }
        let (done, _) = watch::channel(false);
        let done = Arc::new(done);
        seen.insert(url.to_string(), Arc::clone(&done));
        Some(Claim { done })
    }

    // Waits until whoever claimed the URL has finished with it
    //
    // Returns at once for URLs nobody has claimed.
    pub async fn settled(&self, url: &str) {
        let sender = self.lock().get(url).cloned();
        let Some(sender) = sender else {
            return;
        };
        let mut done = sender.subscribe();
        let _ = done.wait_for(|finished| *finished).await;
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    // Un-marks a URL whose fetch failed, so a later reference can retry it
    pub fn forget(&self, url: &str) {
        self.lock().remove(url);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // A panic elsewhere can't leave a HashMap half-updated, so a poisoned
    // lock is still safe to use
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<watch::Sender<bool>>>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
pub struct MirrorStats {
    pages: AtomicUsize,
    assets_saved: AtomicUsize,
    assets_existing: AtomicUsize,
    skipped: AtomicUsize,
    external: AtomicUsize,
    failed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MirrorStats {
    pub fn record_page(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_saved(&self) {
        self.assets_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_existing(&self) {
        self.assets_existing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_external(&self) {
        self.external.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

// Totals reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorSummary {
    pub url: String,
    pub output: String,
    pub pages: usize,
    pub assets_saved: usize,
    pub assets_existing: usize,
    pub skipped: usize,
    pub external: usize,
    pub failed: usize,
    pub peak_in_flight: usize,
}

// Holding one of these means the task owns a permit from the pool
pub struct LinkSlot<'a> {
    _permit: SemaphorePermit<'a>,
    stats: &'a MirrorStats,
}

impl Drop for LinkSlot<'_> {
    fn drop(&mut self) {
        self.stats.leave();
    }
}

// Everything one mirror run shares between its tasks
#[derive(Debug)]
pub struct MirrorContext {
    pub options: MirrorOptions,
    /// The normalized root URL the run starts from
    pub root_url: String,
    /// Hostname of the root URL; nothing outside it is fetched
    pub domain: String,
    /// output_dir/domain, where every file of the run is written
    pub root_dir: PathBuf,
    pub pages: VisitedSet,
    pub assets: VisitedSet,
    pub stats: MirrorStats,
    permits: Semaphore,
    entry_claimed: AtomicBool,
}

impl MirrorContext {
    pub fn new(options: MirrorOptions) -> Result<Self> {
        if !is_http_url(&options.url) {
            return Err(MirrorError::InvalidUrl(options.url.clone()));
        }
        let root_url = Url::parse(&options.url)
            .map_err(|_| MirrorError::InvalidUrl(options.url.clone()))?
            .to_string();
        let domain = extract_domain(&root_url)?;
        let root_dir = options.output_dir.join(&domain);
        let permits = Semaphore::new(options.concurrency.max(1));

        Ok(Self {
            options,
            root_url,
            domain,
            root_dir,
            pages: VisitedSet::new(),
            assets: VisitedSet::new(),
            stats: MirrorStats::default(),
            permits,
            entry_claimed: AtomicBool::new(false),
        })
    }

    // Waits for a free permit
    //
    // Returns None only if the pool was closed, which never happens during a
    // normal run.
    pub async fn acquire_slot(&self) -> Option<LinkSlot<'_>> {
        let permit = self.permits.acquire().await.ok()?;
        self.stats.enter();
        Some(LinkSlot {
            _permit: permit,
            stats: &self.stats,
        })
    }

    // True for exactly one caller per run: the first page visited
    pub fn claim_entry_point(&self) -> bool {
        !self.entry_claimed.swap(true, Ordering::SeqCst)
    }

    pub fn summary(&self) -> MirrorSummary {
        let load = |counter: &AtomicUsize| counter.load(Ordering::SeqCst);
        MirrorSummary {
            url: self.root_url.clone(),
            output: self.root_dir.display().to_string(),
            pages: load(&self.stats.pages),
            assets_saved: load(&self.stats.assets_saved),
            assets_existing: load(&self.stats.assets_existing),
            skipped: load(&self.stats.skipped),
            external: load(&self.stats.external),
            failed: load(&self.stats.failed),
            peak_in_flight: load(&self.stats.peak_in_flight),
        }
    }
}

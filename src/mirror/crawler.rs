// src/mirror/crawler.rs
// =============================================================================
// This module implements the recursive mirror.
//
// How it works:
// 1. Fetch a page and collect every link/asset candidate on it
// 2. Spawn one task per candidate; each task waits for a permit first
// 3. A task resolves its link, applies the filters, downloads it as an
//    asset, and for <a> links fetches the linked page too
// 4. Once the permit is released, the linked page's own candidates are
//    handled the same way (step 2), recursively
// 5. When every task of a page has finished, and the page's own file is
//    completely written, the saved page is rewritten for offline viewing
//    (if --convert-links was given)
//
// Only same-domain links are ever fetched, and the two VisitedSets make
// sure each page and each asset is handled at most once per run.
//
// Rust concepts:
// - Arc: every task shares the same context and HTTP client
// - JoinSet: structured concurrency, a page waits for all of its tasks
// - BoxFuture: recursion between async functions needs a boxed future
// =============================================================================

use super::assets::AssetDownloader;
use super::options::MirrorOptions;
use super::state::{MirrorContext, MirrorSummary};
use crate::error::{MirrorError, Result};
use crate::fetch::Fetcher;
use crate::html::{convert_links, extract_candidates, Candidate};
use crate::urls::{
    directory_index, extract_domain, is_bare_root, is_rejected_path, is_rejected_type,
    mirror_file_path, resolve_url,
};
use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

// A fetched page whose candidates have not been handled yet
#[derive(Debug)]
struct ScannedPage {
    url: String,
    saved_path: PathBuf,
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone)]
pub struct Crawler {
    ctx: Arc<MirrorContext>,
    fetcher: Fetcher,
    assets: AssetDownloader,
}

impl Crawler {
    // Creates a crawler (and its shared context) for one mirror run
    pub fn new(options: MirrorOptions) -> Result<Self> {
        let fetcher = Fetcher::new(options.timeout)?;
        let ctx = Arc::new(MirrorContext::new(options)?);
        let assets = AssetDownloader::new(Arc::clone(&ctx), fetcher.clone());
        Ok(Self {
            ctx,
            fetcher,
            assets,
        })
    }

    // Mirrors the whole site, starting from the configured root URL
    //
    // Returns once every reachable same-domain page and asset has been
    // handled. Only a failure to fetch the root page is an error.
    pub async fn run(&self) -> Result<MirrorSummary> {
        let root = self.ctx.root_url.clone();
        self.mirror(&root).await?;
        debug!(
            pages = self.ctx.pages.len(),
            assets = self.ctx.assets.len(),
            "visited sets at end of run"
        );
        Ok(self.ctx.summary())
    }

    // Mirrors one page and everything reachable from it
    //
    // Returns Ok(()) straight away for pages already visited in this run.
    pub async fn mirror(&self, url: &str) -> Result<()> {
        if let Some(page) = self.scan_page(url.to_string()).await? {
            self.finish_page(page).await;
        }
        Ok(())
    }

    // Claims a page in the pages VisitedSet, then fetches and parses it
    //
    // A page whose fetch fails is released again, so a later link to it
    // gets a fresh attempt.
    async fn scan_page(&self, url: String) -> Result<Option<ScannedPage>> {
        if !self.ctx.pages.mark(&url) {
            debug!(url = %url, "Page already visited");
            return Ok(None);
        }

        match self.fetch_page(&url).await {
            Ok(page) => Ok(Some(page)),
            Err(e) => {
                self.ctx.pages.forget(&url);
                Err(e)
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<ScannedPage> {
        let parsed = Url::parse(url).map_err(|_| MirrorError::InvalidUrl(url.to_string()))?;

        // The first page of a run is always saved, so the mirror has an
        // entry point even if nothing links back to it
        if self.ctx.claim_entry_point() {
            if is_bare_root(url) {
                debug!(url, "Saving domain root as index.html");
            }
            self.assets.download_asset(url).await;
        }

        info!(url, "Mirroring page");
        let page = self.fetcher.get_text(url).await?;
        let saved_path = mirror_file_path(&self.ctx.root_dir, &parsed, page.is_html());
        let candidates = extract_candidates(&page.body);
        self.ctx.stats.record_page();
        debug!(url, candidates = candidates.len(), "Page parsed");

        Ok(ScannedPage {
            url: url.to_string(),
            saved_path,
            candidates,
        })
    }

    // Handles every candidate of a page concurrently, waits for all of them,
    // then rewrites the saved page if requested
    fn finish_page(&self, page: ScannedPage) -> BoxFuture<'static, ()> {
        let this = self.clone();
        async move {
            let ScannedPage {
                url,
                saved_path,
                candidates,
            } = page;
            let page_url: Arc<str> = Arc::from(url.as_str());

            let mut tasks = JoinSet::new();
            for candidate in candidates {
                tasks.spawn(this.clone().handle_link(Arc::clone(&page_url), candidate));
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(page = %page_url, error = %e, "Link task did not complete");
                }
            }

            if this.ctx.options.convert_links {
                // Another task may still be streaming this page to disk
                this.ctx.assets.settled(&url).await;
                this.rewrite_saved_page(saved_path).await;
            }
        }
        .boxed()
    }

    // Handles one candidate link found on `page_url`
    //
    // Runs with a permit from the pool. The permit covers the downloads and
    // the fetch of a linked page; it is released before that page's own
    // links are handled, so a long chain of pages can't use up the pool and
    // wait on itself.
    async fn handle_link(self, page_url: Arc<str>, candidate: Candidate) {
        let slot = match self.ctx.acquire_slot().await {
            Some(slot) => slot,
            None => return,
        };

        let resolved = match self.admit(&page_url, candidate.link()) {
            Some(resolved) => resolved,
            None => return,
        };

        let mut next_page = None;
        if candidate.is_anchor() {
            match directory_index(&resolved) {
                Some(index_url) => {
                    // Directory links are materialized as their index.html
                    if !self.ctx.pages.contains(&index_url) {
                        self.assets.download_asset(&index_url).await;
                        next_page = Some(index_url);
                    }
                }
                None => next_page = Some(resolved.clone()),
            }
        }

        // Every same-domain link is saved as-is, pages included
        self.assets.download_asset(&resolved).await;

        let scanned = match next_page {
            Some(next) => match self.scan_page(next.clone()).await {
                Ok(scanned) => scanned,
                Err(e) => {
                    self.ctx.stats.record_failed();
                    warn!(url = %next, error = %e, "Could not mirror page");
                    None
                }
            },
            None => None,
        };

        drop(slot);

        if let Some(page) = scanned {
            self.finish_page(page).await;
        }
    }

    // Resolves a candidate and runs it through the filters
    //
    // Returns the absolute URL when the link should be handled, None when
    // it is skipped (the reason is logged and counted).
    fn admit(&self, page_url: &str, link: &str) -> Option<String> {
        let resolved = match resolve_url(page_url, link) {
            Some(resolved) => resolved,
            None => {
                debug!(link, "Not a downloadable link");
                return None;
            }
        };

        if is_rejected_path(&resolved, &self.ctx.options.reject_paths) {
            self.ctx.stats.record_skipped();
            info!(url = %resolved, "Skipping rejected file path");
            return None;
        }

        if is_rejected_type(&resolved, &self.ctx.options.reject_types) {
            self.ctx.stats.record_skipped();
            info!(url = %resolved, "Skipping rejected file");
            return None;
        }

        let domain = match extract_domain(&resolved) {
            Ok(domain) => domain,
            Err(e) => {
                self.ctx.stats.record_skipped();
                info!(url = %resolved, error = %e, "Could not extract domain name");
                return None;
            }
        };

        if domain != self.ctx.domain {
            self.ctx.stats.record_external();
            debug!(url = %resolved, "Skipping link outside the mirrored domain");
            return None;
        }

        Some(resolved)
    }

    // Rewrites links in a saved page; errors are logged, never returned
    async fn rewrite_saved_page(&self, path: PathBuf) {
        let path_display = path.display().to_string();
        match tokio::task::spawn_blocking(move || convert_links(&path)).await {
            Ok(Ok(0)) => debug!(path = %path_display, "No links to convert"),
            Ok(Ok(changed)) => info!(path = %path_display, changed, "Links converted for offline viewing"),
            Ok(Err(e)) => warn!(path = %path_display, error = %e, "Could not convert links"),
            Err(e) => warn!(path = %path_display, error = %e, "Link conversion task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn options(server: &mockito::ServerGuard, out: &TempDir) -> MirrorOptions {
        MirrorOptions::new(server.url()).output_dir(out.path())
    }

    fn site_root(out: &TempDir) -> PathBuf {
        out.path().join("127.0.0.1")
    }

    // Every file below `dir`, relative to it, sorted
    fn files_under(dir: &Path) -> Vec<String> {
        fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(base, &path, out);
                } else {
                    let rel = path.strip_prefix(base).unwrap();
                    out.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        let mut out = Vec::new();
        walk(dir, dir, &mut out);
        out.sort();
        out
    }

    async fn html_mock(
        server: &mut mockito::ServerGuard,
        path: &str,
        body: &str,
    ) -> mockito::Mock {
        server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_page_site_fetches_shared_image_once() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(
            &mut server,
            "/",
            r#"<a href="/about">About</a><img src="/img/logo.png">"#,
        )
        .await;
        let _about = html_mock(
            &mut server,
            "/about",
            r#"<a href="/">Home</a><img src="/img/logo.png">"#,
        )
        .await;
        let logo = server
            .mock("GET", "/img/logo.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("png-bytes")
            .expect(1)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let crawler = Crawler::new(options(&server, &tmp).concurrency(4)).unwrap();
        let summary = crawler.run().await.unwrap();

        logo.assert_async().await;
        assert_eq!(
            files_under(&site_root(&tmp)),
            vec!["about.html", "img/logo.png", "index.html"]
        );
        assert!(summary.pages >= 2);
        assert!(summary.peak_in_flight <= 4);
    }

    #[tokio::test]
    async fn test_bare_root_is_saved_as_index() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(&mut server, "/", "<h1>Home</h1>").await;

        let tmp = TempDir::new().unwrap();
        Crawler::new(options(&server, &tmp)).unwrap().run().await.unwrap();

        let saved = std::fs::read_to_string(site_root(&tmp).join("index.html")).unwrap();
        assert!(saved.contains("Home"));
    }

    #[tokio::test]
    async fn test_explicit_index_matches_bare_root() {
        let mut server = mockito::Server::new_async().await;
        let _index = html_mock(&mut server, "/index.html", "<h1>Home</h1>").await;

        let tmp = TempDir::new().unwrap();
        let options = MirrorOptions::new(format!("{}/index.html", server.url()))
            .output_dir(tmp.path());
        Crawler::new(options).unwrap().run().await.unwrap();

        assert_eq!(files_under(&site_root(&tmp)), vec!["index.html"]);
    }

    #[tokio::test]
    async fn test_mirror_twice_is_a_no_op() {
        let mut server = mockito::Server::new_async().await;
        // one request for the entry file, one for parsing the page
        let home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>hi</p>")
            .expect(2)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let crawler = Crawler::new(options(&server, &tmp)).unwrap();
        let root = format!("{}/", server.url());
        crawler.mirror(&root).await.unwrap();
        crawler.mirror(&root).await.unwrap();

        home.assert_async().await;
    }

    #[tokio::test]
    async fn test_root_failure_is_returned() {
        let mut server = mockito::Server::new_async().await;
        let _home = server
            .mock("GET", "/")
            .with_status(500)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let result = Crawler::new(options(&server, &tmp)).unwrap().run().await;
        assert!(matches!(result, Err(MirrorError::Status { .. })));
    }

    #[tokio::test]
    async fn test_broken_child_page_does_not_fail_the_run() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(&mut server, "/", r#"<a href="/broken">Broken</a>"#).await;
        let _broken = server
            .mock("GET", "/broken")
            .with_status(404)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let summary = Crawler::new(options(&server, &tmp))
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(summary.failed >= 1);
    }

    #[tokio::test]
    async fn test_other_domains_are_never_fetched() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(
            &mut server,
            "/",
            r#"<a href="http://other.invalid/page">Elsewhere</a>
               <img src="http://other.invalid/x.png">"#,
        )
        .await;

        let tmp = TempDir::new().unwrap();
        let summary = Crawler::new(options(&server, &tmp))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(summary.external, 2);
        assert!(!tmp.path().join("other.invalid").exists());
    }

    #[tokio::test]
    async fn test_rejected_types_and_paths_are_never_fetched() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(
            &mut server,
            "/",
            r#"<a href="/doc.pdf">PDF</a>
               <a href="/private/secret">Secret</a>
               <img src="/private/photo.png">"#,
        )
        .await;
        let pdf = server
            .mock("GET", "/doc.pdf")
            .expect(0)
            .create_async()
            .await;
        let secret = server
            .mock("GET", mockito::Matcher::Regex("^/private".to_string()))
            .expect(0)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let options = options(&server, &tmp)
            .reject_types(vec!["pdf".to_string(), "zip".to_string()])
            .reject_paths(vec!["/private".to_string()]);
        let summary = Crawler::new(options).unwrap().run().await.unwrap();

        pdf.assert_async().await;
        secret.assert_async().await;
        assert_eq!(summary.skipped, 3);
    }

    #[tokio::test]
    async fn test_directory_links_are_saved_as_index() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(&mut server, "/", r#"<a href="/docs/">Docs</a>"#).await;
        let _docs_index = html_mock(&mut server, "/docs/index.html", "<h1>Docs</h1>").await;
        let docs_dir = server
            .mock("GET", "/docs/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<h1>Docs</h1>")
            .expect(0)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        Crawler::new(options(&server, &tmp)).unwrap().run().await.unwrap();

        // the directory form maps onto the file already written
        docs_dir.assert_async().await;
        assert_eq!(
            files_under(&site_root(&tmp)),
            vec!["docs/index.html", "index.html"]
        );
    }

    #[tokio::test]
    async fn test_style_urls_are_downloaded() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(
            &mut server,
            "/",
            r#"<style>body { background: url('/bg.png') }</style>
               <div style="background: url(hero.jpg)"></div>"#,
        )
        .await;
        let mut images = Vec::new();
        for path in ["/bg.png", "/hero.jpg"] {
            let mock = server
                .mock("GET", path)
                .with_status(200)
                .with_header("content-type", "image/png")
                .with_body("img")
                .expect(1)
                .create_async()
                .await;
            images.push(mock);
        }

        let tmp = TempDir::new().unwrap();
        Crawler::new(options(&server, &tmp)).unwrap().run().await.unwrap();

        for image in &images {
            image.assert_async().await;
        }

        assert_eq!(
            files_under(&site_root(&tmp)),
            vec!["bg.png", "hero.jpg", "index.html"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_permit_pool_bounds_in_flight_links() {
        let mut server = mockito::Server::new_async().await;
        let images: String = (0..12)
            .map(|i| format!(r#"<img src="/img/{}.png">"#, i))
            .collect();
        let _home = html_mock(&mut server, "/", &images).await;
        let _img = server
            .mock("GET", mockito::Matcher::Regex(r"^/img/\d+\.png$".to_string()))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("img")
            .expect(12)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let summary = Crawler::new(options(&server, &tmp).concurrency(2))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(summary.peak_in_flight >= 1);
        assert!(summary.peak_in_flight <= 2);
        assert_eq!(summary.assets_saved, 13);
        assert_eq!(files_under(&site_root(&tmp).join("img")).len(), 12);
    }

    #[tokio::test]
    async fn test_convert_links_rewrites_saved_pages() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            r#"<a href="/about">About</a><img src="{}/img/logo.png">"#,
            server.url()
        );
        let _home = html_mock(&mut server, "/", &body).await;
        let _about = html_mock(&mut server, "/about", "<p>About</p>").await;
        let _logo = server
            .mock("GET", "/img/logo.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("png")
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        Crawler::new(options(&server, &tmp).convert_links(true))
            .unwrap()
            .run()
            .await
            .unwrap();

        let index = std::fs::read_to_string(site_root(&tmp).join("index.html")).unwrap();
        assert!(index.contains(r#"src="127.0.0.1/img/logo.png""#));
        assert!(index.contains(r#"href="about""#));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_page_shared_by_two_pages_is_converted_after_it_is_written() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(&mut server, "/", r#"<a href="/p1">1</a><a href="/p2">2</a>"#).await;
        let _p1 = html_mock(&mut server, "/p1", r#"<a href="/about">About</a>"#).await;
        let _p2 = html_mock(&mut server, "/p2", r#"<a href="/q">Q</a>"#).await;
        let _q = html_mock(&mut server, "/q", r#"<a href="/about">About</a>"#).await;
        let _img = server
            .mock("GET", "/img.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("png")
            .create_async()
            .await;

        // The first /about response stalls halfway through its body, so one
        // task is still writing about.html while another parses the page
        let about_body = format!(
            r#"<html><body><img src="{}/img.png"></body></html>"#,
            server.url()
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let _about = server
            .mock("GET", "/about")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_chunked_body({
                let calls = Arc::clone(&calls);
                move |w| {
                    let (head, tail) = about_body.split_at(20);
                    w.write_all(head.as_bytes())?;
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        std::thread::sleep(Duration::from_millis(1500));
                    }
                    w.write_all(tail.as_bytes())
                }
            })
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        Crawler::new(options(&server, &tmp).convert_links(true))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 2);
        let about = std::fs::read_to_string(site_root(&tmp).join("about.html")).unwrap();
        assert!(about.contains(r#"src="127.0.0.1/img.png""#), "{}", about);
        assert!(!about.contains("http://"), "{}", about);
        assert_eq!(about.matches("<html").count(), 1, "{}", about);
    }

    #[tokio::test]
    async fn test_failed_page_is_retried_by_a_later_link() {
        let mut server = mockito::Server::new_async().await;
        let _home = html_mock(
            &mut server,
            "/",
            r#"<a href="/flaky">Flaky</a><a href="/next">Next</a>"#,
        )
        .await;
        let _next = html_mock(&mut server, "/next", r#"<a href="/flaky">Flaky</a>"#).await;
        // first reference: both the file download and the page fetch fail
        let failing = server
            .mock("GET", "/flaky")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        // second reference: both succeed
        let working = server
            .mock("GET", "/flaky")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>Back</p>")
            .expect(2)
            .create_async()
            .await;

        // one permit, so the second reference starts after the first failed
        let tmp = TempDir::new().unwrap();
        let summary = Crawler::new(options(&server, &tmp).concurrency(1))
            .unwrap()
            .run()
            .await
            .unwrap();

        failing.assert_async().await;
        working.assert_async().await;
        assert!(summary.failed >= 1);
        let saved = std::fs::read_to_string(site_root(&tmp).join("flaky.html")).unwrap();
        assert!(saved.contains("Back"));
    }
}

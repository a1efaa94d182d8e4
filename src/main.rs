// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging
// 3. Either download one file, or mirror the whole site
// 4. Print a summary and exit with a proper code (0 = success, 2 = error)
//
// Rust concepts used:
// - async/await: Because a mirror makes many network requests concurrently
// - Result<T, E>: For error handling (T = success type, E = error type)
// - match: Pattern matching on the outcome of each step
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli; // src/cli.rs - command-line parsing
mod error; // src/error.rs - the engine's error type
mod fetch; // src/fetch/ - HTTP requests and saving responses to disk
mod html; // src/html/ - link extraction and offline rewriting
mod logging; // src/logging.rs - tracing setup
mod mirror; // src/mirror/ - the recursive mirror engine
mod urls; // src/urls.rs - URL and path helpers

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use cli::Cli;
use fetch::{content_type, save_response, single_file_path, Fetcher, Saved};
use indicatif::{ProgressBar, ProgressStyle};
use mirror::{Crawler, MirrorOptions, MirrorSummary};
use std::time::{Duration, Instant};
use url::Url;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if cli.mirror {
        handle_mirror(&cli).await
    } else {
        handle_download(&cli).await
    }
}

// Handles --mirror
async fn handle_mirror(cli: &Cli) -> Result<i32> {
    let options = MirrorOptions::new(&cli.url)
        .output_dir(&cli.directory_prefix)
        .reject_types(cli.reject.as_deref().map(urls::parse_list).unwrap_or_default())
        .reject_paths(cli.exclude.as_deref().map(urls::parse_list).unwrap_or_default())
        .convert_links(cli.convert_links)
        .concurrency(cli.concurrency)
        .timeout(Duration::from_secs(cli.timeout));

    if !cli.json {
        println!("🔍 Mirroring: {}", cli.url);
        println!("📊 Concurrent links: {}", options.concurrency);
    }

    let started = Instant::now();
    let crawler = Crawler::new(options).context("could not start mirror")?;
    let summary = crawler.run().await?;

    print_summary(&summary, cli.json, started.elapsed())?;
    Ok(0)
}

// Handles a plain single-file download
async fn handle_download(cli: &Cli) -> Result<i32> {
    let url = Url::parse(&cli.url).with_context(|| format!("invalid URL '{}'", cli.url))?;
    let fetcher = Fetcher::new(Duration::from_secs(cli.timeout))?;

    let started = Instant::now();
    println!("started at {}", timestamp(Local::now().naive_local()));
    println!("⬇️  Downloading: {}", url);

    let response = fetcher.get(url.as_str()).await?;
    let total = response.content_length();
    println!(
        "   status {}, type {}",
        response.status(),
        content_type(&response).unwrap_or_else(|| "unknown".to_string())
    );
    if let Some(len) = total {
        println!("   content size: {} bytes [~{:.2}MB]", len, len as f64 / 1_000_000.0);
    }

    let path = single_file_path(&cli.directory_prefix, &url, cli.output_document.as_deref());
    println!("   saving file to: {}", path.display());

    let bar = progress_bar(total)?;
    let saved = save_response(response, &path, &mut |done, _| bar.set_position(done)).await;
    bar.finish_and_clear();

    let saved = saved?;
    match &saved {
        Saved::Written { bytes, .. } => {
            println!(
                "✅ Downloaded [{}] to {} ({} bytes in {:.1?})",
                url,
                saved.path().display(),
                bytes,
                started.elapsed()
            );
        }
        Saved::AlreadyOnDisk(_) => {
            println!("⚠️  {} already exists, not overwritten", saved.path().display());
        }
    }
    println!("finished at {}", timestamp(Local::now().naive_local()));

    Ok(0)
}

// A byte progress bar when the size is known, a spinner otherwise
fn progress_bar(total: Option<u64>) -> Result<ProgressBar> {
    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(ProgressStyle::with_template(
                "{bytes} / {total_bytes} [{wide_bar}] {percent}% {bytes_per_sec} {eta}",
            )?);
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template(
                "{spinner} {bytes} {bytes_per_sec}",
            )?);
            bar
        }
    };
    Ok(bar)
}

// "2024-01-02 15:04:05"
fn timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

// Prints the mirror summary either as a table or JSON
fn print_summary(summary: &MirrorSummary, json: bool, elapsed: Duration) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(summary)?;
        println!("{}", json_output);
        return Ok(());
    }

    println!();
    println!("📊 Summary:");
    println!("   📁 Output: {}", summary.output);
    println!("   📄 Pages crawled: {}", summary.pages);
    println!("   ✅ Files saved: {}", summary.assets_saved);
    println!("   💾 Already on disk: {}", summary.assets_existing);
    println!("   ⏭️  Skipped: {}", summary.skipped);
    println!("   🌐 Other domains: {}", summary.external);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏱️  Took {:.1?}", elapsed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_timestamp_format() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(timestamp(at), "2024-01-02 03:04:05");
    }
}

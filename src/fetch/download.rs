// src/fetch/download.rs
// =============================================================================
// Downloads one URL to one file.
//
// How it works:
// 1. Work out where the file goes (see urls::mirror_file_path)
// 2. If a file is already there, stop: we never overwrite
// 3. GET the URL; text/html responses get a ".html" name
// 4. Stream the body to disk chunk by chunk, reporting progress
//
// The file is opened with create_new, so even two tasks racing on the same
// path cannot clobber each other: the loser just sees "already on disk".
// =============================================================================

use super::http::{content_type, is_html_type, Fetcher};
use crate::error::{MirrorError, Result};
use crate::urls::{mirror_file_path, INDEX_FILE};
use reqwest::Response;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

/// Receives (bytes downloaded so far, Content-Length if the server sent one)
pub type ProgressFn<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

// What happened to a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Saved {
    /// The body was written to this path
    Written { path: PathBuf, bytes: u64 },
    /// A file already occupied the target path; nothing was written
    AlreadyOnDisk(PathBuf),
}

impl Saved {
    pub fn path(&self) -> &Path {
        match self {
            Saved::Written { path, .. } => path,
            Saved::AlreadyOnDisk(path) => path,
        }
    }
}

// Downloads `url` into the mirror tree rooted at `root`
pub async fn download_into(
    fetcher: &Fetcher,
    url: &str,
    root: &Path,
    on_progress: ProgressFn<'_>,
) -> Result<Saved> {
    let parsed = Url::parse(url).map_err(|_| MirrorError::InvalidUrl(url.to_string()))?;

    // Cheap check before touching the network
    let guess = mirror_file_path(root, &parsed, false);
    if file_exists(&guess).await {
        return Ok(Saved::AlreadyOnDisk(guess));
    }

    let response = fetcher.get(url).await?;
    let is_html = is_html_type(content_type(&response).as_deref());
    let path = mirror_file_path(root, &parsed, is_html);
    if path != guess && file_exists(&path).await {
        return Ok(Saved::AlreadyOnDisk(path));
    }

    save_response(response, &path, on_progress).await
}

// Picks the file name for a plain (non-mirror) download
//
// Uses the explicit name when given, otherwise the last path segment of the
// URL, falling back to index.html.
pub fn single_file_path(dir: &Path, url: &Url, file_name: Option<&str>) -> PathBuf {
    let name = match file_name {
        Some(name) => name.to_string(),
        None => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|last| !last.is_empty())
            .unwrap_or(INDEX_FILE)
            .to_string(),
    };
    dir.join(name)
}

// Streams a response body into a new file at `path`
//
// Parent directories are created as needed. A partial file left by a failed
// transfer is removed.
pub async fn save_response(
    mut response: Response,
    path: &Path,
    on_progress: ProgressFn<'_>,
) -> Result<Saved> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MirrorError::io(parent, e))?;
        }
    }

    let file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Ok(Saved::AlreadyOnDisk(path.to_path_buf()));
        }
        Err(e) => return Err(MirrorError::io(path, e)),
    };

    let total = response.content_length();
    match stream_body(&mut response, file, path, total, on_progress).await {
        Ok(bytes) => Ok(Saved::Written {
            path: path.to_path_buf(),
            bytes,
        }),
        Err(e) => {
            let _ = fs::remove_file(path).await;
            Err(e)
        }
    }
}

async fn stream_body(
    response: &mut Response,
    file: File,
    path: &Path,
    total: Option<u64>,
    on_progress: ProgressFn<'_>,
) -> Result<u64> {
    let mut writer = BufWriter::new(file);
    let mut downloaded: u64 = 0;

    while let Some(chunk) = response.chunk().await? {
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| MirrorError::io(path, e))?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    writer.flush().await.map_err(|e| MirrorError::io(path, e))?;
    Ok(downloaded)
}

async fn file_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

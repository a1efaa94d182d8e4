// src/fetch/http.rs
// =============================================================================
// This module makes the HTTP requests for the whole mirror.
//
// Key functionality:
// - One shared reqwest Client (connection pooling across all tasks)
// - Browser-like request headers, since some sites refuse bare clients
// - Any non-2xx status is turned into an error; nothing is retried
//
// Rust concepts:
// - async/await: For concurrent network I/O
// - Result<T, E>: For error handling
// - Clone: Client is an Arc internally, so cloning it is cheap
// =============================================================================

use crate::error::{MirrorError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/90.0.4430.85 Safari/537.36";

// A page body together with the content type the server reported
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub content_type: Option<String>,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        is_html_type(self.content_type.as_deref())
    }
}

// The single entry point for network access
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    // Creates a fetcher with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }

    // Performs one GET request
    //
    // Returns the response with its body still unread, so callers can
    // stream it. A non-2xx status becomes MirrorError::Status.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }

    // Fetches a page and returns its body as text
    pub async fn get_text(&self, url: &str) -> Result<FetchedPage> {
        let response = self.get(url).await?;
        let content_type = content_type(&response);
        let body = response.text().await?;
        Ok(FetchedPage { body, content_type })
    }
}

// Returns the MIME essence of the Content-Type header
//
// "text/html; charset=utf-8" -> Some("text/html")
pub fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(mime_essence)
}

fn mime_essence(raw: &str) -> String {
    raw.split(';').next().unwrap_or(raw).trim().to_ascii_lowercase()
}

pub fn is_html_type(content_type: Option<&str>) -> bool {
    content_type == Some("text/html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_essence() {
        assert_eq!(mime_essence("text/html; charset=utf-8"), "text/html");
        assert_eq!(mime_essence("Image/PNG"), "image/png");
    }

    #[test]
    fn test_is_html_type() {
        assert!(is_html_type(Some("text/html")));
        assert!(!is_html_type(Some("text/css")));
        assert!(!is_html_type(None));
    }

    #[tokio::test]
    async fn test_get_text_reports_content_type() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<p>hello</p>")
            .create_async()
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let page = fetcher.get_text(&server.url()).await.unwrap();

        assert_eq!(page.body, "<p>hello</p>");
        assert!(page.is_html());
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .get(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MirrorError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND
        ));
    }
}

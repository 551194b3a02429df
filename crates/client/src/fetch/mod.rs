//! HTTP fetch for link checks.
//!
//! ### Request Shape
//! - Plain `GET` with `Cache-Control: no-cache` and `Pragma: no-cache`
//! - `Referer` set to the configured site home URL
//! - Max redirects: 5, bounded timeout (default 15s)
//!
//! ### Responses
//! - Any HTTP status is a response, including 4xx/5xx; only transport
//!   failures (DNS, connect, TLS, timeout) are errors.
//! - Bodies are read up to `max_bytes` and truncated beyond that.
//! - Once the status line is in, a failed body read keeps the status and
//!   returns whatever body arrived, flagged as truncated.

pub mod url;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, normalize};

use linkpeek_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "linkpeek/0.1")
    pub user_agent: String,

    /// Maximum response body bytes kept (default: 1MB)
    pub max_bytes: usize,

    /// Request timeout (default: 15s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Referer header value, normally the site home URL
    pub referer: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "linkpeek/0.1".to_string(),
            max_bytes: 1024 * 1024,
            timeout: Duration::from_millis(15_000),
            max_redirects: 5,
            referer: None,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            referer: config.home_url.clone(),
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes, at most `max_bytes`
    pub bytes: Bytes,
    /// Whether the body was cut short, at `max_bytes` or by a failed read
    pub truncated: bool,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Outbound GET used by the scheduler.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. Errors are transport failures only.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error>;
}

/// reqwest-backed [`Fetcher`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        if let Some(referer) = &config.referer {
            let value = header::HeaderValue::from_str(referer)
                .map_err(|e| Error::InvalidInput(format!("invalid referer {referer:?}: {e}")))?;
            headers.insert(header::REFERER, value);
        }

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .default_headers(headers)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn transport_error(url: &Url, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Transport(format!("{url}: {err}"))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut body = BytesMut::new();
        let mut truncated = false;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(url = %url, status = status.as_u16(), error = %e, "body read failed, keeping status");
                    truncated = true;
                    break;
                }
            };
            let room = self.config.max_bytes - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} status {} in {}ms ({} bytes{})",
            url,
            final_url,
            status.as_u16(),
            fetch_ms,
            body.len(),
            if truncated { ", truncated" } else { "" }
        );

        Ok(FetchResponse {
            url: url.clone(),
            final_url,
            status,
            content_type,
            bytes: body.freeze(),
            truncated,
            fetch_ms,
        })
    }
}

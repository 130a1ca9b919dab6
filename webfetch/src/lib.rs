//! Remote text source for summarization runs.
//!
//! # Pipeline
//!
//! 1. **Fetch** - one HTTP GET; anything but `200 OK` is fatal
//! 2. **Size cap** - the body is streamed and rejected past `max_download_bytes`
//! 3. **Extraction** - [`extract_gutenberg_body`] strips carriage returns and
//!    keeps the text between the first two `*** ... ***` boundary lines
//!
//! There is no retry here. A failed fetch aborts the run before any model
//! call is made.

mod gutenberg;

use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;

pub use gutenberg::{GutenbergText, extract_gutenberg_body};

const DEFAULT_USER_AGENT: &str = concat!("brif/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SourceFetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} body exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("expected at least 3 parts around `*** ... ***` markers, found {parts}")]
    MissingMarkers { parts: usize },
}

/// Fetch settings. Unset fields take the defaults below.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// User-Agent string. Default: `brif/<version>`.
    pub user_agent: Option<String>,

    /// Request timeout in seconds. Default: 60.
    pub timeout_seconds: Option<u32>,

    /// Maximum body size in bytes. Default: 10 MiB.
    pub max_download_bytes: Option<u64>,
}

impl SourceConfig {
    pub const DEFAULT_TIMEOUT_SECONDS: u32 = 60;
    pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 10 * 1024 * 1024;

    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.user_agent
            .as_deref()
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(
            self.timeout_seconds
                .unwrap_or(Self::DEFAULT_TIMEOUT_SECONDS),
        ))
    }

    #[must_use]
    pub fn max_download_bytes(&self) -> u64 {
        self.max_download_bytes
            .unwrap_or(Self::DEFAULT_MAX_DOWNLOAD_BYTES)
    }
}

/// HTTP fetcher for plain-text sources.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    http: reqwest::Client,
    max_download_bytes: u64,
}

impl SourceFetcher {
    pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            max_download_bytes: config.max_download_bytes(),
        })
    }

    /// GET `url` and return the body as text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, SourceFetchError> {
        tracing::info!(url, "Fetching source text");

        let response =
            self.http
                .get(url)
                .send()
                .await
                .map_err(|source| SourceFetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SourceFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length()
            && length > self.max_download_bytes
        {
            return Err(SourceFetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_download_bytes,
            });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| SourceFetchError::Body {
                url: url.to_string(),
                source,
            })?;
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_download_bytes {
                return Err(SourceFetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_download_bytes,
                });
            }
        }

        tracing::debug!(url, bytes = body.len(), "Fetched source text");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

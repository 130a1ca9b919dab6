//! Completion clients for summarization.
//!
//! # Architecture
//!
//! - [`CompletionClient`] - Narrow interface consumed by the summarizer: one
//!   prompt in, generated text out
//! - [`openai`] - OpenAI Chat Completions implementation (non-streaming)
//! - [`retry`] - Bounded retry with randomized backoff around any client
//!
//! # Error Handling
//!
//! A single failed call surfaces as [`CompletionError`]. Callers are expected
//! to wrap clients in [`retry::RetryingClient`], which treats every failure
//! kind identically and gives up after a fixed number of attempts.

pub mod openai;
pub mod retry;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use brif_types;
use brif_types::ChatMessage;

/// Canonical OpenAI API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shared client settings. `https_only` is relaxed only for plain-http base
/// URLs (local mock servers).
fn base_client_builder(https_only: bool) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub fn http_client_with_timeout(
    timeout: Duration,
    https_only: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder(https_only).timeout(timeout).build()
}

/// Read an error response body, truncated to keep log lines bounded.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Request for one completion: model id, ordered messages, output cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
        }
    }
}

/// Token usage reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Generated text plus usage metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<Usage>,
}

/// A single failed completion call. Always considered transient by the
/// retry layer.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode completion response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("completion response contained no message content")]
    EmptyResponse,
}

pub type CompletionFut<'a> =
    Pin<Box<dyn Future<Output = Result<Completion, CompletionError>> + Send + 'a>>;

/// Anything that can turn a [`CompletionRequest`] into generated text.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFut<'a>;
}

impl<T: CompletionClient + ?Sized> CompletionClient for &T {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFut<'a> {
        (**self).complete(request)
    }
}

impl<T: CompletionClient + ?Sized> CompletionClient for Box<T> {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFut<'a> {
        (**self).complete(request)
    }
}

//! OpenAI Chat Completions client (non-streaming).
//!
//! Request format: `{ model, messages: [{ role, content }], max_tokens }`
//! Response format: `{ choices: [{ message: { content } }], usage: { .. } }`

use std::time::Duration;

use serde::{Deserialize, Serialize};

use brif_types::{ApiKey, ChatMessage};

use crate::{
    Completion, CompletionClient, CompletionError, CompletionFut, CompletionRequest, Usage,
    http_client_with_timeout, read_capped_error_body,
};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat Completions client bound to one API key and base URL.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: ApiKey,
    endpoint: String,
}

impl OpenAIClient {
    /// `base_url` is the scheme + host (e.g. `https://api.openai.com`); plain
    /// http is only accepted for non-production endpoints such as mock servers.
    pub fn new(
        api_key: ApiKey,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let base = base_url.trim_end_matches('/');
        let https_only = base.starts_with("https://");
        Ok(Self {
            http: http_client_with_timeout(timeout, https_only)?,
            api_key,
            endpoint: format!("{base}{CHAT_COMPLETIONS_PATH}"),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)?;

        if let Some(usage) = parsed.usage {
            tracing::info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Completion usage"
            );
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)?;

        Ok(Completion {
            content,
            usage: parsed.usage,
        })
    }
}

impl CompletionClient for OpenAIClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFut<'a> {
        Box::pin(self.send(request))
    }
}

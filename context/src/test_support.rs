//! Deterministic doubles for context tests.

use std::sync::Mutex;

use brif_providers::{Completion, CompletionClient, CompletionError, CompletionFut, CompletionRequest};

use crate::token_counter::{TokenId, TokenizationError, Tokenizer};

/// One token per `char`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizationError> {
        ids.iter()
            .map(|&id| {
                char::from_u32(id).ok_or_else(|| TokenizationError::Decode {
                    tokens: ids.len(),
                    reason: format!("{id} is not a scalar value"),
                })
            })
            .collect()
    }

    fn count(&self, text: &str) -> u32 {
        text.chars().count() as u32
    }
}

type Reply = Box<dyn Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync>;

/// Records every request and answers with `reply`.
pub struct RecordingClient {
    requests: Mutex<Vec<CompletionRequest>>,
    reply: Reply,
}

impl RecordingClient {
    pub fn new(
        reply: impl Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        }
    }

    /// Always answers with `text`.
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// The text embedded in a summary request's user message.
pub fn request_body(request: &CompletionRequest) -> &str {
    request.messages[1]
        .content
        .strip_prefix("Summarize the following: ")
        .unwrap()
}

impl CompletionClient for RecordingClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFut<'a> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let content = (self.reply)(request)?;
            Ok(Completion {
                content,
                usage: None,
            })
        })
    }
}

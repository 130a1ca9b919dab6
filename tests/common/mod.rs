//! Shared test utilities and fixtures
//!
//! Mock servers for the text source and the Chat Completions API.

#![allow(dead_code)]

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BOOK_PATH: &str = "/cache/epub/64317/pg64317.txt";
pub const CHAT_PATH: &str = "/v1/chat/completions";

/// Wrap `body` in a Gutenberg-style header and footer, with CRLF line endings.
pub fn gutenberg_book(body: &str) -> String {
    format!(
        "The Project Gutenberg eBook of Metamorphosis\r\n\
         *** START OF THE PROJECT GUTENBERG EBOOK METAMORPHOSIS ***\r\n\
         {body}\r\n\
         *** END OF THE PROJECT GUTENBERG EBOOK METAMORPHOSIS ***\r\n\
         Updated editions will replace the previous one.\r\n"
    )
}

/// `count` numbered sentences joined with ". ".
pub fn sentences(count: usize) -> String {
    (0..count)
        .map(|i| format!("Gregor looked at the ceiling of his room for the {i}th time"))
        .collect::<Vec<_>>()
        .join(". ")
}

pub async fn mount_book(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path(BOOK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(gutenberg_book(body)))
        .mount(server)
        .await;
}

pub fn chat_completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-3.5-turbo-0613",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 100,
            "completion_tokens": 10,
            "total_tokens": 110
        }
    })
}

/// Answer every chat completion with `content`.
pub async fn mount_chat_response(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(content)))
        .mount(server)
        .await;
}

/// JSON bodies of every chat completion request the server has seen.
pub async fn chat_requests(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == CHAT_PATH)
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

//! Fetch -> extract -> budget -> summarize, against mock servers.

use std::time::Duration;

use brif_context::{
    SectionSplitter, SummarizeError, Summarizer, SummarizerConfig, TokenCounter, Tokenizer,
    prompt_overhead, wrap_summary,
};
use brif_providers::openai::OpenAIClient;
use brif_providers::retry::{FixedBackoff, RetryingClient};
use brif_types::ApiKey;
use brif_webfetch::{SourceConfig, SourceFetcher, extract_gutenberg_body};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    BOOK_PATH, CHAT_PATH, chat_completion_body, chat_requests, mount_book, mount_chat_response,
    sentences,
};

const TARGET: u32 = 50;
const ROOM: u32 = 600;

const SECTION_SUMMARY: &str = "Gregor looks at the ceiling again.";
const FINAL_SUMMARY: &str = "Gregor wakes up transformed and stares at the ceiling.";

fn summarizer(server: &MockServer) -> Summarizer<OpenAIClient, TokenCounter> {
    let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
    let client = OpenAIClient::new(
        ApiKey::new("sk-test").unwrap(),
        &server.uri(),
        Duration::from_secs(5),
    )
    .unwrap();
    let client = RetryingClient::new(client).with_backoff(FixedBackoff(Duration::ZERO));
    let config = SummarizerConfig {
        target_summary_tokens: TARGET,
        ..SummarizerConfig::new("gpt-3.5-turbo")
    };

    // Context window sized so the input budget is exactly ROOM tokens.
    let context_window = prompt_overhead(&counter, TARGET) + TARGET + ROOM;
    Summarizer::new(client, counter, config, context_window).unwrap()
}

async fn fetch_book(server: &MockServer) -> String {
    let fetcher = SourceFetcher::new(&SourceConfig::default()).unwrap();
    let raw = fetcher
        .fetch_text(&format!("{}{BOOK_PATH}", server.uri()))
        .await
        .unwrap();
    extract_gutenberg_body(&raw).unwrap().body
}

#[tokio::test]
async fn long_book_is_reduced_through_mock_api() {
    let server = MockServer::start().await;
    mount_book(&server, &sentences(200)).await;
    // Requests folding earlier summaries back together get the final answer.
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_string_contains("Summarize the following: [[[ "))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion_body(FINAL_SUMMARY)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": TARGET,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion_body(SECTION_SUMMARY)),
        )
        .mount(&server)
        .await;

    let book = fetch_book(&server).await;
    assert!(!book.contains('\r'));

    let summarizer = summarizer(&server);
    assert_eq!(summarizer.budget().as_u32(), ROOM);
    assert!(summarizer.tokenizer().count(&book) > 2 * ROOM);

    let summary = summarizer.summarize(&book).await.unwrap();
    assert_eq!(summary.text, FINAL_SUMMARY);
    assert!(summary.stats.sections > 1);
    assert_eq!(summary.stats.max_depth_reached, 1);

    let requests = chat_requests(&server).await;
    assert_eq!(requests.len() as u32, summary.stats.completion_calls);

    // The last request folds the section summaries back together. A short
    // trailing section is folded in as plain text.
    let last = requests.last().unwrap();
    let user = last["messages"][1]["content"].as_str().unwrap();
    let folded = format!("[[[ {SECTION_SUMMARY} ]]]");
    assert!(user.starts_with(&format!("Summarize the following: {folded}\n\n")));
    assert_eq!(user.matches(&folded).count(), requests.len() - 1);

    for request in &requests {
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["role"], "user");
        let body = request["messages"][1]["content"]
            .as_str()
            .unwrap()
            .trim_start_matches("Summarize the following: ");
        assert!(summarizer.tokenizer().count(body) <= ROOM);
    }
}

#[tokio::test]
async fn folded_summaries_under_target_skip_the_final_call() {
    let server = MockServer::start().await;
    mount_chat_response(&server, "Gregor.").await;

    let summarizer = summarizer(&server);
    let counter = summarizer.tokenizer();
    let splitter = SectionSplitter::new(counter, summarizer.budget(), ".", TARGET);

    // Shortest book whose sections all need a call, while their wrapped
    // one-word summaries still join to under TARGET.
    let (book, sections) = (20..200)
        .map(sentences)
        .find_map(|book| {
            let split = splitter.split(&book).unwrap();
            let all_summarized = split.iter().all(|section| counter.count(section) >= TARGET);
            let folded = vec![wrap_summary("Gregor."); split.len()].join("\n\n");
            (counter.count(&book) > ROOM && all_summarized && counter.count(&folded) < TARGET)
                .then_some((book, split.len()))
        })
        .unwrap();

    let summary = summarizer.summarize(&book).await.unwrap();

    assert_eq!(summary.stats.sections as usize, sections);
    assert_eq!(summary.stats.completion_calls as usize, sections);
    assert_eq!(chat_requests(&server).await.len(), sections);
    assert_eq!(summary.text, vec!["Gregor."; sections].join("\n\n"));
}

#[tokio::test]
async fn short_book_needs_no_api_calls() {
    let server = MockServer::start().await;
    mount_book(&server, "One morning, Gregor Samsa woke.").await;
    mount_chat_response(&server, "unused").await;

    let book = fetch_book(&server).await;
    let summary = summarizer(&server).summarize(&book).await.unwrap();

    assert_eq!(summary.text, book);
    assert_eq!(summary.stats.completion_calls, 0);
    assert!(chat_requests(&server).await.is_empty());
}

#[tokio::test]
async fn persistent_api_failure_exhausts_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(3)
        .mount(&server)
        .await;

    let err = summarizer(&server)
        .summarize(&sentences(8))
        .await
        .unwrap_err();

    match err {
        SummarizeError::ExhaustedRetries(exhausted) => {
            assert_eq!(exhausted.attempts, 3);
            assert!(exhausted.last_error.to_string().contains("500"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_chat_response(&server, "Gregor is a bug.").await;

    let summary = summarizer(&server).summarize(&sentences(8)).await.unwrap();

    assert_eq!(summary.text, "Gregor is a bug.");
    assert_eq!(summary.stats.completion_calls, 1);
    assert_eq!(chat_requests(&server).await.len(), 3);
}

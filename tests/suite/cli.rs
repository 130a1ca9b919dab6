//! End-to-end runs of the `brif` binary against mock servers.

use std::path::Path;
use std::process::{Command, Output};

use wiremock::MockServer;

use crate::common::{BOOK_PATH, chat_requests, mount_book, mount_chat_response, sentences};

fn write_config(home: &Path, server: &MockServer, target: u32) {
    let dir = home.join(".brif");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        format!(
            "[app]\n\
             target_summary_tokens = {target}\n\
             \n\
             [openai]\n\
             base_url = \"{}\"\n\
             timeout_secs = 5\n",
            server.uri()
        ),
    )
    .unwrap();
}

/// Run the binary with a clean environment rooted at `home`.
async fn run_brif(home: &Path, envs: Vec<(&'static str, String)>) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_brif"));
    command
        .env_clear()
        .env("HOME", home)
        .envs(envs);
    tokio::task::spawn_blocking(move || command.output().unwrap())
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn prints_counts_price_and_final_summary() {
    let server = MockServer::start().await;
    mount_book(&server, &sentences(20)).await;
    mount_chat_response(&server, "Gregor [[[wakes]]] as an insect.").await;

    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, 20);

    let output = run_brif(
        home.path(),
        vec![
            ("OPENAI_API_KEY", "sk-test".to_string()),
            ("BRIF_SOURCE_URL", format!("{}{BOOK_PATH}", server.uri())),
        ],
    )
    .await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.starts_with("brif v"));
    assert!(stdout.contains("Divided into parts of length:"));
    assert!(stdout.contains("Text contains "));
    assert!(stdout.contains(" tokens\n"));
    assert!(stdout.contains("The approximate price of this summary is on the order of: $"));
    assert!(stdout.ends_with("final summary:\nGregor wakes as an insect.\n"));

    // Logging is off outside RUN_MODE=dev.
    assert!(output.stderr.is_empty());

    assert_eq!(chat_requests(&server).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dev_run_mode_logs_to_stderr() {
    let server = MockServer::start().await;
    mount_book(&server, "A short book.").await;

    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, 1000);

    let output = run_brif(
        home.path(),
        vec![
            ("OPENAI_API_KEY", "sk-test".to_string()),
            ("BRIF_SOURCE_URL", format!("{}{BOOK_PATH}", server.uri())),
            ("RUN_MODE", "dev".to_string()),
        ],
    )
    .await;

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Starting brif"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("final summary:\n\nA short book.\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_api_key_fails_before_network() {
    let server = MockServer::start().await;
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, 1000);

    let output = run_brif(
        home.path(),
        vec![("BRIF_SOURCE_URL", format!("{}{BOOK_PATH}", server.uri()))],
    )
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {stderr}");
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn source_without_markers_is_fatal() {
    let server = MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("no markers here"))
        .mount(&server)
        .await;
    mount_chat_response(&server, "unused").await;

    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), &server, 1000);

    let output = run_brif(
        home.path(),
        vec![
            ("OPENAI_API_KEY", "sk-test".to_string()),
            ("BRIF_SOURCE_URL", format!("{}{BOOK_PATH}", server.uri())),
        ],
    )
    .await;

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("final summary:"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to extract book body"), "stderr: {stderr}");
    assert!(chat_requests(&server).await.is_empty());
}

//! brif - summarize a book of any length with a fixed-context model.
//!
//! ```text
//! main() -> BrifConfig::load() -> RunSettings::resolve()
//!        -> SourceFetcher::fetch_text() -> extract_gutenberg_body()
//!        -> Summarizer::new(RetryingClient<OpenAIClient>, TokenCounter)
//!        -> Summarizer::summarize() -> stdout
//! ```
//!
//! Logging is off unless `RUN_MODE=dev`, in which case it goes to stderr at
//! `info` (or whatever `RUST_LOG` asks for). Results always go to stdout.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use brif_config::{BrifConfig, RunSettings, dev_mode_from};
use brif_context::{
    ModelLimits, ModelLimitsSource, ModelRegistry, Summarizer, SummarizerConfig, TokenCounter,
    Tokenizer,
};
use brif_providers::openai::OpenAIClient;
use brif_providers::retry::{RetryConfig, RetryingClient, UniformBackoff};
use brif_webfetch::{SourceConfig, SourceFetcher, extract_gutenberg_body};

const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

fn init_tracing(dev_mode: bool) {
    let env_filter = if dev_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("off")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true),
        )
        .with(env_filter)
        .init();
}

/// Context window for the configured model, honoring a configured override.
fn context_window(settings: &RunSettings) -> u32 {
    let mut registry = ModelRegistry::new();
    if let Some(window) = settings.context_window {
        registry.set_override(settings.model.clone(), ModelLimits::new(window));
    }

    let resolved = registry.get(&settings.model);
    if resolved.source() == ModelLimitsSource::DefaultFallback {
        tracing::warn!(
            model = %settings.model,
            context_window = resolved.limits().context_window(),
            "Unknown model; assuming default context window"
        );
    }
    resolved.limits().context_window()
}

async fn run(settings: &RunSettings) -> Result<()> {
    println!("brif {VERSION}");

    let fetcher =
        SourceFetcher::new(&SourceConfig::default()).context("failed to build HTTP client")?;
    let raw = fetcher
        .fetch_text(&settings.source_url)
        .await
        .context("failed to fetch book text")?;
    let book = extract_gutenberg_body(&raw).context("failed to extract book body")?;

    println!("Divided into parts of length:");
    for length in &book.part_lengths {
        println!("{length}");
    }

    let tokenizer = TokenCounter::for_model(&settings.model)?;
    let tokens = tokenizer.count(&book.body);
    println!("Text contains {} characters", book.body.chars().count());
    println!("Text contains {tokens} tokens");
    println!(
        "The approximate price of this summary is on the order of: ${:.6}",
        settings.estimated_price(tokens)
    );

    let client = OpenAIClient::new(
        settings.api_key.clone(),
        &settings.openai_base_url,
        settings.openai_timeout,
    )
    .context("failed to build completion client")?;
    let client = RetryingClient::new(client)
        .with_config(RetryConfig {
            max_attempts: settings.max_attempts,
        })
        .with_backoff(UniformBackoff::new(
            settings.min_backoff_secs,
            settings.max_backoff_secs,
        ));

    let config = SummarizerConfig {
        model: settings.model.clone(),
        target_summary_tokens: settings.target_summary_tokens,
        delimiter: settings.delimiter.clone(),
        max_depth: settings.max_depth,
    };
    let summarizer = Summarizer::new(client, tokenizer, config, context_window(settings))
        .context("model context is too small for the requested summary size")?;

    let summary = summarizer
        .summarize(&book.body)
        .await
        .context("summarization failed")?;

    println!("final summary:\n{}", summary.text);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing(dev_mode_from(std::env::var("RUN_MODE").ok().as_deref()));
    tracing::info!(version = VERSION, "Starting brif");

    let config = BrifConfig::load()?;
    let settings = RunSettings::resolve(config.as_ref())?;

    run(&settings).await
}

//! Recursive token-budget summarization.
//!
//! One reduce step looks at the token count of its text and picks the first
//! case that applies:
//!
//! 1. **Already small** (`< target_summary_tokens`): returned unchanged, no
//!    model call. This is the only way recursion ends.
//! 2. **Fits one call** (`<= budget`): one retried completion.
//! 3. **Too large**: split into sections, reduce each section one level
//!    deeper, wrap each model-produced result in `[[[ ... ]]]`, join with a
//!    blank line and reduce the joined text again.
//!
//! Case 3 relies on the model shrinking its input. A model that ignores the
//! size request would recurse forever, so every step carries its depth and
//! fails with [`SummarizeError::DepthExceeded`] past `max_depth`.
//!
//! Sections are reduced one at a time, depth first.

use std::future::Future;
use std::pin::Pin;

use brif_providers::retry::{ExhaustedRetries, RetryingClient};
use brif_providers::{CompletionClient, CompletionRequest};
use brif_types::{TokenBudget, TokenBudgetError};
use thiserror::Error;

use crate::budget::compute_input_budget;
use crate::prompt::{strip_summary_markers, summary_prompt, wrap_summary};
use crate::splitter::SectionSplitter;
use crate::token_counter::{TokenizationError, Tokenizer};

pub const DEFAULT_TARGET_SUMMARY_TOKENS: u32 = 1000;
pub const DEFAULT_DELIMITER: &str = ".";
pub const DEFAULT_MAX_DEPTH: u32 = 32;

/// Joins reduced sections into the next candidate document.
const SECTION_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error(transparent)]
    Configuration(#[from] TokenBudgetError),
    #[error(transparent)]
    Tokenization(#[from] TokenizationError),
    #[error(transparent)]
    ExhaustedRetries(#[from] ExhaustedRetries),
    #[error("summarization reached depth {depth}, over the limit of {max_depth}")]
    DepthExceeded { depth: u32, max_depth: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizerConfig {
    /// Model id sent with every completion request.
    pub model: String,
    /// Requested summary size; also the `max_tokens` of each request.
    pub target_summary_tokens: u32,
    /// Where sections may be cut. Empty means "anywhere" (hard slices only).
    pub delimiter: String,
    pub max_depth: u32,
}

impl SummarizerConfig {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            target_summary_tokens: DEFAULT_TARGET_SUMMARY_TOKENS,
            delimiter: DEFAULT_DELIMITER.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Counters collected over one `summarize` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStats {
    /// Successful completion calls (retries not included).
    pub completion_calls: u32,
    /// Sections produced by every split.
    pub sections: u32,
    pub max_depth_reached: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub stats: SummaryStats,
}

type ReduceFut<'a> = Pin<Box<dyn Future<Output = Result<String, SummarizeError>> + Send + 'a>>;

/// Summarizes documents of any length into `target_summary_tokens`.
///
/// Holds no state between calls: the same input always takes the same path.
#[derive(Debug)]
pub struct Summarizer<C, T> {
    client: RetryingClient<C>,
    tokenizer: T,
    config: SummarizerConfig,
    budget: TokenBudget,
}

impl<C: CompletionClient, T: Tokenizer> Summarizer<C, T> {
    /// Derive the input budget from `context_window` and build a summarizer.
    pub fn new(
        client: RetryingClient<C>,
        tokenizer: T,
        config: SummarizerConfig,
        context_window: u32,
    ) -> Result<Self, SummarizeError> {
        let budget =
            compute_input_budget(&tokenizer, context_window, config.target_summary_tokens)?;
        Ok(Self::with_budget(client, tokenizer, config, budget))
    }

    pub fn with_budget(
        client: RetryingClient<C>,
        tokenizer: T,
        config: SummarizerConfig,
        budget: TokenBudget,
    ) -> Self {
        Self {
            client,
            tokenizer,
            config,
            budget,
        }
    }

    #[must_use]
    pub const fn budget(&self) -> TokenBudget {
        self.budget
    }

    #[must_use]
    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    /// Reduce `text` to at most the target size.
    ///
    /// Text already under the target comes back untouched. Otherwise the
    /// result has every `[[[`/`]]]` marker removed. Any exhausted retry aborts
    /// the whole operation; there is no partial result.
    pub async fn summarize(&self, text: &str) -> Result<Summary, SummarizeError> {
        let mut stats = SummaryStats::default();
        let reduced = self.reduce(text.to_string(), 0, &mut stats).await?;

        let text = if stats.completion_calls == 0 {
            reduced
        } else {
            strip_summary_markers(&reduced)
        };

        tracing::info!(
            completion_calls = stats.completion_calls,
            sections = stats.sections,
            max_depth = stats.max_depth_reached,
            "Summarization complete"
        );

        Ok(Summary { text, stats })
    }

    /// One summarization request for `text`, retried per the client's policy.
    pub async fn complete_with_retry(&self, text: &str) -> Result<String, ExhaustedRetries> {
        let request = CompletionRequest::new(
            self.config.model.clone(),
            summary_prompt(text, self.config.target_summary_tokens),
            self.config.target_summary_tokens,
        );
        let completion = self.client.complete(&request).await?;
        Ok(completion.content)
    }

    fn reduce<'a>(
        &'a self,
        text: String,
        depth: u32,
        stats: &'a mut SummaryStats,
    ) -> ReduceFut<'a> {
        Box::pin(async move {
            let tokens = self.tokenizer.count(&text);
            let target = self.config.target_summary_tokens;

            if tokens < target {
                tracing::debug!(depth, tokens, target, "Text already under target");
                return Ok(text);
            }

            if depth > self.config.max_depth {
                return Err(SummarizeError::DepthExceeded {
                    depth,
                    max_depth: self.config.max_depth,
                });
            }
            stats.max_depth_reached = stats.max_depth_reached.max(depth);

            if tokens <= self.budget.as_u32() {
                tracing::debug!(depth, tokens, "Summarizing in one call");
                let summary = self.complete_with_retry(&text).await?;
                stats.completion_calls += 1;
                return Ok(summary);
            }

            let sections = SectionSplitter::new(
                &self.tokenizer,
                self.budget,
                &self.config.delimiter,
                target,
            )
            .split(&text)?;

            tracing::info!(
                depth,
                tokens,
                sections = sections.len(),
                "Text over budget; summarizing sections"
            );
            stats.sections += u32::try_from(sections.len()).unwrap_or(u32::MAX);

            let mut summaries = Vec::with_capacity(sections.len());
            for section in sections {
                let calls_before = stats.completion_calls;
                let summary = self.reduce(section, depth + 1, stats).await?;
                // Sections that were already small come back as source text.
                if stats.completion_calls > calls_before {
                    summaries.push(wrap_summary(&summary));
                } else {
                    summaries.push(summary);
                }
            }

            self.reduce(summaries.join(SECTION_SEPARATOR), depth + 1, stats)
                .await
        })
    }
}

//! Token budgeting and recursive summarization.
//!
//! # Architecture
//!
//! ```text
//! Summarizer
//! ├── client: RetryingClient<C> (bounded retry around a CompletionClient)
//! ├── tokenizer: T: Tokenizer (TokenCounter in production)
//! ├── budget: TokenBudget (context window - prompt overhead - target)
//! └── SectionSplitter (per reduce step, cuts text on a delimiter)
//! ```
//!
//! The context window comes from [`ModelRegistry`] and the tokenizer from
//! [`TokenCounter::for_model`], so both follow the model id.

mod budget;
mod model_limits;
mod prompt;
mod splitter;
mod summarizer;
mod token_counter;

#[cfg(test)]
mod test_support;

pub use budget::compute_input_budget;
pub use model_limits::{ModelLimits, ModelLimitsSource, ModelRegistry, ResolvedModelLimits};
pub use prompt::{
    SUMMARY_CLOSE, SUMMARY_OPEN, prompt_overhead, strip_summary_markers, summary_prompt,
    wrap_summary,
};
pub use splitter::{SectionSplitter, Split, SplitBoundary};
pub use summarizer::{
    DEFAULT_DELIMITER, DEFAULT_MAX_DEPTH, DEFAULT_TARGET_SUMMARY_TOKENS, SummarizeError,
    Summarizer, SummarizerConfig, Summary, SummaryStats,
};
pub use token_counter::{Encoding, TokenCounter, TokenId, TokenizationError, Tokenizer};

//! Input budget derivation.
//!
//! `budget = context_window - (prompt_overhead + target_summary_tokens)`, where
//! the overhead is measured from the same prompt template every call uses.
//! Recompute whenever the model, tokenizer or target size changes.

use brif_types::{TokenBudget, TokenBudgetError};

use crate::prompt::prompt_overhead;
use crate::token_counter::Tokenizer;

pub fn compute_input_budget<T: Tokenizer + ?Sized>(
    tokenizer: &T,
    context_window: u32,
    target_summary_tokens: u32,
) -> Result<TokenBudget, TokenBudgetError> {
    let overhead = prompt_overhead(tokenizer, target_summary_tokens);
    let budget = TokenBudget::derive(context_window, overhead, target_summary_tokens)?;

    tracing::info!(
        context_window,
        prompt_overhead = overhead,
        target_summary_tokens,
        budget = budget.as_u32(),
        "Derived summary input budget"
    );

    Ok(budget)
}

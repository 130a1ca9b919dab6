//! Input token budget invariant type.
//!
//! A [`TokenBudget`] is the maximum number of tokens a unit of text may occupy
//! as model input. It is positive by construction.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenBudgetError {
    #[error(
        "context window of {context_window} tokens is too small: prompt overhead \
         ({prompt_overhead}) plus target summary size ({target_summary_tokens}) leaves no input budget"
    )]
    NonPositive {
        context_window: u32,
        prompt_overhead: u32,
        target_summary_tokens: u32,
    },
}

/// Validated, strictly positive input token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenBudget(u32);

impl TokenBudget {
    /// `context_window - (prompt_overhead + target_summary_tokens)`, rejecting
    /// combinations that leave zero or fewer tokens for input.
    pub fn derive(
        context_window: u32,
        prompt_overhead: u32,
        target_summary_tokens: u32,
    ) -> Result<Self, TokenBudgetError> {
        let reserved = u64::from(prompt_overhead) + u64::from(target_summary_tokens);
        match u64::from(context_window).checked_sub(reserved) {
            Some(remaining) if remaining > 0 => {
                Ok(Self(u32::try_from(remaining).unwrap_or(u32::MAX)))
            }
            _ => Err(TokenBudgetError::NonPositive {
                context_window,
                prompt_overhead,
                target_summary_tokens,
            }),
        }
    }

    /// Wraps an already-known budget. Returns `None` for zero.
    #[must_use]
    pub const fn new(tokens: u32) -> Option<Self> {
        if tokens == 0 { None } else { Some(Self(tokens)) }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TokenBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} tokens", self.0)
    }
}

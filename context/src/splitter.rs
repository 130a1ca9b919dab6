//! Token-budgeted section splitting.
//!
//! Text is cut along a delimiter (sentences, for `.`) so that each emitted
//! section, together with the fixed prompt overhead, stays under the input
//! budget. Empty and whitespace-only segments are dropped and never count
//! toward the budget.
//!
//! Boundary cases, by the index `i` of the first segment that would reach
//! the budget:
//!
//! | `i` | Emitted section | Remainder |
//! |-----|-----------------|-----------|
//! | 0 | first `budget` tokens of the text (hard slice) | every character after that span |
//! | 1 | segment 0 plus a trailing delimiter | segments `1..` |
//! | 2+ | segments `0..i-1` | segments `i-1..` (the last fitting segment is pushed back) |
//! | none | the whole text, unchanged | empty |
//!
//! When no segment reaches the budget but the whole text, whitespace
//! included, still does, the text is hard-sliced as in the `i = 0` case.

use brif_types::TokenBudget;

use crate::prompt::prompt_overhead;
use crate::token_counter::{TokenizationError, Tokenizer};

/// A character can span at most 4 bytes, so a token span that ends inside one
/// becomes decodable after dropping at most 3 trailing tokens.
const MAX_BOUNDARY_BACKOFF: usize = 3;

/// Which rule produced a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitBoundary {
    /// The text fit; emitted unchanged.
    Whole,
    /// No delimiter fell inside the budget; cut at a token boundary.
    HardSlice,
    /// Only the first segment fit.
    SingleSegment,
    /// This many segments were emitted.
    Segments(usize),
}

/// One step of splitting: a section and what is left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub section: String,
    pub remainder: String,
    pub boundary: SplitBoundary,
}

#[derive(Debug)]
pub struct SectionSplitter<'a, T: ?Sized> {
    tokenizer: &'a T,
    budget: TokenBudget,
    delimiter: &'a str,
    base_overhead: u32,
}

impl<'a, T: Tokenizer + ?Sized> SectionSplitter<'a, T> {
    /// Splitter whose base overhead is the prompt template cost for
    /// `target_summary_tokens`.
    pub fn new(
        tokenizer: &'a T,
        budget: TokenBudget,
        delimiter: &'a str,
        target_summary_tokens: u32,
    ) -> Self {
        let base_overhead = prompt_overhead(tokenizer, target_summary_tokens);
        Self::with_base_overhead(tokenizer, budget, delimiter, base_overhead)
    }

    pub fn with_base_overhead(
        tokenizer: &'a T,
        budget: TokenBudget,
        delimiter: &'a str,
        base_overhead: u32,
    ) -> Self {
        Self {
            tokenizer,
            budget,
            delimiter,
            base_overhead,
        }
    }

    #[must_use]
    pub const fn base_overhead(&self) -> u32 {
        self.base_overhead
    }

    /// Split `text` into sections in order, until nothing remains.
    pub fn split(&self, text: &str) -> Result<Vec<String>, TokenizationError> {
        let mut sections = Vec::new();
        let mut rest = text.to_string();

        while !rest.is_empty() {
            let Split {
                section,
                remainder,
                boundary,
            } = self.take_section(&rest)?;
            tracing::debug!(
                section = sections.len(),
                ?boundary,
                section_chars = section.len(),
                remainder_chars = remainder.len(),
                "Emitted section"
            );
            sections.push(section);
            rest = remainder;
        }

        Ok(sections)
    }

    /// Emit the next section of `text` and return the rest.
    pub fn take_section(&self, text: &str) -> Result<Split, TokenizationError> {
        let segments = self.segments(text);
        let budget = u64::from(self.budget.as_u32());
        let mut running = u64::from(self.base_overhead);

        for (i, segment) in segments.iter().enumerate() {
            let cost = u64::from(self.tokenizer.count(&format!("{segment}{}", self.delimiter)));

            if running + cost >= budget {
                return match i {
                    0 => self.hard_slice(text),
                    1 => Ok(Split {
                        section: format!("{}{}", segments[0], self.delimiter),
                        remainder: segments[1..].join(self.delimiter),
                        boundary: SplitBoundary::SingleSegment,
                    }),
                    _ => Ok(Split {
                        section: segments[..i - 1].join(self.delimiter),
                        remainder: segments[i - 1..].join(self.delimiter),
                        boundary: SplitBoundary::Segments(i - 1),
                    }),
                };
            }

            running += cost;
        }

        // Dropped whitespace segments still cost tokens when the text is sent.
        let whole = u64::from(self.tokenizer.count(text)) + u64::from(self.base_overhead);
        if whole >= budget {
            return self.hard_slice(text);
        }

        Ok(Split {
            section: text.to_string(),
            remainder: String::new(),
            boundary: SplitBoundary::Whole,
        })
    }

    fn segments<'t>(&self, text: &'t str) -> Vec<&'t str> {
        if self.delimiter.is_empty() {
            return if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![text]
            };
        }
        text.split(self.delimiter)
            .filter(|segment| !segment.trim().is_empty())
            .collect()
    }

    /// First `budget` tokens of `text`, decoded back to characters. The
    /// remainder is located by character position in the original string.
    fn hard_slice(&self, text: &str) -> Result<Split, TokenizationError> {
        let ids = self.tokenizer.encode(text);
        let take = self.budget.as_usize();

        if ids.len() <= take {
            return Ok(Split {
                section: text.to_string(),
                remainder: String::new(),
                boundary: SplitBoundary::Whole,
            });
        }

        let mut end = take;
        let chunk = loop {
            match self.tokenizer.decode(&ids[..end]) {
                Ok(chunk) if !chunk.is_empty() => break chunk,
                Ok(_) => return Err(TokenizationError::NotAPrefix),
                Err(err) => {
                    if take - end >= MAX_BOUNDARY_BACKOFF || end <= 1 {
                        return Err(err);
                    }
                    end -= 1;
                }
            }
        };

        let remainder = text
            .strip_prefix(chunk.as_str())
            .ok_or(TokenizationError::NotAPrefix)?;

        tracing::debug!(
            tokens = end,
            chars = chunk.len(),
            "No delimiter inside budget; cut at token boundary"
        );

        Ok(Split {
            remainder: remainder.to_string(),
            section: chunk,
            boundary: SplitBoundary::HardSlice,
        })
    }
}

//! Bounded completion retry with randomized backoff.
//!
//! # Retry Policy
//!
//! - Max attempts: 3 (initial call + 2 retries)
//! - Backoff: uniform whole seconds in `[1, 4]` between attempts
//! - No sleep after the final attempt
//! - Every failure is retried the same way; there is no retryable /
//!   non-retryable distinction and no exponential growth
//!
//! The backoff source is injected through [`Backoff`] so tests can run with
//! [`FixedBackoff`] and no real delay.

use std::time::Duration;

use thiserror::Error;

use crate::{Completion, CompletionClient, CompletionError, CompletionRequest};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MIN_BACKOFF_SECS: u64 = 1;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 4;

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first call.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryConfig {
    /// Zero is treated as one: a wrapper always makes at least one call.
    #[must_use]
    pub const fn effective_attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }
}

/// Chooses how long to wait before the next attempt.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Uniformly random whole-second delay in `[min_secs, max_secs]`.
///
/// Draws from the thread-local generator, which is seeded once from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBackoff {
    min_secs: u64,
    max_secs: u64,
}

impl UniformBackoff {
    /// Bounds are reordered if given backwards.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    #[must_use]
    pub const fn bounds(&self) -> (u64, u64) {
        (self.min_secs, self.max_secs)
    }
}

impl Default for UniformBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BACKOFF_SECS, DEFAULT_MAX_BACKOFF_SECS)
    }
}

impl Backoff for UniformBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::from_secs(rand::random_range(self.min_secs..=self.max_secs))
    }
}

/// Constant delay. `FixedBackoff(Duration::ZERO)` disables waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff(pub Duration);

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Every attempt failed.
#[derive(Debug, Error)]
#[error("completion failed after {attempts} attempts: {last_error}")]
pub struct ExhaustedRetries {
    pub attempts: u32,
    #[source]
    pub last_error: CompletionError,
}

/// Wraps a [`CompletionClient`] with bounded retry.
pub struct RetryingClient<C> {
    client: C,
    config: RetryConfig,
    backoff: Box<dyn Backoff>,
}

impl<C> std::fmt::Debug for RetryingClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: CompletionClient> RetryingClient<C> {
    /// Default policy: 3 attempts, 1-4 s uniform backoff.
    pub fn new(client: C) -> Self {
        Self {
            client,
            config: RetryConfig::default(),
            backoff: Box::new(UniformBackoff::default()),
        }
    }

    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> RetryConfig {
        self.config
    }

    /// Call the wrapped client until it succeeds or attempts run out.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, ExhaustedRetries> {
        let max_attempts = self.config.effective_attempts();
        let mut attempt = 1;

        loop {
            match self.client.complete(request).await {
                Ok(completion) => return Ok(completion),
                Err(error) => {
                    tracing::warn!(attempt, max_attempts, %error, "Completion request failed");

                    if attempt >= max_attempts {
                        return Err(ExhaustedRetries {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = self.backoff.delay(attempt);
                    tracing::info!(
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        "Sleeping before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

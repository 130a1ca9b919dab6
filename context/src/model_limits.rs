//! Model context windows and registry.
//!
//! [`ModelRegistry`] resolves the context window for a model id with an
//! explicit override, then prefix matching, then a default fallback. The
//! source of the answer is reported so callers can log when they are
//! running on a guess.

use std::collections::HashMap;

/// Token limits for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    /// Total tokens shared by prompt and completion.
    context_window: u32,
}

impl ModelLimits {
    #[must_use]
    pub const fn new(context_window: u32) -> Self {
        Self { context_window }
    }

    #[must_use]
    pub const fn context_window(&self) -> u32 {
        self.context_window
    }
}

/// Where model limits came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLimitsSource {
    /// Exact match from an override.
    Override,
    /// Matched a known prefix (the matched prefix).
    Prefix(&'static str),
    /// Fell back to `DEFAULT_LIMITS` because no match was found.
    DefaultFallback,
}

/// Result of looking up model limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedModelLimits {
    limits: ModelLimits,
    source: ModelLimitsSource,
}

impl ResolvedModelLimits {
    #[must_use]
    pub const fn new(limits: ModelLimits, source: ModelLimitsSource) -> Self {
        Self { limits, source }
    }

    #[must_use]
    pub const fn limits(self) -> ModelLimits {
        self.limits
    }

    #[must_use]
    pub const fn source(self) -> ModelLimitsSource {
        self.source
    }
}

/// Default fallback limits for unknown models (the `gpt-3.5-turbo` window).
const DEFAULT_LIMITS: ModelLimits = ModelLimits::new(4097);

/// Known model prefixes and their limits, most specific first.
const KNOWN_MODELS: &[(&str, ModelLimits)] = &[
    ("gpt-3.5-turbo-16k", ModelLimits::new(16_385)),
    ("gpt-3.5-turbo-instruct", ModelLimits::new(4_096)),
    ("gpt-3.5-turbo-1106", ModelLimits::new(16_385)),
    ("gpt-3.5-turbo-0125", ModelLimits::new(16_385)),
    ("gpt-3.5-turbo", ModelLimits::new(4_097)),
    ("gpt-4-32k", ModelLimits::new(32_768)),
    ("gpt-4-turbo", ModelLimits::new(128_000)),
    ("gpt-4o", ModelLimits::new(128_000)),
    ("gpt-4.1", ModelLimits::new(1_047_576)),
    ("gpt-4", ModelLimits::new(8_192)),
];

/// Registry of known model limits with support for custom overrides.
///
/// ```
/// use brif_context::{ModelLimitsSource, ModelRegistry};
///
/// let registry = ModelRegistry::new();
/// let resolved = registry.get("gpt-3.5-turbo-0613");
/// assert_eq!(resolved.limits().context_window(), 4097);
/// assert_eq!(resolved.source(), ModelLimitsSource::Prefix("gpt-3.5-turbo"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    overrides: HashMap<String, ModelLimits>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup order: exact override, known prefix, default fallback.
    #[must_use]
    pub fn get(&self, model: &str) -> ResolvedModelLimits {
        if let Some(limits) = self.overrides.get(model) {
            return ResolvedModelLimits::new(*limits, ModelLimitsSource::Override);
        }

        let normalized = model.trim().to_ascii_lowercase();
        for (prefix, limits) in KNOWN_MODELS {
            if normalized.starts_with(prefix) {
                return ResolvedModelLimits::new(*limits, ModelLimitsSource::Prefix(prefix));
            }
        }

        ResolvedModelLimits::new(DEFAULT_LIMITS, ModelLimitsSource::DefaultFallback)
    }

    /// Overrides take precedence over prefix matching for exact matches.
    pub fn set_override(&mut self, model: impl Into<String>, limits: ModelLimits) {
        self.overrides.insert(model.into(), limits);
    }

    pub fn remove_override(&mut self, model: &str) -> Option<ModelLimits> {
        self.overrides.remove(model)
    }

    #[must_use]
    pub fn has_override(&self, model: &str) -> bool {
        self.overrides.contains_key(model)
    }
}

//! Configuration for brif runs.
//!
//! Settings come from three layers, lowest precedence first:
//!
//! 1. Built-in defaults (the original Metamorphosis demo)
//! 2. `~/.brif/config.toml`, with `${VAR}` expansion in string values
//! 3. Environment: `OPENAI_API_KEY`, `BRIF_MODEL`, `BRIF_SOURCE_URL`
//!
//! `RUN_MODE=dev` is read separately by [`dev_mode_from`], before anything
//! else, so logging is set up before configuration errors can occur.
//!
//! [`BrifConfig`] mirrors the file; [`RunSettings`] is the resolved,
//! validated result the binary runs with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use brif_context::{DEFAULT_DELIMITER, DEFAULT_MAX_DEPTH, DEFAULT_TARGET_SUMMARY_TOKENS};
use brif_providers::OPENAI_API_BASE_URL;
use brif_providers::retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_SECS, DEFAULT_MIN_BACKOFF_SECS,
};
use brif_types::ApiKey;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SOURCE_URL: &str = "https://www.gutenberg.org/cache/epub/64317/pg64317.txt";
pub const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.002;
pub const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 120;

/// `RUN_MODE` value that turns logging on.
pub const RUN_MODE_DEV: &str = "dev";

#[derive(Debug, Default, Deserialize)]
pub struct BrifConfig {
    pub app: Option<AppConfig>,
    pub api_keys: Option<ApiKeys>,
    pub openai: Option<OpenAIConfig>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub model: Option<String>,
    pub source_url: Option<String>,
    pub target_summary_tokens: Option<u32>,
    pub delimiter: Option<String>,
    pub max_depth: Option<u32>,
    /// USD per 1000 input tokens, for the printed estimate.
    pub cost_per_1k_tokens: Option<f64>,
    /// Overrides the context window known for `model`.
    pub context_window: Option<u32>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub openai: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let openai = if self.openai.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("ApiKeys").field("openai", &openai).finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAIConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub min_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
}

/// Replace each `${VAR}` with `lookup(VAR)` (empty when unset).
/// An unclosed `${` is kept as written.
fn expand_vars_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &after[..end];
        if !name.is_empty() {
            out.push_str(&lookup(name).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl BrifConfig {
    /// Load `~/.brif/config.toml`. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".brif").join("config.toml"))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("no OpenAI API key: set OPENAI_API_KEY or [api_keys].openai in the config file")]
    MissingApiKey,
    #[error("target_summary_tokens must be greater than zero")]
    ZeroTarget,
    #[error("retry.max_attempts must be greater than zero")]
    ZeroAttempts,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub model: String,
    pub source_url: String,
    pub target_summary_tokens: u32,
    pub delimiter: String,
    pub max_depth: u32,
    pub cost_per_1k_tokens: f64,
    pub context_window: Option<u32>,
    pub api_key: ApiKey,
    pub openai_base_url: String,
    pub openai_timeout: Duration,
    pub max_attempts: u32,
    pub min_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

/// Logging is only enabled for `RUN_MODE=dev`.
#[must_use]
pub fn dev_mode_from(run_mode: Option<&str>) -> bool {
    run_mode.map(str::trim) == Some(RUN_MODE_DEV)
}

impl RunSettings {
    /// Resolve against the process environment.
    pub fn resolve(config: Option<&BrifConfig>) -> Result<Self, SettingsError> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve with `env` standing in for the process environment.
    pub fn resolve_with(
        config: Option<&BrifConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let app = config.and_then(|c| c.app.as_ref());
        let openai = config.and_then(|c| c.openai.as_ref());
        let retry = config.and_then(|c| c.retry.as_ref());
        let env_nonempty = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let api_key = env_nonempty("OPENAI_API_KEY")
            .or_else(|| {
                config
                    .and_then(|c| c.api_keys.as_ref())
                    .and_then(|keys| keys.openai.as_deref())
                    .map(|raw| expand_vars_with(raw, &env))
            })
            .and_then(ApiKey::new)
            .ok_or(SettingsError::MissingApiKey)?;

        let model = env_nonempty("BRIF_MODEL")
            .or_else(|| app.and_then(|a| a.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let source_url = env_nonempty("BRIF_SOURCE_URL")
            .or_else(|| {
                app.and_then(|a| a.source_url.as_deref())
                    .map(|raw| expand_vars_with(raw, &env))
            })
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());

        let target_summary_tokens = app
            .and_then(|a| a.target_summary_tokens)
            .unwrap_or(DEFAULT_TARGET_SUMMARY_TOKENS);
        if target_summary_tokens == 0 {
            return Err(SettingsError::ZeroTarget);
        }

        let max_attempts = retry
            .and_then(|r| r.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(SettingsError::ZeroAttempts);
        }

        let openai_base_url = openai
            .and_then(|o| o.base_url.as_deref())
            .map(|raw| expand_vars_with(raw, &env))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| OPENAI_API_BASE_URL.to_string());

        Ok(Self {
            model,
            source_url,
            target_summary_tokens,
            delimiter: app
                .and_then(|a| a.delimiter.clone())
                .unwrap_or_else(|| DEFAULT_DELIMITER.to_string()),
            max_depth: app.and_then(|a| a.max_depth).unwrap_or(DEFAULT_MAX_DEPTH),
            cost_per_1k_tokens: app
                .and_then(|a| a.cost_per_1k_tokens)
                .unwrap_or(DEFAULT_COST_PER_1K_TOKENS),
            context_window: app.and_then(|a| a.context_window),
            api_key,
            openai_base_url,
            openai_timeout: Duration::from_secs(
                openai
                    .and_then(|o| o.timeout_secs)
                    .unwrap_or(DEFAULT_OPENAI_TIMEOUT_SECS),
            ),
            max_attempts,
            min_backoff_secs: retry
                .and_then(|r| r.min_backoff_secs)
                .unwrap_or(DEFAULT_MIN_BACKOFF_SECS),
            max_backoff_secs: retry
                .and_then(|r| r.max_backoff_secs)
                .unwrap_or(DEFAULT_MAX_BACKOFF_SECS),
        })
    }

    /// Approximate input price for `tokens`, in USD.
    #[must_use]
    pub fn estimated_price(&self, tokens: u32) -> f64 {
        f64::from(tokens) * self.cost_per_1k_tokens / 1000.0
    }
}

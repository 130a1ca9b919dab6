//! Token counting using tiktoken.
//!
//! The encoding is chosen from the model id: OpenAI models tokenize with
//! different BPE vocabularies, so counting with the wrong one skews every
//! budget derived from it. Unknown models fall back to `cl100k_base`.
//!
//! Everything that needs token arithmetic goes through the [`Tokenizer`]
//! trait so the splitting and summarization code can be exercised with a
//! deterministic tokenizer in tests.

use std::sync::OnceLock;

use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base, o200k_base, p50k_base, r50k_base};

pub type TokenId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizationError {
    #[error("failed to initialize tiktoken {encoding} encoder")]
    EncoderInit { encoding: &'static str },
    #[error("failed to decode {tokens} tokens: {reason}")]
    Decode { tokens: usize, reason: String },
    #[error("decoded token span is not a prefix of the source text")]
    NotAPrefix,
}

/// Narrow encode/decode interface over a fixed encoding.
///
/// `decode(encode(x))` must reproduce `x`, and decoding any prefix of
/// `encode(x)` that ends on a character boundary must yield a prefix of `x`.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<TokenId>;

    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizationError>;

    fn count(&self, text: &str) -> u32 {
        u32::try_from(self.encode(text).len()).unwrap_or(u32::MAX)
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizationError> {
        (**self).decode(ids)
    }

    fn count(&self, text: &str) -> u32 {
        (**self).count(text)
    }
}

/// BPE vocabularies used by OpenAI models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
    P50kBase,
    R50kBase,
}

/// Model prefixes and their encodings, most specific first.
const MODEL_ENCODINGS: &[(&str, Encoding)] = &[
    ("gpt-4o", Encoding::O200kBase),
    ("gpt-4.1", Encoding::O200kBase),
    ("gpt-4.5", Encoding::O200kBase),
    ("gpt-5", Encoding::O200kBase),
    ("o1", Encoding::O200kBase),
    ("o3", Encoding::O200kBase),
    ("o4", Encoding::O200kBase),
    ("gpt-4", Encoding::Cl100kBase),
    ("gpt-3.5", Encoding::Cl100kBase),
    ("text-embedding-3", Encoding::Cl100kBase),
    ("text-embedding-ada-002", Encoding::Cl100kBase),
    ("text-davinci-003", Encoding::P50kBase),
    ("text-davinci-002", Encoding::P50kBase),
    ("code-davinci", Encoding::P50kBase),
    ("davinci", Encoding::R50kBase),
];

impl Encoding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
            Encoding::P50kBase => "p50k_base",
            Encoding::R50kBase => "r50k_base",
        }
    }

    /// Encoding for a model id, or `None` when no known prefix matches.
    #[must_use]
    pub fn for_model(model: &str) -> Option<Self> {
        let model = model.trim().to_ascii_lowercase();
        MODEL_ENCODINGS
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, encoding)| *encoding)
    }
}

/// Encoders are expensive to initialize (they load vocabulary data), so each
/// one is created at most once per process and shared by every counter.
fn encoder(encoding: Encoding) -> Option<&'static CoreBPE> {
    static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static P50K: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static R50K: OnceLock<Option<CoreBPE>> = OnceLock::new();

    match encoding {
        Encoding::Cl100kBase => CL100K.get_or_init(|| cl100k_base().ok()).as_ref(),
        Encoding::O200kBase => O200K.get_or_init(|| o200k_base().ok()).as_ref(),
        Encoding::P50kBase => P50K.get_or_init(|| p50k_base().ok()).as_ref(),
        Encoding::R50kBase => R50K.get_or_init(|| r50k_base().ok()).as_ref(),
    }
}

/// Thread-safe tiktoken-backed [`Tokenizer`].
///
/// # Example
///
/// ```
/// use brif_context::{TokenCounter, Tokenizer};
///
/// let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
/// let ids = counter.encode("Hello, world!");
/// assert_eq!(counter.decode(&ids).unwrap(), "Hello, world!");
/// assert_eq!(counter.count("Hello, world!") as usize, ids.len());
/// ```
#[derive(Clone, Copy)]
pub struct TokenCounter {
    encoding: Encoding,
    encoder: &'static CoreBPE,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &self.encoding.as_str())
            .finish_non_exhaustive()
    }
}

impl TokenCounter {
    pub fn new(encoding: Encoding) -> Result<Self, TokenizationError> {
        let encoder = encoder(encoding).ok_or(TokenizationError::EncoderInit {
            encoding: encoding.as_str(),
        })?;
        Ok(Self { encoding, encoder })
    }

    /// Counter for the encoding `model` uses.
    pub fn for_model(model: &str) -> Result<Self, TokenizationError> {
        let encoding = Encoding::for_model(model).unwrap_or_else(|| {
            tracing::warn!(
                model,
                fallback = Encoding::Cl100kBase.as_str(),
                "Unknown model; using fallback token encoding"
            );
            Encoding::Cl100kBase
        });
        tracing::debug!(model, encoding = encoding.as_str(), "Selected token encoding");
        Self::new(encoding)
    }

    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Tokenizer for TokenCounter {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        self.encoder.encode_ordinary(text)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizationError> {
        self.encoder
            .decode(ids.to_vec())
            .map_err(|e| TokenizationError::Decode {
                tokens: ids.len(),
                reason: e.to_string(),
            })
    }
}

//! Token counting for the assembled system message.
//!
//! Counts with the `o200k_base` byte-pair encoding (the GPT-4o family).
//! The encoder is loaded once per process. If it cannot be loaded the
//! counter falls back to a character heuristic of ~4 characters per token,
//! which is accurate within ~10% for BPE tokenizers on English text.
//!
//! The count is a budget metric only; nothing is truncated here.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;
use tracing::warn;

static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn encoder() -> Option<&'static CoreBPE> {
    ENCODER
        .get_or_init(|| match tiktoken_rs::o200k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!(error = %e, "Failed to load o200k_base encoder, estimating tokens");
                None
            }
        })
        .as_ref()
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Deterministic token counter over the reference encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    pub fn new() -> Self {
        Self
    }

    /// Number of tokens in `text`. Identical input always yields the same count.
    pub fn count(&self, text: &str) -> usize {
        match encoder() {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => estimate_tokens(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(TokenCounter::new().count(""), 0);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn heuristic_rounds_up() {
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn counting_is_deterministic() {
        let counter = TokenCounter::new();
        let text = "You are a helpful assistant.\n\n# Facts\nname: Ada";
        assert_eq!(counter.count(text), counter.count(text));
        assert!(counter.count(text) > 0);
    }

    #[test]
    fn longer_text_has_more_tokens() {
        let counter = TokenCounter::new();
        let short = counter.count("Hello");
        let long = counter.count("Hello there, how are you doing on this fine morning?");
        assert!(long > short);
    }
}

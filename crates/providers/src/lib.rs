//! LLM provider implementations for colloquy.
//!
//! All providers implement the `colloquy_core::LlmProvider` trait.
//! The router builds the configured provider from `AppConfig`.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, ResolvedProvider};

//! Error types for the colloquy domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::turn::TurnId;
use thiserror::Error;

/// The top-level error type for all colloquy operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Context errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt session data in {file}: {reason}")]
    Corrupt { file: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Turn not found: {0}")]
    NotFound(TurnId),
}

/// Failures of a `generate` call. Every variant aborts the answer pass;
/// fact extraction and self-evaluation never produce one.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Tool '{tool_name}' failed: {source}")]
    ToolExecution {
        tool_name: String,
        #[source]
        source: ToolError,
    },

    #[error("Tool invocation limit of {limit} reached in one pass")]
    ToolIterationLimit { limit: u32 },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl GenerationError {
    /// The precondition failure raised when the log does not end with a user turn.
    pub fn last_turn_not_user() -> Self {
        Self::Precondition("last turn must be a user turn".into())
    }
}

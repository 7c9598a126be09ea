//! # Colloquy Core
//!
//! Domain types, traits, and error definitions for the colloquy session
//! orchestrator. This crate has no framework dependencies: it defines the
//! model every other crate implements against.
//!
//! - [`turn`]: conversation turns and roles
//! - [`provider`]: the streaming LLM capability
//! - [`tool`]: the tool catalog and invocation capability
//! - [`session`]: facts and the persistence collaborator
//! - [`persona`]: the persona prefix of the system prompt

pub mod error;
pub mod persona;
pub mod provider;
pub mod session;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{ContextError, Error, GenerationError, ProviderError, Result, StoreError, ToolError};
pub use persona::{Persona, PersonaSource};
pub use provider::{
    Attachment, ChatMessage, ChatRole, ChunkReceiver, LlmProvider, MessageToolCall, ProviderRequest,
    StreamChunk, ToolDefinition, Usage,
};
pub use session::{FactMap, SessionPersistence, SessionSnapshot};
pub use tool::{Tool, ToolCall, ToolProvider, ToolRegistry, ToolResult};
pub use turn::{ConversationTurn, Role, TurnId};

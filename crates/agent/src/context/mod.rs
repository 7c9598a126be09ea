//! Session context: the conversation log, the facts, and the system
//! message rendered from them.

pub mod assembler;
pub mod store;
pub mod token;

pub use assembler::{AssembledPrompt, SystemMessageAssembler};
pub use store::ContextStore;
pub use token::TokenCounter;

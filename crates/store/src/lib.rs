//! Session persistence backends for colloquy.
//!
//! Backends implement `colloquy_core::SessionPersistence`:
//! - `json_file` - two pretty-printed JSON files in a session directory (default)
//! - `in_memory` - ephemeral, for tests and throwaway sessions

pub mod in_memory;
pub mod json_file;

pub use in_memory::InMemoryStore;
pub use json_file::JsonFileStore;

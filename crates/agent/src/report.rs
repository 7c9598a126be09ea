//! The outcome of one `generate` call.

use colloquy_core::provider::Usage;
use colloquy_core::turn::TurnId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Debug key under which the self-evaluation score is stored.
pub const SELF_EVALUATION_KEY: &str = "Self-Evaluation Score";

/// Transient key/value annotations produced by a generation cycle.
/// Not part of the conversation log and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugInfo(BTreeMap<String, String>);

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, overwriting any earlier value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn self_evaluation_score(&self) -> Option<&str> {
        self.get(SELF_EVALUATION_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Turns appended to the log by the answer pass, in append order
    pub appended: Vec<TurnId>,

    /// Tool invocations made during the answer pass
    pub tool_invocations: u32,

    /// Fact entries written by the fact-extraction pass
    pub facts_merged: usize,

    pub debug: DebugInfo,

    /// Provider-reported usage summed over every call
    pub usage: Usage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites() {
        let mut debug = DebugInfo::new();
        debug.set(SELF_EVALUATION_KEY, "40");
        debug.set(SELF_EVALUATION_KEY, "95");
        assert_eq!(debug.self_evaluation_score(), Some("95"));
        assert_eq!(debug.iter().count(), 1);
    }

    #[test]
    fn debug_info_serializes_flat() {
        let mut debug = DebugInfo::new();
        debug.set(SELF_EVALUATION_KEY, "80");
        let json = serde_json::to_string(&debug).unwrap();
        assert_eq!(json, r#"{"Self-Evaluation Score":"80"}"#);
    }
}

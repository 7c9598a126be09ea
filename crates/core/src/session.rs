//! Session state shared with the persistence collaborator.
//!
//! A session is one ordered turn log plus one fact map. The persistence
//! format is deliberately flat: an array of turn records and a
//! string-to-string object.

use crate::error::StoreError;
use crate::turn::ConversationTurn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable key/value facts re-injected into every system prompt.
/// Later writes for a key overwrite earlier ones.
pub type FactMap = BTreeMap<String, String>;

/// Everything persisted for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,

    #[serde(default)]
    pub facts: FactMap,
}

/// Reads session state at start-up and rewrites it after every change.
pub trait SessionPersistence: Send + Sync {
    /// A short name for diagnostics (e.g., "json_file").
    fn name(&self) -> &str;

    /// Load the stored session; missing data loads as empty.
    fn load(&self) -> std::result::Result<SessionSnapshot, StoreError>;

    /// Replace the stored session with the given state.
    fn save(&self, turns: &[ConversationTurn], facts: &FactMap) -> std::result::Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_defaults_when_fields_missing() {
        let snapshot: SessionSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.turns.is_empty());
        assert!(snapshot.facts.is_empty());
    }

    #[test]
    fn fact_map_overwrites() {
        let mut facts = FactMap::new();
        facts.insert("a".into(), "1".into());
        facts.insert("a".into(), "2".into());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts["a"], "2");
    }
}

//! In-memory backend - useful for testing and ephemeral sessions.

use colloquy_core::error::StoreError;
use colloquy_core::session::{FactMap, SessionPersistence, SessionSnapshot};
use colloquy_core::turn::ConversationTurn;
use std::sync::Mutex;

/// Keeps the last saved session in memory and counts saves.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    snapshot: SessionSnapshot,
    saves: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing session, as if it had been saved earlier.
    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            state: Mutex::new(Inner { snapshot, saves: 0 }),
        }
    }

    /// The last saved session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state
            .lock()
            .map(|s| s.snapshot.clone())
            .unwrap_or_default()
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|s| s.saves).unwrap_or_default()
    }
}

impl SessionPersistence for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn load(&self) -> Result<SessionSnapshot, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StoreError::Storage(format!("Lock poisoned: {e}")))?;
        Ok(state.snapshot.clone())
    }

    fn save(&self, turns: &[ConversationTurn], facts: &FactMap) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StoreError::Storage(format!("Lock poisoned: {e}")))?;
        state.snapshot = SessionSnapshot {
            turns: turns.to_vec(),
            facts: facts.clone(),
        };
        state.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let store = InMemoryStore::new();
        let snapshot = store.load().unwrap();
        assert!(snapshot.turns.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn save_replaces_snapshot() {
        let store = InMemoryStore::new();
        store.save(&[ConversationTurn::user("one")], &FactMap::new()).unwrap();
        store.save(&[ConversationTurn::user("two")], &FactMap::new()).unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(snapshot.turns[0].content, "two");
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn seeded_snapshot_loads() {
        let mut facts = FactMap::new();
        facts.insert("k".into(), "v".into());
        let store = InMemoryStore::with_snapshot(SessionSnapshot {
            turns: vec![ConversationTurn::user("hi")],
            facts,
        });
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.turns[0].content, "hi");
        assert_eq!(snapshot.facts["k"], "v");
    }
}

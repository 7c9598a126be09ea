//! ContextStore - the ordered conversation log plus the fact map.
//!
//! A pure state container. Optionally attached to a
//! [`SessionPersistence`] collaborator: the snapshot is loaded on attach and
//! rewritten after every mutation. Persistence failures are logged and never
//! fail the in-memory operation.

use colloquy_core::error::ContextError;
use colloquy_core::session::{FactMap, SessionPersistence, SessionSnapshot};
use colloquy_core::turn::{ConversationTurn, Role, TurnId};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
pub struct ContextStore {
    turns: Vec<ConversationTurn>,
    facts: FactMap,
    persistence: Option<Arc<dyn SessionPersistence>>,
}

impl ContextStore {
    /// An empty, unpersisted store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the session from `persistence` and keep writing back to it.
    ///
    /// When the session cannot be loaded the store starts empty and stays
    /// detached, so saving never overwrites data that was not read.
    pub fn attached(persistence: Arc<dyn SessionPersistence>) -> Self {
        let snapshot = match persistence.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    backend = persistence.name(),
                    error = %e,
                    "Failed to load session, starting empty; changes will not be saved"
                );
                return Self::new();
            }
        };
        debug!(
            backend = persistence.name(),
            turns = snapshot.turns.len(),
            facts = snapshot.facts.len(),
            "Context store attached"
        );
        Self {
            turns: snapshot.turns,
            facts: snapshot.facts,
            persistence: Some(persistence),
        }
    }

    /// All turns in append order.
    pub fn list_turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The trailing turn, if it is a user turn.
    pub fn trailing_user_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last().filter(|t| t.role == Role::User)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        debug!(turn_id = %turn.id, role = %turn.role, "Turn appended");
        self.turns.push(turn);
        self.flush();
    }

    /// Replace the turn with the same id, keeping its position.
    pub fn edit_by_id(&mut self, turn: ConversationTurn) -> Result<(), ContextError> {
        let slot = self
            .turns
            .iter_mut()
            .find(|t| t.id == turn.id)
            .ok_or(ContextError::NotFound(turn.id))?;
        *slot = turn;
        self.flush();
        Ok(())
    }

    /// Remove the turn with `id`. Returns whether anything was removed.
    pub fn delete_by_id(&mut self, id: TurnId) -> bool {
        let before = self.turns.len();
        self.turns.retain(|t| t.id != id);
        let removed = self.turns.len() != before;
        if removed {
            self.flush();
        }
        removed
    }

    /// Clear the conversation log. Facts are retained.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.flush();
    }

    pub fn facts(&self) -> &FactMap {
        &self.facts
    }

    /// Key-wise overwrite. Returns the number of entries written.
    pub fn merge_facts(&mut self, facts: FactMap) -> usize {
        let count = facts.len();
        for (key, value) in facts {
            debug!(key = %key, "Fact merged");
            self.facts.insert(key, value);
        }
        if count > 0 {
            self.flush();
        }
        count
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turns: self.turns.clone(),
            facts: self.facts.clone(),
        }
    }

    fn flush(&self) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&self.turns, &self.facts) {
                warn!(backend = persistence.name(), error = %e, "Failed to persist session");
            }
        }
    }
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("turns", &self.turns.len())
            .field("facts", &self.facts.len())
            .field("persistence", &self.persistence.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

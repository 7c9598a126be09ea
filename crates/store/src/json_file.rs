//! JSON file backend - the session as two human-inspectable files.
//!
//! Layout inside the session directory:
//!
//! - `context_history.json` - pretty JSON array of `{id, role, content, timestamp}`
//! - `facts.json` - flat `{"key": "value"}` object
//!
//! Missing files load as empty. Both files are rewritten on every save. A
//! file that does not parse is renamed to `<file>.corrupt` on load, so the
//! other file still loads and the next save never overwrites unread data.

use colloquy_core::error::StoreError;
use colloquy_core::session::{FactMap, SessionPersistence, SessionSnapshot};
use colloquy_core::turn::ConversationTurn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File holding the conversation log.
pub const HISTORY_FILE: &str = "context_history.json";

/// File holding the fact map.
pub const FACTS_FILE: &str = "facts.json";

/// A session persisted as JSON files in one directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir` as the session directory. Nothing is touched until the
    /// first load or save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn facts_path(&self) -> PathBuf {
        self.dir.join(FACTS_FILE)
    }

    fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Read `path`, setting it aside when its content does not parse.
    ///
    /// Fails only when the file cannot be read or cannot be moved out of
    /// the way.
    fn read_or_set_aside<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
        match Self::read_json(path) {
            Err(StoreError::Corrupt { file, reason }) => {
                let aside = corrupt_path(path);
                std::fs::rename(path, &aside).map_err(|e| StoreError::Corrupt {
                    file: file.clone(),
                    reason: format!("{reason}; could not move it aside: {e}"),
                })?;
                warn!(
                    file = %file,
                    moved_to = %aside.display(),
                    error = %reason,
                    "Corrupt session file set aside, starting it empty"
                );
                Ok(T::default())
            }
            other => other,
        }
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize session data: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {e}", path.display())))
    }
}

impl SessionPersistence for JsonFileStore {
    fn name(&self) -> &str {
        "json_file"
    }

    fn load(&self) -> Result<SessionSnapshot, StoreError> {
        let turns: Vec<ConversationTurn> = Self::read_or_set_aside(&self.history_path())?;
        let facts: FactMap = Self::read_or_set_aside(&self.facts_path())?;
        debug!(
            dir = %self.dir.display(),
            turns = turns.len(),
            facts = facts.len(),
            "Session loaded"
        );
        Ok(SessionSnapshot { turns, facts })
    }

    fn save(&self, turns: &[ConversationTurn], facts: &FactMap) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::Storage(format!("Failed to create session directory: {e}"))
        })?;
        Self::write_json(&self.history_path(), turns)?;
        Self::write_json(&self.facts_path(), facts)?;
        Ok(())
    }
}

/// `facts.json` -> `facts.json.corrupt`
fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::turn::Role;

    #[test]
    fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("session"));
        let snapshot = store.load().unwrap();
        assert!(snapshot.turns.is_empty());
        assert!(snapshot.facts.is_empty());
    }

    #[test]
    fn save_then_load_preserves_order_and_facts() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let turns = vec![
            ConversationTurn::user("What is 2+2?"),
            ConversationTurn::assistant("4"),
        ];
        let mut facts = FactMap::new();
        facts.insert("name".into(), "Ada".into());

        store.save(&turns, &facts).unwrap();
        let snapshot = store.load().unwrap();

        assert_eq!(snapshot.turns, turns);
        assert_eq!(snapshot.facts, facts);
    }

    #[test]
    fn files_are_pretty_json_in_expected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut facts = FactMap::new();
        facts.insert("city".into(), "Lisbon".into());
        store.save(&[ConversationTurn::user("Hi")], &facts).unwrap();

        let history = std::fs::read_to_string(store.history_path()).unwrap();
        assert!(history.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&history).unwrap();
        assert_eq!(value[0]["role"], "user");
        assert_eq!(value[0]["content"], "Hi");

        let facts_json = std::fs::read_to_string(store.facts_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&facts_json).unwrap();
        assert_eq!(value, serde_json::json!({"city": "Lisbon"}));
    }

    #[test]
    fn externally_written_history_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::write(
            store.history_path(),
            r#"[{"id":"6f1c2a9e-8d2b-4c47-9a57-3c1f0d3f5b11","role":"narrator","content":"Once","timestamp":"2025-01-01T12:00:00Z"}]"#,
        )
        .unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(snapshot.turns[0].role, Role::Unknown);
        assert_eq!(
            snapshot.turns[0].timestamp,
            "2025-01-01T12:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap()
        );
    }

    #[test]
    fn corrupt_facts_file_is_set_aside_and_history_survives() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let turns = vec![
            ConversationTurn::user("turn one"),
            ConversationTurn::assistant("turn two"),
        ];
        store.save(&turns, &FactMap::new()).unwrap();
        std::fs::write(store.facts_path(), "{truncated").unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.turns, turns);
        assert!(snapshot.facts.is_empty());

        let aside = dir.path().join("facts.json.corrupt");
        assert_eq!(std::fs::read_to_string(&aside).unwrap(), "{truncated");
        assert!(!store.facts_path().exists());

        // Saving after the partial load keeps the history and the set-aside copy.
        let mut more = snapshot.turns.clone();
        more.push(ConversationTurn::user("turn three"));
        store.save(&more, &snapshot.facts).unwrap();
        assert_eq!(store.load().unwrap().turns.len(), 3);
        assert_eq!(std::fs::read_to_string(&aside).unwrap(), "{truncated");
    }

    #[test]
    fn corrupt_history_file_is_set_aside_and_facts_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut facts = FactMap::new();
        facts.insert("name".into(), "Ada".into());
        store.save(&[], &facts).unwrap();
        std::fs::write(store.history_path(), "[{\"id\":").unwrap();

        let snapshot = store.load().unwrap();
        assert!(snapshot.turns.is_empty());
        assert_eq!(snapshot.facts, facts);
        assert!(dir.path().join("context_history.json.corrupt").exists());
    }

    #[test]
    fn corrupt_path_appends_suffix() {
        assert_eq!(
            corrupt_path(Path::new("/s/facts.json")),
            PathBuf::from("/s/facts.json.corrupt")
        );
    }

    #[test]
    fn empty_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::write(store.history_path(), "  \n").unwrap();
        assert!(store.load().unwrap().turns.is_empty());
    }
}

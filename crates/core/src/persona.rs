//! Persona - the fixed prefix of every answer-pass system message.
//!
//! Resolution order:
//!
//! 1. **Override** - inline text from configuration, no file access
//! 2. **Persona file** - `<session dir>/system_prompt.txt`
//! 3. **Default** - written to the persona file when it does not exist yet
//!
//! A persona file that exists but cannot be read falls back to the default
//! without overwriting it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Well-known persona file name inside the session directory.
pub const PERSONA_FILE: &str = "system_prompt.txt";

/// The text written to a fresh persona file.
pub const DEFAULT_PERSONA: &str = "You are a helpful assistant.";

/// Where the persona text came from (for diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersonaSource {
    Override,
    File { path: PathBuf },
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub text: String,
    pub source: PersonaSource,
}

impl Persona {
    /// A persona supplied inline.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: PersonaSource::Override,
        }
    }

    /// Resolve the persona, creating the persona file with the default text
    /// when it is missing.
    pub fn load(path: &Path, override_text: Option<&str>) -> Self {
        if let Some(text) = override_text {
            debug!("Using persona override, skipping file loading");
            return Self::from_text(text);
        }

        if !path.exists() {
            if let Err(e) = Self::write_default(path) {
                warn!(file = %path.display(), error = %e, "Failed to create default persona file");
                return Self::default();
            }
            debug!(file = %path.display(), "Created default persona file");
        }

        match std::fs::read_to_string(path) {
            Ok(text) => Self {
                text,
                source: PersonaSource::File {
                    path: path.to_path_buf(),
                },
            },
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to read persona file");
                Self::default()
            }
        }
    }

    fn write_default(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_PERSONA)
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            text: DEFAULT_PERSONA.into(),
            source: PersonaSource::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_skips_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PERSONA_FILE);
        let persona = Persona::load(&path, Some("You are terse."));
        assert_eq!(persona.text, "You are terse.");
        assert_eq!(persona.source, PersonaSource::Override);
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_created_with_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(PERSONA_FILE);
        let persona = Persona::load(&path, None);
        assert_eq!(persona.text, DEFAULT_PERSONA);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_PERSONA);
    }

    #[test]
    fn existing_file_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PERSONA_FILE);
        std::fs::write(&path, "You are a pirate.\n").unwrap();
        let persona = Persona::load(&path, None);
        assert_eq!(persona.text, "You are a pirate.\n");
        assert!(matches!(persona.source, PersonaSource::File { .. }));
    }
}

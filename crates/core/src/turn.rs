//! Conversation turn domain types.
//!
//! A turn is one role-attributed message in the conversation log. Turns are
//! created on append, keep their id forever, and only change through an
//! explicit edit-by-id.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation turn. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TurnId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// A tool invocation and its outcome
    Tool,
    /// Anything a persisted log carries that we do not recognise
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::Tool => "Tool",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Unique turn ID
    pub id: TurnId,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn was created (UTC; rendered in local time)
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a new turn with a fresh id and the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Copy of this turn with replaced content; id and timestamp are kept.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// The timestamp converted to the local time zone.
    pub fn local_timestamp(&self) -> DateTime<Local> {
        self.timestamp.with_timezone(&Local)
    }
}

impl std::fmt::Display for ConversationTurn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: {} ({})",
            self.id,
            self.role,
            self.content,
            self.local_timestamp().format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = ConversationTurn::user("Hello!");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "Hello!");
    }

    #[test]
    fn ids_are_unique() {
        let a = ConversationTurn::user("a");
        let b = ConversationTurn::user("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn with_content_keeps_identity() {
        let turn = ConversationTurn::tool("pending");
        let amended = turn.with_content("done");
        assert_eq!(amended.id, turn.id);
        assert_eq!(amended.timestamp, turn.timestamp);
        assert_eq!(amended.content, "done");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
    }

    #[test]
    fn unrecognised_role_is_unknown() {
        let role: Role = serde_json::from_str(r#""narrator""#).unwrap();
        assert_eq!(role, Role::Unknown);
    }

    #[test]
    fn turn_record_format() {
        let turn = ConversationTurn::user("Hi");
        let value = serde_json::to_value(&turn).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert!(obj.contains_key("id"));
        assert_eq!(obj["role"], "user");
        assert_eq!(obj["content"], "Hi");
        assert!(obj.contains_key("timestamp"));
    }

    #[test]
    fn turn_id_parses_from_display() {
        let id = TurnId::new();
        let parsed: TurnId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}

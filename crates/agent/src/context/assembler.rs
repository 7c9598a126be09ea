//! System message assembly.
//!
//! Builds the answer-pass system message from four sections:
//!
//! ```text
//! <persona>
//!
//! # Facts
//! key: value
//!
//! # Conversation History
//! User: ... [2025-01-01 09:30:00]
//! Assistant: ...
//!
//! # Current Time
//! 2025-01-01 09:31:12
//! ```
//!
//! A trailing user turn is the prompt, not history, so it is left out of the
//! history section. Headers are always present, even with nothing under them.

use super::store::ContextStore;
use super::token::TokenCounter;
use chrono::{DateTime, Local};
use colloquy_core::persona::Persona;
use colloquy_core::session::FactMap;
use colloquy_core::turn::{ConversationTurn, Role};
use serde::Serialize;

pub const FACTS_HEADER: &str = "# Facts";
pub const HISTORY_HEADER: &str = "# Conversation History";
pub const TIME_HEADER: &str = "# Current Time";

/// Local-time rendering used for history stamps and the current time.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The assembled system message and its token count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledPrompt {
    pub text: String,
    pub token_count: usize,
}

pub struct SystemMessageAssembler {
    persona: Persona,
    counter: TokenCounter,
}

impl SystemMessageAssembler {
    pub fn new(persona: Persona) -> Self {
        Self {
            persona,
            counter: TokenCounter::new(),
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Render the system message for the current moment.
    pub fn assemble(&self, store: &ContextStore) -> String {
        self.render_at(store, Local::now())
    }

    /// Render the system message and count its tokens.
    pub fn assemble_with_tokens(&self, store: &ContextStore) -> AssembledPrompt {
        let text = self.assemble(store);
        let token_count = self.counter.count(&text);
        AssembledPrompt { text, token_count }
    }

    /// Tokens in an arbitrary string under the same encoding.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Render with a fixed clock.
    pub fn render_at(&self, store: &ContextStore, now: DateTime<Local>) -> String {
        let mut out = self.persona.text.clone();

        out.push_str("\n\n");
        out.push_str(FACTS_HEADER);
        out.push_str(&render_facts(store.facts()));

        out.push_str("\n\n");
        out.push_str(HISTORY_HEADER);
        for turn in history(store.list_turns()) {
            out.push('\n');
            out.push_str(&render_history_line(turn));
        }

        out.push_str("\n\n");
        out.push_str(TIME_HEADER);
        out.push('\n');
        out.push_str(&now.format(TIME_FORMAT).to_string());

        out
    }
}

/// Every turn except a trailing user turn.
pub fn history(turns: &[ConversationTurn]) -> &[ConversationTurn] {
    match turns.last() {
        Some(last) if last.role == Role::User => &turns[..turns.len() - 1],
        _ => turns,
    }
}

/// `\nkey: value` per fact; empty for no facts.
pub fn render_facts(facts: &FactMap) -> String {
    facts
        .iter()
        .map(|(key, value)| format!("\n{key}: {value}"))
        .collect()
}

fn render_history_line(turn: &ConversationTurn) -> String {
    match turn.role {
        Role::User => format!(
            "{}: {} [{}]",
            turn.role,
            turn.content,
            turn.local_timestamp().format(TIME_FORMAT)
        ),
        _ => format!("{}: {}", turn.role, turn.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    fn assembler() -> SystemMessageAssembler {
        SystemMessageAssembler::new(Persona::from_text("You are a test persona."))
    }

    #[test]
    fn empty_store_renders_all_headers() {
        let store = ContextStore::new();
        let text = assembler().render_at(&store, fixed_now());
        assert_eq!(
            text,
            "You are a test persona.\n\n# Facts\n\n# Conversation History\n\n# Current Time\n2025-03-14 15:09:26"
        );
    }

    #[test]
    fn facts_render_one_per_line() {
        let mut store = ContextStore::new();
        store.merge_facts(FactMap::from([
            ("city".to_string(), "Lisbon".to_string()),
            ("name".to_string(), "Ada".to_string()),
        ]));
        let text = assembler().render_at(&store, fixed_now());
        assert!(text.contains("# Facts\ncity: Lisbon\nname: Ada\n\n# Conversation History"));
    }

    #[test]
    fn trailing_user_turn_is_excluded_from_history() {
        let mut store = ContextStore::new();
        store.append(ConversationTurn::user("Hi"));
        let text = assembler().render_at(&store, fixed_now());
        assert!(!text.contains("User: Hi"));
        assert!(text.contains("# Conversation History\n\n# Current Time"));
    }

    #[test]
    fn user_lines_carry_timestamps_others_do_not() {
        let mut store = ContextStore::new();
        let question = ConversationTurn::user("What is 2+2?");
        let stamp = question.local_timestamp().format(TIME_FORMAT).to_string();
        store.append(question);
        store.append(ConversationTurn::assistant("4"));
        store.append(ConversationTurn::tool("is_greater({\"call\":{}})"));

        let text = assembler().render_at(&store, fixed_now());
        assert!(text.contains(&format!("\nUser: What is 2+2? [{stamp}]")));
        assert!(text.contains("\nAssistant: 4\n"));
        assert!(text.contains("\nTool: is_greater({\"call\":{}})\n"));
    }

    #[test]
    fn only_the_last_user_turn_is_the_prompt() {
        let mut store = ContextStore::new();
        store.append(ConversationTurn::user("first"));
        store.append(ConversationTurn::user("second"));
        let text = assembler().render_at(&store, fixed_now());
        assert!(text.contains("User: first ["));
        assert!(!text.contains("User: second"));
    }

    #[test]
    fn token_count_covers_full_text() {
        let mut store = ContextStore::new();
        store.append(ConversationTurn::user("Hi"));
        let assembler = assembler();
        let prompt = assembler.assemble_with_tokens(&store);

        assert!(prompt.text.starts_with("You are a test persona."));
        assert!(prompt.text.contains(TIME_HEADER));
        assert_eq!(prompt.token_count, assembler.count_tokens(&prompt.text));
        assert!(prompt.token_count > assembler.count_tokens("You are a test persona."));
    }
}

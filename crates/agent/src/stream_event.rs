//! Generation events.
//!
//! `generate` reports what it is doing as one ordered sequence of typed
//! events on an unbounded channel. A caller that does not care passes
//! [`EventSink::none()`]; a dropped receiver never fails generation.

use colloquy_core::turn::ConversationTurn;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// The three provider passes of one `generate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Answer,
    FactExtraction,
    SelfEvaluation,
}

impl Pass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::FactExtraction => "fact_extraction",
            Self::SelfEvaluation => "self_evaluation",
        }
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted during one `generate` call, in order.
///
/// - `pass_started`    - a provider pass begins
/// - `progress`        - one provider chunk arrived (liveness only)
/// - `turn_completed`  - a turn was finalized and appended to the log
/// - `turn_amended`    - a pending tool turn now carries its result or error
/// - `facts_merged`    - fact extraction wrote this many entries
/// - `self_evaluated`  - the self-evaluation score, verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    PassStarted { pass: Pass },

    Progress { pass: Pass },

    TurnCompleted {
        turn: ConversationTurn,
        is_complete: bool,
    },

    TurnAmended { turn: ConversationTurn },

    FactsMerged { count: usize },

    SelfEvaluated { score: String },
}

impl GenerationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PassStarted { .. } => "pass_started",
            Self::Progress { .. } => "progress",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::TurnAmended { .. } => "turn_amended",
            Self::FactsMerged { .. } => "facts_merged",
            Self::SelfEvaluated { .. } => "self_evaluated",
        }
    }
}

/// Sending side of the event stream.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<GenerationEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<GenerationEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards every event.
    pub fn none() -> Self {
        Self::default()
    }

    /// A sink plus the receiver that observes it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GenerationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: GenerationEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone: nobody is listening, keep generating.
            let _ = tx.send(event);
        }
    }
}

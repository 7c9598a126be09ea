//! The generation core of colloquy.
//!
//! One user turn becomes a sequence of provider calls:
//!
//! 1. **Assemble** the system message from persona, facts and history
//! 2. **Answer** through the streaming bridge, which splits the stream
//!    around tool calls and appends every finalized turn to the log
//! 3. **Extract facts** from the user's input into the fact map
//! 4. **Self-evaluate** the answer into a debug annotation
//!
//! Only a failure in step 2 reaches the caller.

pub mod bridge;
pub mod context;
pub mod orchestrator;
pub mod report;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bridge::{BridgeOutcome, BridgeSettings, StreamingToolInvocationBridge, TurnSink};
pub use context::{AssembledPrompt, ContextStore, SystemMessageAssembler, TokenCounter};
pub use orchestrator::{GenerationOrchestrator, GenerationSettings};
pub use report::{DebugInfo, GenerationReport, SELF_EVALUATION_KEY};
pub use stream_event::{EventSink, GenerationEvent, Pass};

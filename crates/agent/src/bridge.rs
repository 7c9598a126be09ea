//! StreamingToolInvocationBridge - splits a provider stream around tool calls.
//!
//! The bridge drives one pass of a provider conversation:
//!
//! 1. **Accumulate** streamed text into a buffer, signalling progress per chunk
//! 2. **Flush** on a tool-invocation request: a non-empty buffer becomes an
//!    incomplete Assistant turn
//! 3. **Execute** each requested tool in request order, one at a time: a
//!    pending Tool turn is emitted, the tool runs between two pacing delays,
//!    and the pending turn is amended with the result (or the error, which
//!    ends the pass)
//! 4. **Resume**: the request is re-issued with the tool round appended and
//!    accumulation continues into the same buffer
//!
//! When a stream ends without tool requests, the trimmed buffer becomes the
//! complete Assistant turn that terminates the pass.

use colloquy_core::error::{ContextError, GenerationError, ToolError};
use colloquy_core::provider::{ChatMessage, LlmProvider, MessageToolCall, ProviderRequest, Usage};
use colloquy_core::tool::{ToolCall, ToolProvider};
use colloquy_core::turn::ConversationTurn;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default cap on tool invocations in one pass.
pub const DEFAULT_MAX_TOOL_INVOCATIONS: u32 = 30;

/// Default pause before and after each tool invocation.
pub const DEFAULT_TOOL_PACING: Duration = Duration::from_millis(500);

/// Receives the turns a pass produces, in the order they are finalized.
pub trait TurnSink: Send {
    /// One provider chunk arrived.
    fn progress(&mut self);

    /// A turn is final enough to enter the log.
    fn finalize(&mut self, turn: ConversationTurn, is_complete: bool);

    /// A previously finalized turn has new content (same id).
    fn amend(&mut self, turn: ConversationTurn) -> Result<(), ContextError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Tool invocations allowed in one pass, across all rounds
    pub max_tool_invocations: u32,

    /// Pause before and after each invocation; zero disables pacing
    pub tool_pacing: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_tool_invocations: DEFAULT_MAX_TOOL_INVOCATIONS,
            tool_pacing: DEFAULT_TOOL_PACING,
        }
    }
}

/// Ephemeral state of one pass.
#[derive(Debug, Default)]
struct StreamingState {
    buffer: String,
    tool_invocations: u32,
}

impl StreamingState {
    /// Emit the buffer verbatim as an incomplete Assistant turn. Returns the
    /// text, which is replayed with the tool calls.
    fn flush(&mut self, sink: &mut dyn TurnSink) -> String {
        let text = std::mem::take(&mut self.buffer);
        if !text.is_empty() {
            sink.finalize(ConversationTurn::assistant(text.clone()), false);
        }
        text
    }

    /// Emit the trimmed buffer as the terminal Assistant turn.
    fn finish(&mut self, sink: &mut dyn TurnSink) -> Option<ConversationTurn> {
        let text = std::mem::take(&mut self.buffer);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let turn = ConversationTurn::assistant(text);
        sink.finalize(turn.clone(), true);
        Some(turn)
    }
}

/// Tool calls served during one provider stream, replayed on the next request.
#[derive(Default)]
struct ToolRound {
    text: String,
    calls: Vec<MessageToolCall>,
    results: Vec<ChatMessage>,
}

/// What a finished pass produced besides its turns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeOutcome {
    /// The complete Assistant turn ending the pass, if any text remained
    pub final_turn: Option<ConversationTurn>,

    pub tool_invocations: u32,

    pub provider_calls: u32,

    pub usage: Usage,
}

pub struct StreamingToolInvocationBridge<'a> {
    provider: &'a dyn LlmProvider,
    tools: &'a dyn ToolProvider,
    settings: BridgeSettings,
}

impl<'a> StreamingToolInvocationBridge<'a> {
    pub fn new(provider: &'a dyn LlmProvider, tools: &'a dyn ToolProvider, settings: BridgeSettings) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Run one pass. Tool requests are only honoured when the request
    /// carries a tool catalog.
    pub async fn run(
        &self,
        mut request: ProviderRequest,
        sink: &mut dyn TurnSink,
    ) -> Result<BridgeOutcome, GenerationError> {
        let tools_enabled = !request.tools.is_empty();
        let mut state = StreamingState::default();
        let mut outcome = BridgeOutcome::default();

        loop {
            outcome.provider_calls += 1;
            let mut rx = self.provider.stream(request.clone()).await?;
            let mut round: Option<ToolRound> = None;

            while let Some(item) = rx.recv().await {
                let chunk = item?;
                sink.progress();

                if let Some(text) = chunk.content.as_deref() {
                    state.buffer.push_str(text);
                }

                if let Some(usage) = chunk.usage {
                    info!(
                        provider = self.provider.name(),
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "Token usage"
                    );
                    outcome.usage += usage;
                }

                if !chunk.tool_calls.is_empty() {
                    if tools_enabled {
                        let round = round.get_or_insert_with(ToolRound::default);
                        round.text.push_str(&state.flush(sink));
                        for call in chunk.tool_calls {
                            let result = self.invoke(&call, &mut state, sink).await?;
                            round.calls.push(call);
                            round.results.push(result);
                        }
                    } else {
                        debug!(count = chunk.tool_calls.len(), "Ignoring tool calls, tool calling disabled");
                    }
                }

                if chunk.done {
                    break;
                }
            }

            let Some(round) = round else { break };
            debug!(
                calls = round.calls.len(),
                iteration = state.tool_invocations,
                "Resuming stream after tool round"
            );
            request
                .messages
                .push(ChatMessage::assistant_tool_calls(round.text, round.calls));
            request.messages.extend(round.results);
        }

        outcome.tool_invocations = state.tool_invocations;
        outcome.final_turn = state.finish(sink);
        Ok(outcome)
    }

    /// Execute one tool call, mirroring it into the log as a Tool turn.
    /// Returns the tool-result message for the follow-up request.
    async fn invoke(
        &self,
        call: &MessageToolCall,
        state: &mut StreamingState,
        sink: &mut dyn TurnSink,
    ) -> Result<ChatMessage, GenerationError> {
        let limit = self.settings.max_tool_invocations;
        if state.tool_invocations >= limit {
            warn!(tool = %call.name, limit, "Tool invocation limit reached");
            return Err(GenerationError::ToolIterationLimit { limit });
        }
        state.tool_invocations += 1;

        let arguments = parse_arguments(&call.arguments);
        let shown = match &arguments {
            Ok(args) => args.clone(),
            Err(_) => Value::String(call.arguments.clone()),
        };

        let pending = ConversationTurn::tool(render_call(&call.name, &shown));
        sink.finalize(pending.clone(), false);
        info!(tool = %call.name, iteration = state.tool_invocations, "Invoking tool");

        self.pace().await;

        let result = match arguments {
            Ok(arguments) => {
                self.tools
                    .invoke(&ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments,
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(result) => {
                let value = result.value();
                debug!(tool = %call.name, success = result.success, "Tool returned");
                sink.amend(pending.with_content(render_result(&call.name, &shown, &value)))?;
                self.pace().await;
                Ok(ChatMessage::tool_result(call.id.clone(), value_text(&value)))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool invocation failed");
                let message = e.to_string();
                sink.amend(pending.with_content(render_error(&call.name, &shown, &message)))?;
                Err(GenerationError::ToolExecution {
                    tool_name: call.name.clone(),
                    source: e,
                })
            }
        }
    }

    async fn pace(&self) {
        if !self.settings.tool_pacing.is_zero() {
            tokio::time::sleep(self.settings.tool_pacing).await;
        }
    }
}

/// Raw argument text to JSON. An empty string means no arguments.
fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// `name({"call":args})`
pub fn render_call(name: &str, arguments: &Value) -> String {
    format!("{name}({})", serde_json::json!({ "call": arguments }))
}

/// `name({"call":args,"result":value})`
pub fn render_result(name: &str, arguments: &Value, result: &Value) -> String {
    format!(
        "{name}({})",
        serde_json::json!({ "call": arguments, "result": result })
    )
}

/// `name({"call":args,"error":message}) -! exception: message`
pub fn render_error(name: &str, arguments: &Value, message: &str) -> String {
    format!(
        "{name}({}) -! exception: {message}",
        serde_json::json!({ "call": arguments, "error": message })
    )
}

/// Text sent back to the model for a tool result.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! GenerationOrchestrator - one user turn in, three provider passes out.
//!
//! Each `generate` call runs, strictly in order:
//!
//! 1. **Answer** - the trailing user turn is the prompt, the assembled
//!    system message the context, the full tool catalog offered. Every turn
//!    the bridge finalizes is appended to the log immediately.
//! 2. **Fact extraction** - the same prompt against a fixed instruction plus
//!    the known facts; a JSON object reply is merged into the fact map.
//! 3. **Self-evaluation** - a fixed scoring prompt against the re-assembled
//!    system message; the trimmed reply is kept as a debug annotation.
//!
//! A failure in the answer pass aborts the call. Failures in the other two
//! passes are logged and swallowed. Nothing from passes 2 and 3 is appended
//! to the conversation log.

use crate::bridge::{BridgeOutcome, BridgeSettings, StreamingToolInvocationBridge, TurnSink};
use crate::context::{ContextStore, SystemMessageAssembler};
use crate::report::{GenerationReport, SELF_EVALUATION_KEY};
use crate::stream_event::{EventSink, GenerationEvent, Pass};
use colloquy_config::AppConfig;
use colloquy_core::error::{ContextError, GenerationError};
use colloquy_core::provider::{Attachment, LlmProvider, ProviderRequest, Usage};
use colloquy_core::session::FactMap;
use colloquy_core::tool::ToolProvider;
use colloquy_core::turn::{ConversationTurn, Role, TurnId};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// System message of the fact-extraction pass, before the known facts.
pub const FACT_EXTRACTION_INSTRUCTIONS: &str = "Extract facts from the user's input.\n\n\
Output the extracted facts as JSON in the following format.\n\
{\"key\": \"value\"}\n\n\
Combine multiple facts into a single JSON object.\n\
If there are no facts to extract, output only {}.\n\n";

/// Prompt of the self-evaluation pass.
pub const SELF_EVALUATION_PROMPT: &str = "<system>Review the conversation history and score, from 0 to 100, \
how well your answer to the user's latest question addressed it. \
Reply with the score only.</system>\n";

/// Per-call provider parameters and bridge limits.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub bridge: BridgeSettings,
}

impl GenerationSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: Some(8192),
            bridge: BridgeSettings::default(),
        }
    }

    /// Settings from configuration, for the model the provider resolved.
    pub fn from_config(config: &AppConfig, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            bridge: BridgeSettings {
                max_tool_invocations: config.generation.max_tool_invocations,
                tool_pacing: config.generation.tool_pacing(),
            },
        }
    }

    pub fn with_bridge(mut self, bridge: BridgeSettings) -> Self {
        self.bridge = bridge;
        self
    }
}

pub struct GenerationOrchestrator {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolProvider>,
    assembler: SystemMessageAssembler,
    settings: GenerationSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolProvider>,
        assembler: SystemMessageAssembler,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            assembler,
            settings,
        }
    }

    pub fn assembler(&self) -> &SystemMessageAssembler {
        &self.assembler
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Prepare the provider and the tool catalog.
    pub async fn initialize(&self) -> colloquy_core::Result<()> {
        self.provider.initialize().await?;
        self.tools.initialize().await?;
        info!(provider = self.provider.name(), model = %self.settings.model, "Orchestrator initialized");
        Ok(())
    }

    /// Reset the collaborators and clear the conversation log (facts stay).
    pub async fn reset(&self, store: &mut ContextStore) -> colloquy_core::Result<()> {
        self.provider.reset().await?;
        self.tools.reset().await?;
        store.reset();
        info!("Session reset");
        Ok(())
    }

    /// Run the three passes for the trailing user turn.
    pub async fn generate(
        &self,
        store: &mut ContextStore,
        events: &EventSink,
    ) -> Result<GenerationReport, GenerationError> {
        self.generate_with_attachment(store, None, events).await
    }

    /// Like [`generate`](Self::generate), sending `attachment` with the
    /// answer-pass prompt.
    pub async fn generate_with_attachment(
        &self,
        store: &mut ContextStore,
        attachment: Option<Attachment>,
        events: &EventSink,
    ) -> Result<GenerationReport, GenerationError> {
        let prompt = store
            .trailing_user_turn()
            .map(|t| t.content.clone())
            .ok_or_else(GenerationError::last_turn_not_user)?;

        let mut report = GenerationReport::default();

        let answer = self
            .answer_pass(store, &prompt, attachment, events, &mut report.appended)
            .await?;
        report.tool_invocations = answer.tool_invocations;
        report.usage += answer.usage;

        report.facts_merged = self
            .fact_extraction_pass(store, &prompt, events, &mut report.usage)
            .await;

        if let Some(score) = self
            .self_evaluation_pass(store, events, &mut report.usage)
            .await
        {
            report.debug.set(SELF_EVALUATION_KEY, score);
        }

        info!(
            appended = report.appended.len(),
            tool_invocations = report.tool_invocations,
            facts_merged = report.facts_merged,
            total_tokens = report.usage.total_tokens,
            "Generation complete"
        );
        Ok(report)
    }

    async fn answer_pass(
        &self,
        store: &mut ContextStore,
        prompt: &str,
        attachment: Option<Attachment>,
        events: &EventSink,
        appended: &mut Vec<TurnId>,
    ) -> Result<BridgeOutcome, GenerationError> {
        events.emit(GenerationEvent::PassStarted { pass: Pass::Answer });

        let system = self.assembler.assemble_with_tokens(store);
        let catalog = self.tools.list_tools().await;
        info!(
            pass = %Pass::Answer,
            tokens = system.token_count,
            tools = catalog.len(),
            "Starting pass"
        );

        let request = self
            .request(system.text, prompt)
            .with_tools(catalog)
            .with_attachment(attachment);

        let mut sink = LogSink {
            store,
            events,
            appended,
        };
        self.bridge().run(request, &mut sink).await
    }

    async fn fact_extraction_pass(
        &self,
        store: &mut ContextStore,
        prompt: &str,
        events: &EventSink,
        usage: &mut Usage,
    ) -> usize {
        let system = fact_extraction_system_message(store.facts());
        let Some(reply) = self.side_pass(Pass::FactExtraction, system, prompt, events, usage).await else {
            return 0;
        };

        match parse_facts(&reply) {
            Ok(facts) => {
                let count = store.merge_facts(facts);
                info!(count, "Facts merged");
                events.emit(GenerationEvent::FactsMerged { count });
                count
            }
            Err(e) => {
                warn!(error = %e, reply = %reply, "Failed to parse extracted facts");
                0
            }
        }
    }

    async fn self_evaluation_pass(
        &self,
        store: &ContextStore,
        events: &EventSink,
        usage: &mut Usage,
    ) -> Option<String> {
        let system = self.assembler.assemble(store);
        let score = self
            .side_pass(Pass::SelfEvaluation, system, SELF_EVALUATION_PROMPT, events, usage)
            .await?;
        info!(score = %score, "Self-evaluation recorded");
        events.emit(GenerationEvent::SelfEvaluated {
            score: score.clone(),
        });
        Some(score)
    }

    /// A tool-less pass whose reply is returned instead of logged.
    /// Provider failures are contained here.
    async fn side_pass(
        &self,
        pass: Pass,
        system: String,
        prompt: &str,
        events: &EventSink,
        usage: &mut Usage,
    ) -> Option<String> {
        events.emit(GenerationEvent::PassStarted { pass });
        info!(pass = %pass, "Starting pass");

        let mut sink = CaptureSink { pass, events };
        match self.bridge().run(self.request(system, prompt), &mut sink).await {
            Ok(outcome) => {
                *usage += outcome.usage;
                outcome
                    .final_turn
                    .filter(|t| t.role == Role::Assistant)
                    .map(|t| t.content)
            }
            Err(e) => {
                warn!(pass = %pass, error = %e, "Pass failed, skipping");
                None
            }
        }
    }

    fn bridge(&self) -> StreamingToolInvocationBridge<'_> {
        StreamingToolInvocationBridge::new(
            self.provider.as_ref(),
            self.tools.as_ref(),
            self.settings.bridge,
        )
    }

    fn request(&self, system: String, prompt: &str) -> ProviderRequest {
        ProviderRequest::new(&self.settings.model, system, prompt)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }
}

// --- Turn sinks ---

/// Answer-pass sink: every finalized turn goes straight into the log.
struct LogSink<'a> {
    store: &'a mut ContextStore,
    events: &'a EventSink,
    appended: &'a mut Vec<TurnId>,
}

impl TurnSink for LogSink<'_> {
    fn progress(&mut self) {
        self.events.emit(GenerationEvent::Progress { pass: Pass::Answer });
    }

    fn finalize(&mut self, turn: ConversationTurn, is_complete: bool) {
        info!(turn_id = %turn.id, role = %turn.role, is_complete, "Turn completed");
        self.appended.push(turn.id);
        self.store.append(turn.clone());
        self.events.emit(GenerationEvent::TurnCompleted { turn, is_complete });
    }

    fn amend(&mut self, turn: ConversationTurn) -> Result<(), ContextError> {
        debug!(turn_id = %turn.id, "Turn amended");
        self.store.edit_by_id(turn.clone())?;
        self.events.emit(GenerationEvent::TurnAmended { turn });
        Ok(())
    }
}

/// Side-pass sink: progress only; the outcome carries the reply.
struct CaptureSink<'a> {
    pass: Pass,
    events: &'a EventSink,
}

impl TurnSink for CaptureSink<'_> {
    fn progress(&mut self) {
        self.events.emit(GenerationEvent::Progress { pass: self.pass });
    }

    fn finalize(&mut self, _turn: ConversationTurn, _is_complete: bool) {}

    fn amend(&mut self, _turn: ConversationTurn) -> Result<(), ContextError> {
        Ok(())
    }
}

// --- Fact extraction ---

/// The fixed instruction followed by every known fact as `key: value`.
pub fn fact_extraction_system_message(facts: &FactMap) -> String {
    let known: Vec<String> = facts.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    format!("{FACT_EXTRACTION_INSTRUCTIONS}# Known Facts\n{}", known.join("\n"))
}

/// Parse a fact-extraction reply into a fact map.
///
/// Accepts a bare JSON object or one wrapped in a Markdown code fence.
/// Numbers and booleans are kept as their text; nested values and nulls
/// are skipped.
pub fn parse_facts(reply: &str) -> Result<FactMap, serde_json::Error> {
    let object: serde_json::Map<String, Value> = serde_json::from_str(strip_code_fence(reply))?;
    Ok(object
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Number(n) => Some((key, n.to_string())),
            Value::Bool(b) => Some((key, b.to_string())),
            other => {
                warn!(key = %key, value = %other, "Skipping non-scalar fact");
                None
            }
        })
        .collect())
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

//! Shared test helpers: a scripted provider, a recording tool provider and a
//! recording turn sink.

use crate::bridge::TurnSink;
use async_trait::async_trait;
use colloquy_core::error::{ContextError, ProviderError, ToolError};
use colloquy_core::provider::{
    ChunkReceiver, LlmProvider, MessageToolCall, ProviderRequest, StreamChunk, ToolDefinition, Usage,
};
use colloquy_core::tool::{ToolCall, ToolProvider, ToolRegistry, ToolResult};
use colloquy_core::turn::ConversationTurn;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted provider call.
pub enum Script {
    /// Deliver these chunks, then close the stream.
    Chunks(Vec<StreamChunk>),
    /// Fail the call before any chunk is produced.
    Fail(ProviderError),
    /// Deliver these chunks, then an in-stream error.
    Broken(Vec<StreamChunk>, ProviderError),
}

/// Plain text streamed in pieces, ending with a usage-bearing final chunk.
pub fn text(parts: &[&str]) -> Script {
    let mut chunks: Vec<StreamChunk> = parts.iter().map(|p| StreamChunk::text(*p)).collect();
    chunks.push(StreamChunk {
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        ..StreamChunk::done()
    });
    Script::Chunks(chunks)
}

/// Optional text, then a final chunk requesting `calls`.
pub fn tool_request(prefix: &str, calls: Vec<MessageToolCall>) -> Script {
    let mut chunks = Vec::new();
    if !prefix.is_empty() {
        chunks.push(StreamChunk::text(prefix));
    }
    chunks.push(StreamChunk {
        done: true,
        ..StreamChunk::tool_calls(calls)
    });
    Script::Chunks(chunks)
}

/// A tool call with JSON arguments.
pub fn call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

/// A provider that plays back one script per `stream` call and records
/// every request it receives.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;

        let (chunks, tail) = match script {
            Script::Fail(e) => return Err(e),
            Script::Chunks(chunks) => (chunks, None),
            Script::Broken(chunks, e) => (chunks, Some(e)),
        };

        let (tx, rx) = tokio::sync::mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            tx.send(Ok(chunk)).await.unwrap();
        }
        if let Some(e) = tail {
            tx.send(Err(e)).await.unwrap();
        }
        Ok(rx)
    }
}

/// The built-in tool catalog, recording every call and optionally failing.
pub struct MockTools {
    registry: ToolRegistry,
    fail_with: Option<ToolError>,
    invoked: Mutex<Vec<ToolCall>>,
}

impl MockTools {
    pub fn new() -> Self {
        Self {
            registry: colloquy_tools::default_registry(),
            fail_with: None,
            invoked: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ToolError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new()
        }
    }

    /// Ids of invoked calls, in invocation order.
    pub fn invoked_ids(&self) -> Vec<String> {
        self.invoked.lock().unwrap().iter().map(|c| c.id.clone()).collect()
    }
}

#[async_trait]
impl ToolProvider for MockTools {
    async fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        self.invoked.lock().unwrap().push(call.clone());
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => self.registry.execute(call).await,
        }
    }
}

/// What a [`TurnSink`] was told, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Progress,
    Finalized(ConversationTurn, bool),
    Amended(ConversationTurn),
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    /// Finalized and amended turns, without progress noise.
    pub fn turn_events(&self) -> Vec<SinkEvent> {
        self.events
            .iter()
            .filter(|e| !matches!(e, SinkEvent::Progress))
            .cloned()
            .collect()
    }

    pub fn progress_count(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, SinkEvent::Progress)).count()
    }
}

impl TurnSink for RecordingSink {
    fn progress(&mut self) {
        self.events.push(SinkEvent::Progress);
    }

    fn finalize(&mut self, turn: ConversationTurn, is_complete: bool) {
        self.events.push(SinkEvent::Finalized(turn, is_complete));
    }

    fn amend(&mut self, turn: ConversationTurn) -> Result<(), ContextError> {
        self.events.push(SinkEvent::Amended(turn));
        Ok(())
    }
}

//! LlmProvider trait - the abstraction over streaming chat backends.
//!
//! A provider performs one streaming chat completion: it takes the wire-level
//! messages (system message, prompt, and any tool round-trips), an optional
//! attachment and a tool catalog, and yields an ordered channel of
//! [`StreamChunk`]s. Tool-invocation requests travel inside those chunks and
//! are intercepted by the caller before they reach the conversation log.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Wire role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Binary content sent alongside the prompt (e.g. an image).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type, e.g. "image/png"
    pub media_type: String,

    /// Raw bytes
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// Attachments with no bytes or no media type are not sent.
    pub fn is_sendable(&self) -> bool {
        !self.data.is_empty() && !self.media_type.is_empty()
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("media_type", &self.media_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

/// A single wire-level chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,

    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Binary content attached to a user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ChatMessage {
    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            attachment: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    /// A user message carrying an attachment; unsendable attachments are dropped.
    pub fn user_with_attachment(content: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            attachment: attachment.filter(Attachment::is_sendable),
            ..Self::user(content)
        }
    }

    /// The assistant message that requested tool calls in a streamed round.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<MessageToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(ChatRole::Assistant, content)
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(ChatRole::Tool, content)
        }
    }
}

/// Configuration for one streaming provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "google/gemini-2.5-flash")
    pub model: String,

    /// The messages, system message first
    pub messages: Vec<ChatMessage>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call; empty disables tool calling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// A request with a system message and a single prompt.
    pub fn new(model: impl Into<String>, system_message: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::system(system_message), ChatMessage::user(prompt)],
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Attach binary content to the prompt message.
    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        if let Some(prompt) = self.messages.iter_mut().rev().find(|m| m.role == ChatRole::User) {
            prompt.attachment = attachment.filter(Attachment::is_sendable);
        }
        self
    }

    /// The system message text, if present.
    pub fn system_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
    }

    /// The prompt text (the first user message).
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(rhs.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(rhs.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
    }
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Complete tool-invocation requests, in request order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn tool_calls(tool_calls: Vec<MessageToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// Receiving half of a provider stream.
pub type ChunkReceiver = tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The streaming LLM capability.
///
/// The orchestrator drives every pass through `stream()` without knowing
/// which backend is behind it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Prepare the provider for use.
    async fn initialize(&self) -> std::result::Result<(), ProviderError> {
        Ok(())
    }

    /// Drop any provider-side state.
    async fn reset(&self) -> std::result::Result<(), ProviderError> {
        Ok(())
    }

    /// Send a request and get an ordered stream of response chunks.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError>;
}

//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any OpenAI-compatible endpoint.
//!
//! Supports:
//! - Streaming chat completions (SSE)
//! - Tool use / function calling, with tool-call deltas reassembled per index
//! - Image attachments as `image_url` data-URL content parts

use async_trait::async_trait;
use base64::Engine;
use colloquy_core::error::ProviderError;
use colloquy_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default network timeout for one provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of LLM providers since most expose
/// an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider with the default timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a provider whose calls give up after `timeout`.
    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert our messages to OpenAI API format.
    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::User => "user".into(),
                    ChatRole::Assistant => "assistant".into(),
                    ChatRole::System => "system".into(),
                    ChatRole::Tool => "tool".into(),
                },
                content: Self::to_api_content(&m.content, m.attachment.as_ref()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Plain text, or text plus an image part when an attachment is present.
    fn to_api_content(text: &str, attachment: Option<&Attachment>) -> serde_json::Value {
        match attachment.filter(|a| a.is_sendable()) {
            None => serde_json::Value::String(text.to_string()),
            Some(a) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&a.data);
                serde_json::json!([
                    { "type": "text", "text": text },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:{};base64,{}", a.media_type, encoded) }
                    }
                ])
            }
        }
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!("auto");
            // One call at a time; the orchestrator executes them serially anyway.
            body["parallel_tool_calls"] = serde_json::json!(false);
        }

        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            system_chars = request.system_message().map(str::len).unwrap_or(0),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                lines.extend(&bytes);

                // Process complete lines
                while let Some(line) = lines.next_line() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(provider = %provider_name, error = %e, "Dropping SSE line with invalid UTF-8");
                            continue;
                        }
                    };

                    match decoder.decode_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Unparseable(error) => {
                            trace!(
                                provider = %provider_name,
                                line = %line,
                                error = %error,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                        SseLine::Chunk(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseLine::Done(chunk) => {
                            let _ = tx.send(Ok(chunk)).await;
                            return;
                        }
                    }
                }
            }

            // Stream ended without [DONE] - send final chunk
            let _ = tx.send(Ok(decoder.finish(None))).await;
        });

        Ok(rx)
    }
}

// --- SSE decoding ---

/// Splits the raw byte stream into lines.
///
/// Network reads can end inside a multi-byte character, so bytes are kept
/// until a full line is present and only then decoded.
#[derive(Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// The next complete line without its `\n` / `\r\n` terminator.
    fn next_line(&mut self) -> Option<Result<String, std::str::Utf8Error>> {
        let end = self.bytes.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.bytes.drain(..=end).collect();
        let line = &raw[..end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Some(std::str::from_utf8(line).map(str::to_string))
    }
}

/// Outcome of decoding one SSE line.
#[derive(Debug)]
enum SseLine {
    Skip,
    Unparseable(String),
    Chunk(StreamChunk),
    Done(StreamChunk),
}

/// Turns `data:` lines into [`StreamChunk`]s, reassembling tool-call deltas.
///
/// Tool calls are only surfaced on the final chunk, ordered by their index,
/// because their arguments arrive in fragments.
#[derive(Default)]
struct SseDecoder {
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
}

impl SseDecoder {
    fn decode_line(&mut self, line: &str) -> SseLine {
        // Skip empty lines and SSE comments
        if line.is_empty() || line.starts_with(':') {
            return SseLine::Skip;
        }

        let Some(data) = line.strip_prefix("data:") else {
            return SseLine::Skip;
        };
        let data = data.trim();

        // "[DONE]" signals end of stream
        if data == "[DONE]" {
            return SseLine::Done(self.finish(None));
        }

        let stream_resp = match serde_json::from_str::<StreamResponse>(data) {
            Ok(r) => r,
            Err(e) => return SseLine::Unparseable(e.to_string()),
        };

        let mut content = None;
        if let Some(choice) = stream_resp.choices.into_iter().next() {
            if let Some(tc_deltas) = choice.delta.tool_calls {
                for tc_delta in tc_deltas {
                    let acc = self.tool_calls.entry(tc_delta.index).or_default();
                    if let Some(id) = tc_delta.id {
                        acc.id = id;
                    }
                    if let Some(func) = tc_delta.function {
                        if let Some(name) = func.name {
                            acc.name = name;
                        }
                        if let Some(args) = func.arguments {
                            acc.arguments.push_str(&args);
                        }
                    }
                }
            }
            content = choice.delta.content.filter(|c| !c.is_empty());
        }

        // Usage arrives in the last chunk when stream_options.include_usage is set
        if let Some(usage) = stream_resp.usage {
            let mut last = self.finish(Some(usage.into()));
            last.content = content;
            return SseLine::Done(last);
        }

        match content {
            Some(text) => SseLine::Chunk(StreamChunk::text(text)),
            None => SseLine::Skip,
        }
    }

    /// The terminal chunk, carrying every reassembled tool call.
    fn finish(&mut self, usage: Option<Usage>) -> StreamChunk {
        let tool_calls = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(ToolCallAccumulator::into_tool_call)
            .collect();
        StreamChunk {
            content: None,
            tool_calls,
            done: true,
            usage,
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta - arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> MessageToolCall {
        MessageToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

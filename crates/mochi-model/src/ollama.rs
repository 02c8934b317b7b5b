// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Native client for an Ollama-compatible inference daemon.
//!
//! Speaks the daemon's own wire shapes directly (`/api/chat`, `/api/tags`,
//! `/api/show`) rather than an OpenAI-compatibility shim.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::catalog;
use crate::provider::{UpstreamClient, UpstreamError};
use crate::types::{ChatChunk, ChatMessage, ChatRole, CompletionRequest, ModelDescriptor, ToolCallDescriptor};

pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http: reqwest::Client::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_chat_body(request: &CompletionRequest, stream: bool, format: Option<Value>) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
        });
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        if request.think {
            body["think"] = Value::Bool(true);
        }
        if let Some(num_ctx) = request.num_ctx {
            body["options"] = json!({ "num_ctx": num_ctx });
        }
        if let Some(format) = format {
            body["format"] = format;
        }
        body
    }
}

fn wire_message(msg: &ChatMessage) -> Value {
    let role = match msg.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    };
    let mut v = json!({ "role": role, "content": msg.content });
    if let Some(calls) = &msg.tool_calls {
        v["tool_calls"] = Value::Array(
            calls
                .iter()
                .map(|c| json!({ "function": { "name": c.name, "arguments": c.arguments } }))
                .collect(),
        );
    }
    if let Some(name) = &msg.tool_name {
        v["tool_name"] = Value::String(name.clone());
    }
    v
}

#[derive(Debug, Deserialize)]
struct RawTagsResponse {
    #[serde(default)]
    models: Vec<RawTagEntry>,
}

#[derive(Debug, Deserialize)]
struct RawTagEntry {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    details: RawTagDetails,
}

#[derive(Debug, Default, Deserialize)]
struct RawTagDetails {
    #[serde(default)]
    format: String,
    #[serde(default)]
    family: String,
    #[serde(default)]
    parameter_size: String,
    #[serde(default)]
    quantization_level: String,
}

#[derive(Debug, Deserialize)]
struct RawShowResponse {
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    model_info: Value,
    #[serde(default)]
    details: RawTagDetails,
}

#[derive(Debug, Deserialize)]
struct RawChatLine {
    #[serde(default)]
    message: Option<RawChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawChatMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    function: RawToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct RawToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[async_trait]
impl UpstreamClient for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, UpstreamError> {
        let resp = self
            .http
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let tags: RawTagsResponse = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Protocol(e.to_string()))?;

        let mut out = Vec::new();
        for entry in tags.models {
            match self.get_model(&entry.name).await {
                Ok(descriptor) if descriptor.supports_completion() => out.push(descriptor),
                Ok(_) => {}
                Err(e) => warn!(model = %entry.name, error = %e, "skipping model: /api/show failed"),
            }
        }
        Ok(out)
    }

    async fn get_model(&self, name: &str) -> Result<ModelDescriptor, UpstreamError> {
        let resp = self
            .http
            .post(self.url("/api/show"))
            .json(&json!({ "model": name }))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(UpstreamError::ModelNotFound(name.to_string()));
        }
        let show: RawShowResponse = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Protocol(e.to_string()))?;

        let max_context_length = catalog::resolve_context_length(&show.model_info, &show.details.family);

        // /api/tags carries size; /api/show does not, so a bare get_model
        // call reports 0 — callers needing size should go through list_models.
        Ok(ModelDescriptor {
            name: name.to_string(),
            size: 0,
            format: show.details.format,
            family: show.details.family,
            parameter_size: show.details.parameter_size,
            quantization_level: show.details.quantization_level,
            capabilities: show.capabilities,
            max_context_length,
        })
    }

    async fn chat_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<BoxStream<'static, Result<ChatChunk, UpstreamError>>, UpstreamError> {
        let body = Self::build_chat_body(&request, true, None);
        debug!(model = %request.model, "chat_stream: dispatching request");

        let resp = self
            .http
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Protocol(format!("status {status}: {text}")));
        }

        let byte_stream = resp.bytes_stream();
        let lines = ndjson_lines(byte_stream);
        let chunks = lines.map(|line_result| {
            let line = line_result.map_err(|e| UpstreamError::Transport(e.to_string()))?;
            let raw: RawChatLine =
                serde_json::from_str(&line).map_err(|e| UpstreamError::Protocol(e.to_string()))?;
            if let Some(err) = raw.error {
                return Err(UpstreamError::Protocol(err));
            }
            let message = raw.message.unwrap_or_default();
            let tool_calls = message.tool_calls.map(|calls| {
                calls
                    .into_iter()
                    .map(|c| ToolCallDescriptor { name: c.function.name, arguments: c.function.arguments })
                    .collect()
            });
            Ok(ChatChunk {
                content: message.content,
                thinking: message.thinking,
                tool_calls,
                done: raw.done,
                eval_count: raw.eval_count,
                prompt_eval_count: raw.prompt_eval_count,
            })
        });
        Ok(chunks.boxed())
    }

    async fn structured_chat(
        &self,
        request: CompletionRequest,
        schema: Value,
    ) -> Result<Value, UpstreamError> {
        let body = Self::build_chat_body(&request, false, Some(schema));
        let resp = self
            .http
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Protocol(format!("status {status}: {text}")));
        }

        let raw: RawChatLine = resp.json().await.map_err(|e| UpstreamError::Protocol(e.to_string()))?;
        let content = raw.message.map(|m| m.content).unwrap_or_default();
        serde_json::from_str(&content)
            .map_err(|e| UpstreamError::StructuredOutputInvalid(format!("{e}: {content}")))
    }
}

/// Buffered state driving [`ndjson_lines`]: the still-pending byte stream
/// plus bytes received but not yet split into a complete line.
struct NdjsonState<S> {
    byte_stream: S,
    buf: Vec<u8>,
    pending: std::collections::VecDeque<String>,
    finished: bool,
}

/// Split a byte stream on `\n` into owned `String` lines, skipping blanks.
/// Ollama's NDJSON stream emits one complete JSON object per line.
fn ndjson_lines<S>(byte_stream: S) -> impl futures::Stream<Item = Result<String, reqwest::Error>> + Send + 'static
where
    S: futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    let state = NdjsonState {
        byte_stream,
        buf: Vec::new(),
        pending: std::collections::VecDeque::new(),
        finished: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.pending.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }
            match state.byte_stream.next().await {
                Some(Ok(chunk)) => {
                    state.buf.extend_from_slice(&chunk);
                    while let Some(pos) = state.buf.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = state.buf.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1])
                            .trim()
                            .to_string();
                        if !line.is_empty() {
                            state.pending.push_back(line);
                        }
                    }
                }
                Some(Err(e)) => return Some((Err(e), state)),
                None => {
                    state.finished = true;
                    if !state.buf.is_empty() {
                        let line = String::from_utf8_lossy(&state.buf).trim().to_string();
                        state.buf.clear();
                        if !line.is_empty() {
                            return Some((Ok(line), state));
                        }
                    }
                }
            }
        }
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

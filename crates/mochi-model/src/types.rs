use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role tag on a wire-level chat message sent to the upstream daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call as emitted by the upstream model: a name plus an argument
/// mapping of string keys to JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDescriptor {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A single message in the array sent to the upstream daemon's chat
/// endpoint. This is the wire shape, not the persisted session shape —
/// `mochi_core::session::Message` converts to this via `to_wire`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDescriptor>>,
    /// Set for `role: Tool` messages — the name of the tool this message
    /// answers. Mirrors Ollama's own `tool` message shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into(), tool_calls: None, tool_name: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into(), tool_calls: None, tool_name: None }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCallDescriptor>>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into(), tool_calls, tool_name: None }
    }

    pub fn tool(content: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_name: Some(tool_name.into()),
        }
    }
}

/// Upstream-compatible tool schema, as sent in `chat_stream`'s `tools` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A single request to the upstream daemon's chat endpoint.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSchema>,
    pub think: bool,
    /// Passed through verbatim as `options.num_ctx` when set.
    pub num_ctx: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self { model: model.into(), messages, tools: Vec::new(), think: false, num_ctx: None }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_think(mut self, think: bool) -> Self {
        self.think = think;
        self
    }

    pub fn with_num_ctx(mut self, num_ctx: Option<u32>) -> Self {
        self.num_ctx = num_ctx;
        self
    }
}

/// One record in the chat stream. The sequence is finite and
/// non-restartable; the final chunk carries `done = true` and the token
/// counts for the whole exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDescriptor>>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
}

/// A model descriptor as reported by `list_models`/`get_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub size: u64,
    pub format: String,
    pub family: String,
    pub parameter_size: String,
    pub quantization_level: String,
    pub capabilities: Vec<String>,
    pub max_context_length: u32,
}

impl ModelDescriptor {
    pub fn supports_completion(&self) -> bool {
        self.capabilities.iter().any(|c| c == "completion")
    }

    pub fn supports_structured_output(&self) -> bool {
        self.capabilities.iter().any(|c| c == "completion")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The fixed catalog of events a turn can emit, streamed to clients over
//! SSE in strict algorithmic order: no buffering past the end of a
//! logical step, `message_complete` always precedes `done`, and `done` is
//! always the last event on the happy path.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TurnEvent {
    ContentDelta { content: String, role: String },
    ThinkingDelta { content: String },
    ToolCall { tool_name: String, arguments: Value, call_index: usize },
    ToolCallConfirmationRequired { tool_name: String, arguments: Value, call_index: usize, confirmation_id: String },
    ToolResult {
        tool_name: String,
        success: bool,
        result: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
        call_index: usize,
    },
    ToolContinuationStart { message: String },
    AgentStart { agent_name: String, instruction: String },
    AgentPlanning { content: String },
    AgentExecution { content: String },
    AgentToolCall { agent_name: String, tool_name: String, arguments: Value },
    AgentToolResult { agent_name: String, tool_name: String, success: bool, result: String },
    AgentComplete { agent_name: String, session_id: String, output: String },
    MessageComplete { message_id: String, model: String, eval_count: u32, prompt_eval_count: u32, context_window: u32 },
    Error { code: String, message: String, details: Value },
    Done { session_id: String },
}

impl TurnEvent {
    /// The SSE `event:` field name for this variant, e.g. `content_delta`.
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::ContentDelta { .. } => "content_delta",
            TurnEvent::ThinkingDelta { .. } => "thinking_delta",
            TurnEvent::ToolCall { .. } => "tool_call",
            TurnEvent::ToolCallConfirmationRequired { .. } => "tool_call_confirmation_required",
            TurnEvent::ToolResult { .. } => "tool_result",
            TurnEvent::ToolContinuationStart { .. } => "tool_continuation_start",
            TurnEvent::AgentStart { .. } => "agent_start",
            TurnEvent::AgentPlanning { .. } => "agent_planning",
            TurnEvent::AgentExecution { .. } => "agent_execution",
            TurnEvent::AgentToolCall { .. } => "agent_tool_call",
            TurnEvent::AgentToolResult { .. } => "agent_tool_result",
            TurnEvent::AgentComplete { .. } => "agent_complete",
            TurnEvent::MessageComplete { .. } => "message_complete",
            TurnEvent::Error { .. } => "error",
            TurnEvent::Done { .. } => "done",
        }
    }

    /// Just the `data` payload, as sent in an SSE frame alongside `name()`.
    pub fn data(&self) -> Value {
        serde_json::to_value(self).ok().and_then(|v| v.get("data").cloned()).unwrap_or(Value::Null)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Done { .. } | TurnEvent::Error { .. })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

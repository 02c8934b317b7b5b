// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim).
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// Outcome of executing a [`ToolCall`]. Always coerced to a string before
/// being handed back to the orchestrator, per the tool contract.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>, duration_ms: u64) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: false, duration_ms }
    }

    pub fn err(call_id: impl Into<String>, message: impl std::fmt::Display, duration_ms: u64) -> Self {
        Self {
            call_id: call_id.into(),
            content: format!("Error: {message}"),
            is_error: true,
            duration_ms,
        }
    }
}

/// A named, schema-described callable the model may invoke during a turn.
///
/// Implementations are immutable after construction so a [`ToolRegistry`][crate::registry::ToolRegistry]
/// can safely hand out `Arc<dyn Tool>` for parallel tool-call dispatch.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    /// Whether this tool is flagged destructive for `confirm_destructive`
    /// session policy. Defaults to `false`; manifest-backed tools set this
    /// from their `tool.yaml`.
    fn is_destructive(&self) -> bool {
        false
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Error taxonomy shared by the turn orchestrator and the HTTP layer. Each
//! variant carries the exact upper-snake-case code that goes out in the
//! `{"error": {"code", "message", "details"}}` envelope.

use serde_json::Value;
use thiserror::Error;

use crate::session::SessionError;
use mochi_model::UpstreamError;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("agent invalid: {0}")]
    AgentInvalid(String),
    #[error("system prompt not found: {0}")]
    PromptNotFound(String),
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
    #[error("upstream error: {0}")]
    UpstreamErrorResponse(String),
    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),
    #[error("tool execution denied: {0}")]
    ToolExecutionDenied(String),
    #[error("tool confirmation timed out: {0}")]
    ToolConfirmationTimeout(String),
    #[error("invalid message index: {0}")]
    InvalidMessageIndex(usize),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl TurnError {
    pub fn code(&self) -> &'static str {
        match self {
            TurnError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            TurnError::ModelNotFound(_) => "MODEL_NOT_FOUND",
            TurnError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            TurnError::AgentNotFound(_) => "AGENT_NOT_FOUND",
            TurnError::AgentInvalid(_) => "AGENT_INVALID",
            TurnError::PromptNotFound(_) => "PROMPT_NOT_FOUND",
            TurnError::UpstreamUnreachable(_) => "UPSTREAM_UNREACHABLE",
            TurnError::UpstreamErrorResponse(_) => "UPSTREAM_ERROR",
            TurnError::ToolExecutionFailed(_) => "TOOL_EXECUTION_FAILED",
            TurnError::ToolExecutionDenied(_) => "TOOL_EXECUTION_DENIED",
            TurnError::ToolConfirmationTimeout(_) => "TOOL_CONFIRMATION_TIMEOUT",
            TurnError::InvalidMessageIndex(_) => "INVALID_MESSAGE_INDEX",
            TurnError::ValidationError(_) => "VALIDATION_ERROR",
            TurnError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn details(&self) -> Value {
        match self {
            TurnError::SessionNotFound(id) => serde_json::json!({ "session_id": id }),
            TurnError::ModelNotFound(name) => serde_json::json!({ "model": name }),
            TurnError::ToolNotFound(name) => serde_json::json!({ "tool_name": name }),
            TurnError::AgentNotFound(name) => serde_json::json!({ "agent_name": name }),
            TurnError::AgentInvalid(reason) => serde_json::json!({ "reason": reason }),
            TurnError::PromptNotFound(name) => serde_json::json!({ "prompt_name": name }),
            TurnError::UpstreamUnreachable(reason) => serde_json::json!({ "reason": reason }),
            TurnError::UpstreamErrorResponse(reason) => serde_json::json!({ "reason": reason }),
            TurnError::ToolExecutionFailed(reason) => serde_json::json!({ "reason": reason }),
            TurnError::ToolExecutionDenied(reason) => serde_json::json!({ "reason": reason }),
            TurnError::ToolConfirmationTimeout(confirmation_id) => serde_json::json!({ "confirmation_id": confirmation_id }),
            TurnError::InvalidMessageIndex(index) => serde_json::json!({ "index": index }),
            TurnError::ValidationError(reason) => serde_json::json!({ "reason": reason }),
            TurnError::InternalError(reason) => serde_json::json!({ "reason": reason }),
        }
    }
}

impl From<SessionError> for TurnError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => TurnError::SessionNotFound(id),
            SessionError::InvalidMessageIndex(i) => TurnError::InvalidMessageIndex(i),
            other => TurnError::InternalError(other.to_string()),
        }
    }
}

impl From<UpstreamError> for TurnError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Transport(msg) => TurnError::UpstreamUnreachable(msg),
            UpstreamError::ModelNotFound(name) => TurnError::ModelNotFound(name),
            UpstreamError::Protocol(msg) | UpstreamError::StructuredOutputInvalid(msg) => TurnError::UpstreamErrorResponse(msg),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

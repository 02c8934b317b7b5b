// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Summary task: a best-effort background job that asks the upstream
//! model to summarize a session once its latest committed message is a
//! tool-call-free assistant reply. Runs on a long-lived worker pool owned
//! by the process, never inline with the HTTP handler that triggered it.

use std::sync::Arc;

use mochi_model::{CompletionRequest, ModelDescriptor, UpstreamClient};
use tracing::warn;

use crate::session::{Message, Session, SessionStore, SessionSummary};

fn summary_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "topics": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["summary", "topics"]
    })
}

/// Whether `session`'s latest message qualifies it for summarization: at
/// least two messages, the last one an assistant reply with no tool
/// calls.
pub fn is_eligible(session: &Session) -> bool {
    if session.messages.len() < 2 {
        return false;
    }
    matches!(session.messages.last(), Some(Message::Assistant { tool_calls, .. }) if tool_calls.is_empty())
}

/// Picks the model to summarize with: the session's own model if it
/// supports structured output, else its stored `summary_model`, else a
/// model supplied for an on-demand request, else `None` (skip).
pub fn select_model<'a>(
    session_model: &'a ModelDescriptor,
    stored_summary_model: Option<&'a str>,
    requested_model: Option<&'a str>,
) -> Option<&'a str> {
    if session_model.supports_structured_output() {
        return Some(&session_model.name);
    }
    stored_summary_model.or(requested_model)
}

/// Runs the summary task for `session_id`, swallowing any failure. On
/// success, patches the session's metadata with the new summary.
pub async fn summarize(upstream: &Arc<dyn UpstreamClient>, sessions: &SessionStore, session_id: &str, model: &str) {
    let session = match sessions.read(session_id) {
        Ok(s) => s,
        Err(e) => {
            warn!(session_id, error = %e, "summary task: session unreadable");
            return;
        }
    };
    if !is_eligible(&session) {
        return;
    }

    let history: Vec<_> = session.messages.iter().map(Message::to_wire).collect();
    let request = CompletionRequest::new(model, history);
    let result = upstream.structured_chat(request, summary_schema()).await;

    let value = match result {
        Ok(v) => v,
        Err(e) => {
            warn!(session_id, error = %e, "summary task: upstream call failed");
            return;
        }
    };

    let summary: SessionSummary = match serde_json::from_value(value) {
        Ok(s) => s,
        Err(e) => {
            warn!(session_id, error = %e, "summary task: malformed structured output");
            return;
        }
    };

    if let Err(e) = sessions.patch_metadata(session_id, |m| {
        m.summary = Some(summary);
        m.summary_model = Some(model.to_string());
    }) {
        warn!(session_id, error = %e, "summary task: failed to persist summary");
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

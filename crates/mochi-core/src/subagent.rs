// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent sub-orchestrator: runs a registered agent against a focused
//! instruction in two phases — a planning pass that produces a persisted
//! directive, preceded by an ephemeral planning preamble never itself
//! persisted, followed by an execution pass that may call the agent's
//! private tools. Unlike the calling turn, an agent has its own persistent
//! session: a `session_id` passed with the `agent` tool call resumes it,
//! absent or unknown ids start a fresh one. Invoked by the turn
//! orchestrator when the model calls the synthetic `agent` tool.

use futures::StreamExt;
use serde_json::Value;

use mochi_agents::AgentDescriptor;
use mochi_model::{ChatChunk, ChatMessage, CompletionRequest, ToolSchema as WireToolSchema, UpstreamClient};
use mochi_tools::ToolCall;

use crate::error::TurnError;
use crate::events::TurnEvent;
use crate::session::{Message, SessionStore, ToolCallDescriptor as SessionToolCall};

const PLANNING_PREAMBLE: &str = "Before acting, write a short plan for how you will complete this instruction.";
const EXECUTION_PREAMBLE: &str = "Carry out your plan. Call tools as needed; reply with no tool calls once you are done.";

async fn run_completion(
    upstream: &dyn UpstreamClient,
    request: CompletionRequest,
    mut on_delta: impl FnMut(&str),
) -> Result<ChatChunk, TurnError> {
    let mut stream = upstream.chat_stream(request).await?;
    let mut content = String::new();
    let mut terminal = ChatChunk::default();
    while let Some(next) = stream.next().await {
        let chunk = next?;
        if !chunk.content.is_empty() {
            content.push_str(&chunk.content);
            on_delta(&chunk.content);
        }
        if chunk.done {
            terminal = chunk;
            break;
        }
    }
    terminal.content = content;
    Ok(terminal)
}

/// Renders every assistant/tool message in `messages` as the deterministic
/// transcript returned to the calling turn: assistant text, a line per
/// tool call, and a line per tool result, in persisted order.
fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        match message {
            Message::Assistant { content, tool_calls, .. } => {
                if !content.is_empty() {
                    out.push_str(content);
                    out.push('\n');
                }
                for call in tool_calls {
                    out.push_str(&format!("[tool_call: {} {}]\n", call.name, call.arguments));
                }
            }
            Message::Tool { tool_name, content, is_error, .. } => {
                let prefix = if *is_error { "tool_error" } else { "tool_result" };
                out.push_str(&format!("[{prefix}: {tool_name} {content}]\n"));
            }
            Message::User { .. } | Message::System { .. } => {}
        }
    }
    out
}

/// Loads the agent session named by `session_id`, or creates a fresh one
/// if it is absent or does not exist — the `agent` tool's documented
/// behavior for an unknown `session_id`.
fn load_or_create_session(store: &SessionStore, model: &str, session_id: Option<&str>) -> Result<crate::session::Session, TurnError> {
    if let Some(id) = session_id {
        if let Ok(session) = store.read(id) {
            return Ok(session);
        }
    }
    Ok(store.create(model)?)
}

/// Runs `agent` against `instruction` in its own persistent session (in
/// `agent_chats`, distinct from the calling turn's session) and returns a
/// `Session ID: {id}\n`-prefixed transcript of everything produced, for use
/// as the tool result string of the `agent` call that triggered it. Emits
/// `agent_*` events for the caller to forward.
pub async fn run_subagent(
    upstream: &dyn UpstreamClient,
    agent: &AgentDescriptor,
    model: &str,
    agent_chats: &SessionStore,
    session_id: Option<&str>,
    instruction: &str,
    max_iterations: u32,
    mut emit: impl FnMut(TurnEvent),
) -> Result<String, TurnError> {
    emit(TurnEvent::AgentStart { agent_name: agent.name.clone(), instruction: instruction.to_string() });

    let session = load_or_create_session(agent_chats, model, session_id)?;
    let agent_session_id = session.metadata.session_id.clone();
    agent_chats.set_system_message(&agent_session_id, agent.system_prompt.clone(), "agent".into())?;
    let session = agent_chats.append_message(&agent_session_id, Message::user(instruction.to_string()))?;
    let since_instruction = session.messages.len();

    let mut planning_wire: Vec<ChatMessage> = session.messages.iter().map(Message::to_wire).collect();
    planning_wire.push(ChatMessage::user(PLANNING_PREAMBLE.to_string()));
    let directive = run_completion(upstream, CompletionRequest::new(model, planning_wire), |delta| {
        emit(TurnEvent::AgentPlanning { content: delta.to_string() });
    })
    .await?
    .content;
    let mut session = agent_chats.append_message(&agent_session_id, Message::assistant(directive, vec![]))?;

    let schemas: Vec<WireToolSchema> =
        agent.tools.schemas().into_iter().map(|s| WireToolSchema { name: s.name, description: s.description, parameters: s.parameters }).collect();
    let mut rounds = 0u32;
    loop {
        if rounds >= max_iterations {
            session = agent_chats.append_message(
                &agent_session_id,
                Message::assistant(format!("(stopped after {max_iterations} rounds without a final answer)"), vec![]),
            )?;
            break;
        }
        rounds += 1;

        let mut execution_wire: Vec<ChatMessage> = session.messages.iter().map(Message::to_wire).collect();
        execution_wire.push(ChatMessage::user(EXECUTION_PREAMBLE.to_string()));
        let request = CompletionRequest::new(model, execution_wire).with_tools(schemas.clone());
        let chunk = run_completion(upstream, request, |delta| {
            emit(TurnEvent::AgentExecution { content: delta.to_string() });
        })
        .await?;

        let tool_calls = chunk.tool_calls.clone().unwrap_or_default();
        if tool_calls.is_empty() {
            session = agent_chats.append_message(&agent_session_id, Message::assistant(chunk.content, vec![]))?;
            if rounds > 1 {
                break;
            }
            // A no-tool response on the first iteration is an announcement,
            // not a final answer: give the agent one more iteration.
            continue;
        }

        let descriptors: Vec<SessionToolCall> =
            tool_calls.iter().map(|c| SessionToolCall { name: c.name.clone(), arguments: c.arguments.clone() }).collect();
        session = agent_chats.append_message(&agent_session_id, Message::assistant(chunk.content, descriptors))?;

        for call in tool_calls {
            emit(TurnEvent::AgentToolCall { agent_name: agent.name.clone(), tool_name: call.name.clone(), arguments: call.arguments.clone() });
            let output = agent
                .tools
                .execute(&ToolCall { id: call.name.clone(), name: call.name.clone(), args: call.arguments.clone() })
                .await;
            emit(TurnEvent::AgentToolResult {
                agent_name: agent.name.clone(),
                tool_name: call.name.clone(),
                success: !output.is_error,
                result: output.content.clone(),
            });
            session = agent_chats.append_message(&agent_session_id, Message::tool(call.name, output.content, output.is_error))?;
        }
    }

    let transcript = render_transcript(&session.messages[since_instruction..]);
    let final_output = format!("Session ID: {agent_session_id}\n{transcript}");
    emit(TurnEvent::AgentComplete { agent_name: agent.name.clone(), session_id: agent_session_id, output: final_output.clone() });
    Ok(final_output)
}

/// The JSON Schema for the synthetic `agent` tool surfaced to the
/// upstream model whenever any agents are enabled for a session.
pub fn agent_tool_schema(agent_names: &[String]) -> Value {
    serde_json::json!({
        "name": "agent",
        "description": "Delegate a focused task to a registered sub-agent by name. Pass session_id to continue a prior agent conversation.",
        "parameters": {
            "type": "object",
            "properties": {
                "name": { "type": "string", "enum": agent_names },
                "instruction": { "type": "string" },
                "session_id": { "type": "string", "description": "Continues a prior agent conversation; omit to start a new one." }
            },
            "required": ["name", "instruction"]
        }
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

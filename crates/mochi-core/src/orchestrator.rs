// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The turn orchestrator: the control loop that drives one conversational
//! turn from a user message (or a bare regeneration request) through
//! zero or more rounds of tool calls to a committed assistant message.
//! [`Orchestrator::run_streaming`] emits [`TurnEvent`]s in strict
//! algorithmic order as it goes; [`Orchestrator::run`] drives the same
//! algorithm against an internal sink and returns only the aggregate.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use mochi_agents::AgentDescriptor;
use mochi_model::{ChatMessage, CompletionRequest, ToolSchema as WireToolSchema, UpstreamClient};
use mochi_tools::{requires_confirmation, ToolCall, ToolRegistry};

use crate::confirmation::ConfirmationBroker;
use crate::error::TurnError;
use crate::events::TurnEvent;
use crate::planner::{self, LastUsage};
use crate::session::{Message, Session, SessionStore, ToolCallDescriptor as SessionToolCall};
use crate::subagent::{agent_tool_schema, run_subagent};

/// Everything the orchestrator needs to drive turns: a session store, the
/// globally registered tools and agents, the upstream client, and the
/// shared confirmation broker. `agent_chats` is a separate session store,
/// over a separate root directory, holding agents' own persistent
/// conversations — distinct from `sessions`, which holds the calling
/// turns.
pub struct Orchestrator {
    pub sessions: SessionStore,
    pub agent_chats: SessionStore,
    pub tools: Arc<ToolRegistry>,
    pub agents: Arc<Vec<AgentDescriptor>>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub confirmations: ConfirmationBroker,
    pub confirmation_timeout: Duration,
    pub max_tool_rounds: u32,
    pub max_agent_iterations: u32,
}

/// Scans backward for the most recent assistant message that recorded
/// usage, so the planner can see what the previous exchange cost.
fn last_usage(session: &Session) -> Option<LastUsage> {
    session.messages.iter().rev().find_map(|m| {
        m.usage().map(|(eval_count, prompt_eval_count)| LastUsage { eval_count, prompt_eval_count })
    })
}

/// Aggregate result of the non-streaming variant.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub message: String,
    pub tool_calls_executed: usize,
    pub context_window: u32,
}

fn visible_tool_schemas(registry: &ToolRegistry, session: &Session) -> Vec<WireToolSchema> {
    let mut schemas = registry.schemas();
    let settings = &session.metadata.tool_settings;
    if !settings.enabled_tools.is_empty() {
        schemas.retain(|s| settings.enabled_tools.contains(&s.name));
    }
    if let Some(group) = &settings.group {
        match registry.groups().get(group) {
            Some(names) => schemas.retain(|s| names.contains(&s.name)),
            None => schemas.clear(),
        }
    }
    schemas.into_iter().map(|s| WireToolSchema { name: s.name, description: s.description, parameters: s.parameters }).collect()
}

impl Orchestrator {
    /// Drives one turn, emitting events via `emit` as they occur. Errors
    /// detected before the upstream stream opens are returned directly;
    /// everything after that point is surfaced as an `error` event
    /// followed by `done`, never as an `Err`.
    pub async fn run_streaming(
        &self,
        session_id: &str,
        user_message: Option<String>,
        think: bool,
        mut emit: impl FnMut(TurnEvent),
    ) -> Result<(), TurnError> {
        let mut session = self.sessions.read(session_id)?;

        if let Some(text) = user_message {
            session = self.sessions.append_message(session_id, Message::user(text))?;
        } else if session.messages.is_empty() {
            return Err(TurnError::ValidationError("session has no history and no message was supplied".into()));
        }

        let model_descriptor = self.upstream.get_model(&session.metadata.model).await?;
        let has_exchanged = session.messages.iter().any(|m| matches!(m, Message::Assistant { .. }));
        let model_changed = session.metadata.context_window_config.last_model.as_deref() != Some(session.metadata.model.as_str());
        let (window, reason) =
            planner::plan(&session.metadata.context_window_config, model_descriptor.max_context_length, has_exchanged, last_usage(&session), model_changed);
        session = self.sessions.patch_metadata(session_id, |m| {
            let model = m.model.clone();
            m.context_window_config.record_adjustment(window, reason);
            m.context_window_config.last_model = Some(model);
        })?;

        let enabled_agents: Vec<String> = session.metadata.agent_settings.enabled_agents.clone();
        let mut rounds: u32 = 0;
        // Carries content across tool-call rounds: a round that ends in
        // tool calls does not reset it, so the eventual terminal commit
        // reflects the whole turn's narrated text, not just its last leg.
        let mut accumulated = String::new();

        loop {
            let mut upstream_tools = visible_tool_schemas(&self.tools, &session);
            if !enabled_agents.is_empty() {
                let schema = agent_tool_schema(&enabled_agents);
                upstream_tools.push(WireToolSchema {
                    name: schema["name"].as_str().unwrap_or("agent").to_string(),
                    description: schema["description"].as_str().unwrap_or_default().to_string(),
                    parameters: schema["parameters"].clone(),
                });
            }

            let wire_messages: Vec<ChatMessage> = session.messages.iter().map(Message::to_wire).collect();
            let request = CompletionRequest::new(session.metadata.model.clone(), wire_messages)
                .with_tools(upstream_tools)
                .with_think(think)
                .with_num_ctx(Some(window));

            let mut stream = match self.upstream.chat_stream(request).await {
                Ok(s) => s,
                Err(e) => {
                    let err: TurnError = e.into();
                    emit(TurnEvent::Error { code: err.code().to_string(), message: err.to_string(), details: err.details() });
                    emit(TurnEvent::Done { session_id: session_id.to_string() });
                    return Ok(());
                }
            };

            let mut terminal = None;
            while let Some(next) = stream.next().await {
                match next {
                    Ok(chunk) => {
                        if !chunk.content.is_empty() {
                            accumulated.push_str(&chunk.content);
                            emit(TurnEvent::ContentDelta { content: chunk.content.clone(), role: "assistant".into() });
                        }
                        if think {
                            if let Some(thinking) = chunk.thinking.clone().filter(|t| !t.is_empty()) {
                                emit(TurnEvent::ThinkingDelta { content: thinking });
                            }
                        }
                        let done = chunk.done;
                        terminal = Some(chunk);
                        if done {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }

            let Some(terminal) = terminal.filter(|c| c.done) else {
                // Client (or upstream) disconnected mid-stream: commit what
                // was produced so far and stop.
                self.sessions.append_message(session_id, Message::assistant(accumulated.clone(), vec![]))?;
                return Ok(());
            };

            let tool_calls = terminal.tool_calls.clone().unwrap_or_default();
            if tool_calls.is_empty() {
                let updated = self.sessions.append_message(
                    session_id,
                    Message::assistant_with_usage(
                        accumulated.clone(),
                        session.metadata.model.clone(),
                        terminal.eval_count.unwrap_or(0),
                        terminal.prompt_eval_count.unwrap_or(0),
                        vec![],
                    ),
                )?;
                let message_id = updated.messages.last().expect("just appended").id().to_string();
                emit(TurnEvent::MessageComplete {
                    message_id,
                    model: session.metadata.model.clone(),
                    eval_count: terminal.eval_count.unwrap_or(0),
                    prompt_eval_count: terminal.prompt_eval_count.unwrap_or(0),
                    context_window: window,
                });
                emit(TurnEvent::Done { session_id: session_id.to_string() });
                return Ok(());
            }

            let descriptors: Vec<SessionToolCall> = tool_calls.iter().map(|c| SessionToolCall { name: c.name.clone(), arguments: c.arguments.clone() }).collect();
            session = self.sessions.append_message(
                session_id,
                Message::assistant_with_usage(
                    accumulated.clone(),
                    session.metadata.model.clone(),
                    terminal.eval_count.unwrap_or(0),
                    terminal.prompt_eval_count.unwrap_or(0),
                    descriptors,
                ),
            )?;

            for (call_index, call) in tool_calls.iter().enumerate() {
                if call.name == "agent" {
                    let agent_name = call.arguments.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                    let instruction = call.arguments.get("instruction").and_then(|v| v.as_str()).unwrap_or_default();
                    let agent_session_id = call.arguments.get("session_id").and_then(|v| v.as_str());
                    let text = match self.agents.iter().find(|a| a.name == agent_name) {
                        Some(agent) => {
                            let model = agent.model.as_deref().unwrap_or(&session.metadata.model);
                            match run_subagent(
                                self.upstream.as_ref(),
                                agent,
                                model,
                                &self.agent_chats,
                                agent_session_id,
                                instruction,
                                self.max_agent_iterations,
                                &mut emit,
                            )
                            .await
                            {
                                Ok(out) => out,
                                Err(e) => format!("Error: {e}"),
                            }
                        }
                        None => format!("Error: unknown agent {agent_name}"),
                    };
                    session = self.sessions.append_message(session_id, Message::tool("agent", text, false))?;
                    continue;
                }

                let is_destructive = self.tools.is_destructive(&call.name);
                let policy = session.metadata.tool_settings.execution_policy;

                if !requires_confirmation(policy, is_destructive) {
                    emit(TurnEvent::ToolCall { tool_name: call.name.clone(), arguments: call.arguments.clone(), call_index });
                    let output = self.tools.execute(&ToolCall { id: call.name.clone(), name: call.name.clone(), args: call.arguments.clone() }).await;
                    emit(TurnEvent::ToolResult {
                        tool_name: call.name.clone(),
                        success: !output.is_error,
                        result: output.content.clone(),
                        error_message: output.is_error.then(|| output.content.clone()),
                        call_index,
                    });
                    session = self.sessions.append_message(session_id, Message::tool(call.name.clone(), output.content, output.is_error))?;
                    continue;
                }

                let confirmation_id = self.confirmations.register(session_id, call.name.clone(), call.arguments.clone(), self.confirmation_timeout).await;
                emit(TurnEvent::ToolCallConfirmationRequired { tool_name: call.name.clone(), arguments: call.arguments.clone(), call_index, confirmation_id: confirmation_id.clone() });

                match self.confirmations.wait(&confirmation_id).await {
                    Some(decision) if decision.approved => {
                        let output = self.tools.execute(&ToolCall { id: call.name.clone(), name: call.name.clone(), args: call.arguments.clone() }).await;
                        emit(TurnEvent::ToolResult {
                            tool_name: call.name.clone(),
                            success: !output.is_error,
                            result: output.content.clone(),
                            error_message: output.is_error.then(|| output.content.clone()),
                            call_index,
                        });
                        session = self.sessions.append_message(session_id, Message::tool(call.name.clone(), output.content, output.is_error))?;
                    }
                    Some(decision) => {
                        let message = match decision.reason.as_deref() {
                            Some("timeout") => "denied by user (timeout)".to_string(),
                            _ => "denied by user".to_string(),
                        };
                        emit(TurnEvent::ToolResult { tool_name: call.name.clone(), success: false, result: String::new(), error_message: Some(message.clone()), call_index });
                        session = self.sessions.append_message(session_id, Message::tool(call.name.clone(), format!("Error: {message}"), true))?;
                    }
                    None => {
                        emit(TurnEvent::ToolResult { tool_name: call.name.clone(), success: false, result: String::new(), error_message: Some("confirmation broker error".into()), call_index });
                        session = self.sessions.append_message(session_id, Message::tool(call.name.clone(), "Error: confirmation broker error", true))?;
                    }
                }
            }

            emit(TurnEvent::ToolContinuationStart { message: "continuing after tool results".into() });
            rounds += 1;
            if rounds >= self.max_tool_rounds {
                let updated = self.sessions.append_message(
                    session_id,
                    Message::assistant_with_usage("(stopped: maximum tool rounds reached)", session.metadata.model.clone(), 0, 0, vec![]),
                )?;
                let message_id = updated.messages.last().expect("just appended").id().to_string();
                emit(TurnEvent::MessageComplete { message_id, model: session.metadata.model.clone(), eval_count: 0, prompt_eval_count: 0, context_window: window });
                emit(TurnEvent::Done { session_id: session_id.to_string() });
                return Ok(());
            }
        }
    }

    /// Runs the same algorithm against an internal sink, discarding
    /// deltas and returning only the final content and tool-call count.
    pub async fn run(&self, session_id: &str, user_message: Option<String>, think: bool) -> Result<TurnOutcome, TurnError> {
        let mut message = String::new();
        let mut tool_calls_executed = 0usize;
        let mut context_window = 0u32;
        let mut error: Option<TurnError> = None;

        self.run_streaming(session_id, user_message, think, |event| match event {
            TurnEvent::ContentDelta { content, .. } => message.push_str(&content),
            TurnEvent::ToolResult { .. } => tool_calls_executed += 1,
            TurnEvent::MessageComplete { context_window: cw, .. } => context_window = cw,
            TurnEvent::Error { code, message: msg, .. } => error = Some(TurnError::InternalError(format!("{code}: {msg}"))),
            _ => {}
        })
        .await?;

        if let Some(err) = error {
            return Err(err);
        }

        Ok(TurnOutcome { session_id: session_id.to_string(), message, tool_calls_executed, context_window })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

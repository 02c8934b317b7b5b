// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The `/api/v1` route table: one handler per §6.1 endpoint, all built on
//! [`AppState`] and returning [`ApiError`] on failure.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use mochi_core::ResolveOutcome;
use mochi_model::UpstreamError;
use tower_http::trace::TraceLayer;

use crate::dto::*;
use crate::error::ApiError;
use crate::sse::turn_stream;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_v1() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/models/:name", get(get_model))
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/:id", get(get_session).patch(patch_session).delete(delete_session))
        .route("/sessions/:id/messages", get(list_messages))
        .route("/sessions/:id/messages/:index", put(edit_message))
        .route("/sessions/:id/system-prompt", put(set_system_prompt).delete(remove_system_prompt))
        .route("/sessions/:id/status", get(session_status))
        .route("/sessions/:id/summarize", post(force_summarize))
        .route("/sessions/:id/summary", get(get_summary))
        .route("/chat/:id", post(chat))
        .route("/chat/:id/stream", post(chat_stream))
        .route("/chat/:id/confirm-tool", post(confirm_tool))
        .route("/system-prompts", get(list_prompts).post(create_prompt))
        .route("/system-prompts/:name", get(get_prompt).delete(delete_prompt))
        .route("/tools", get(list_tools))
        .route("/tools/reload", post(reload_tools))
        .route("/agents", get(list_agents))
        .route("/agents/reload", post(reload_agents))
        .route("/agents/sessions/:id", get(get_agent_session))
}

// ─── Health & models ───────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let upstream_reachable = state.upstream.list_models().await.is_ok();
    Json(HealthResponse { status: "ok", upstream_reachable })
}

async fn list_models(State(state): State<AppState>) -> Result<Json<ModelListResponse>, ApiError> {
    let models = state.upstream.list_models().await.map_err(upstream_to_api)?;
    Ok(Json(ModelListResponse { models }))
}

async fn get_model(State(state): State<AppState>, Path(name): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let model = state.upstream.get_model(&name).await.map_err(upstream_to_api)?;
    Ok(Json(model))
}

fn upstream_to_api(e: UpstreamError) -> ApiError {
    mochi_core::TurnError::from(e).into()
}

// ─── Sessions ────────────────────────────────────────────────────────────────

async fn create_session(State(state): State<AppState>, Json(req): Json<CreateSessionRequest>) -> Result<impl IntoResponse, ApiError> {
    let session = state.sessions.create(&req.model)?;
    let id = session.metadata.session_id.clone();

    if let Some(patch) = &req.tool_settings {
        state.sessions.patch_metadata(&id, |m| {
            if let Some(v) = &patch.enabled_tools {
                m.tool_settings.enabled_tools = v.clone();
            }
            if let Some(v) = &patch.group {
                m.tool_settings.group = Some(v.clone());
            }
            if let Some(v) = patch.execution_policy {
                m.tool_settings.execution_policy = v;
            }
        })?;
    }
    if let Some(agents) = &req.enabled_agents {
        state.sessions.patch_metadata(&id, |m| m.agent_settings.enabled_agents = agents.clone())?;
    }
    let session = match &req.system_prompt {
        Some(content) => state.sessions.set_system_message(&id, content.clone(), "api".into())?,
        None => state.sessions.read(&id)?,
    };

    Ok((StatusCode::CREATED, Json(to_session_response(session))))
}

async fn list_sessions(State(state): State<AppState>) -> Result<Json<SessionListResponse>, ApiError> {
    Ok(Json(SessionListResponse { sessions: state.sessions.list()? }))
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionResponse>, ApiError> {
    Ok(Json(to_session_response(state.sessions.read(&id)?)))
}

async fn patch_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PatchSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.patch_metadata(&id, |m| {
        if let Some(model) = &req.model {
            m.model = model.clone();
        }
        if let Some(patch) = &req.tool_settings {
            if let Some(v) = &patch.enabled_tools {
                m.tool_settings.enabled_tools = v.clone();
            }
            if let Some(v) = &patch.group {
                m.tool_settings.group = Some(v.clone());
            }
            if let Some(v) = patch.execution_policy {
                m.tool_settings.execution_policy = v;
            }
        }
        if let Some(agents) = &req.enabled_agents {
            m.agent_settings.enabled_agents = agents.clone();
        }
        if let Some(window) = req.manual_context_window {
            m.context_window_config.manual_override = true;
            m.context_window_config.current_window = window;
        }
    })?;
    Ok(Json(to_session_response(session)))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.sessions.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<mochi_core::Message>>, ApiError> {
    Ok(Json(state.sessions.get_messages(&id)?))
}

async fn edit_message(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    Json(req): Json<EditMessageRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.edit_message(&id, index, req.content)?;
    Ok(Json(to_session_response(session)))
}

async fn set_system_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SystemPromptRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.set_system_message(&id, req.content, req.source)?;
    Ok(Json(to_session_response(session)))
}

async fn remove_system_prompt(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.remove_system_message(&id)?;
    Ok(Json(to_session_response(session)))
}

async fn session_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionStatusResponse>, ApiError> {
    let session = state.sessions.read(&id)?;
    Ok(Json(SessionStatusResponse {
        session_id: session.metadata.session_id,
        model: session.metadata.model,
        message_count: session.metadata.message_count,
        context_window: session.metadata.context_window_config.current_window,
        last_adjustment_reason: serde_json::to_value(session.metadata.context_window_config.last_adjustment_reason).unwrap_or_default(),
        summary_available: session.metadata.summary.is_some(),
    }))
}

async fn force_summarize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SummarizeRequest>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.read(&id)?;
    let model_descriptor = state.upstream.get_model(&session.metadata.model).await.map_err(upstream_to_api)?;
    let model = mochi_core::summary::select_model(&model_descriptor, session.metadata.summary_model.as_deref(), req.model.as_deref())
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation("no model capable of structured summarization is available"))?;
    mochi_core::summary::summarize(&state.upstream, &state.sessions, &id, &model).await;
    Ok(StatusCode::ACCEPTED)
}

async fn get_summary(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let session = state.sessions.read(&id)?;
    match session.metadata.summary {
        Some(summary) => Ok(Json(summary)),
        None => Err(ApiError::not_found("PROMPT_NOT_FOUND", "no summary has been generated for this session")),
    }
}

// ─── Chat ────────────────────────────────────────────────────────────────────

async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let _guard = state.session_locks.acquire(&id, state.settings.session_lock_wait).await?;
    let orchestrator = state.orchestrator().await;
    let outcome = orchestrator.run(&id, req.message, req.think).await?;
    Ok(Json(ChatResponse {
        session_id: outcome.session_id,
        message: outcome.message,
        tool_calls_executed: outcome.tool_calls_executed,
        context_window: outcome.context_window,
    }))
}

async fn chat_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let guard = state.session_locks.acquire(&id, state.settings.session_lock_wait).await?;
    let orchestrator = state.orchestrator().await;
    // `guard` is handed to `turn_stream`, which moves it into the spawned
    // task and holds it until the turn finishes, so the lock covers the
    // turn's whole lifetime rather than just this handler call.
    Ok(turn_stream(orchestrator, id, req.message, req.think, guard))
}

async fn confirm_tool(State(state): State<AppState>, Json(req): Json<ConfirmToolRequest>) -> Result<Json<ConfirmToolResponse>, ApiError> {
    match state.confirmations.resolve(&req.confirmation_id, req.approved).await {
        ResolveOutcome::Resolved => Ok(Json(ConfirmToolResponse { outcome: "resolved" })),
        ResolveOutcome::AlreadyResolved => Ok(Json(ConfirmToolResponse { outcome: "already_resolved" })),
        ResolveOutcome::NotFound => Err(ApiError::not_found("TOOL_NOT_FOUND", "no pending confirmation with that id")),
    }
}

// ─── System prompts (collaborator) ─────────────────────────────────────────

async fn list_prompts(State(state): State<AppState>) -> Result<Json<SystemPromptListResponse>, ApiError> {
    let dir = state.settings.system_prompts_path();
    let mut prompts = Vec::new();
    if let Ok(entries) = std::fs::read_dir(&dir) {
        for entry in entries.flatten() {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                prompts.push(stem.to_string());
            }
        }
    }
    prompts.sort();
    Ok(Json(SystemPromptListResponse { prompts }))
}

async fn get_prompt(State(state): State<AppState>, Path(name): Path<String>) -> Result<String, ApiError> {
    let path = state.settings.system_prompts_path().join(format!("{name}.md"));
    std::fs::read_to_string(&path).map_err(|_| ApiError::not_found("PROMPT_NOT_FOUND", format!("no system prompt named {name}")))
}

async fn create_prompt(State(state): State<AppState>, Json(req): Json<NamedPromptRequest>) -> Result<StatusCode, ApiError> {
    let dir = state.settings.system_prompts_path();
    std::fs::create_dir_all(&dir).map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()))?;
    let path = dir.join(format!("{}.md", req.name));
    std::fs::write(&path, req.content).map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()))?;
    Ok(StatusCode::CREATED)
}

async fn delete_prompt(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    let path = state.settings.system_prompts_path().join(format!("{name}.md"));
    std::fs::remove_file(&path).map_err(|_| ApiError::not_found("PROMPT_NOT_FOUND", format!("no system prompt named {name}")))?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Tools & agents (collaborator) ──────────────────────────────────────────

async fn list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state.tools.read().await.schemas().into_iter().map(ToolSchemaDto::from).collect();
    Json(ToolListResponse { tools })
}

async fn reload_tools(State(state): State<AppState>) -> StatusCode {
    state.reload_tools().await;
    StatusCode::NO_CONTENT
}

async fn list_agents(State(state): State<AppState>) -> Json<AgentListResponse> {
    let agents = state
        .agents
        .read()
        .await
        .iter()
        .map(|a| AgentSummary { name: a.name.clone(), description: a.description.clone(), model: a.model.clone() })
        .collect();
    Json(AgentListResponse { agents })
}

async fn reload_agents(State(state): State<AppState>) -> StatusCode {
    state.reload_agents().await;
    StatusCode::NO_CONTENT
}

async fn get_agent_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionResponse>, ApiError> {
    Ok(Json(to_session_response(state.agent_chats.read(&id)?)))
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn to_session_response(session: mochi_core::Session) -> SessionResponse {
    SessionResponse { metadata: session.metadata, messages: session.messages }
}

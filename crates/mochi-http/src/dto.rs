// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Request and response bodies for the `/api/v1` surface. Kept separate
//! from [`mochi_core::session`]'s persisted shapes so the wire contract
//! can evolve independently of the on-disk format.

use mochi_core::{Message, SessionListEntry, SessionMetadata};
use mochi_tools::ExecutionPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tool_settings: Option<ToolSettingsPatch>,
    #[serde(default)]
    pub enabled_agents: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolSettingsPatch {
    pub enabled_tools: Option<Vec<String>>,
    pub group: Option<String>,
    pub execution_policy: Option<ExecutionPolicy>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchSessionRequest {
    pub model: Option<String>,
    pub tool_settings: Option<ToolSettingsPatch>,
    pub enabled_agents: Option<Vec<String>>,
    pub manual_context_window: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub metadata: SessionMetadata,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NamedPromptRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SystemPromptRequest {
    pub content: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "api".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub think: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub message: String,
    pub tool_calls_executed: usize,
    pub context_window: u32,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmToolRequest {
    pub confirmation_id: String,
    pub approved: bool,
}

#[derive(Debug, Serialize)]
pub struct ConfirmToolResponse {
    pub outcome: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub upstream_reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<mochi_model::ModelDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub model: String,
    pub message_count: usize,
    pub context_window: u32,
    pub last_adjustment_reason: Value,
    pub summary_available: bool,
}

#[derive(Debug, Serialize)]
pub struct ToolSchemaDto {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<mochi_tools::ToolSchema> for ToolSchemaDto {
    fn from(s: mochi_tools::ToolSchema) -> Self {
        Self { name: s.name, description: s.description, parameters: s.parameters }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolSchemaDto>,
}

#[derive(Debug, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentListResponse {
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Serialize)]
pub struct SystemPromptListResponse {
    pub prompts: Vec<String>,
}

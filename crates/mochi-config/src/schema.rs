// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// Used for config fields that should be enabled unless the user explicitly
/// sets them to `false`.  `#[serde(default)]` on a `bool` always falls back
/// to `bool::default()` (i.e. `false`), so a named function is required.
fn default_true() -> bool {
    true
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    11535
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_data_root() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("mochi")
}

fn default_sessions_dir() -> String {
    "sessions".to_string()
}

fn default_tools_dir() -> String {
    "tools".to_string()
}

fn default_agents_dir() -> String {
    "agents".to_string()
}

fn default_agent_chats_dir() -> String {
    "agent_sessions".to_string()
}

fn default_system_prompts_dir() -> String {
    "system_prompts".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_confirmation_timeout_secs() -> u64 {
    120
}

fn default_max_tool_rounds() -> u32 {
    10
}

fn default_max_agent_iterations() -> u32 {
    10
}

/// Process-wide settings, resolved from CLI flags, `MOCHI_*` environment
/// variables, and (lowest priority) an optional YAML config file.
///
/// Field resolution order is CLI > env > config file > built-in default,
/// matching `clap`'s own `env` feature precedence.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "mochi", about = "Headless backend mediating chat clients and a local Ollama-compatible daemon")]
pub struct Settings {
    /// Optional YAML file merged in beneath environment/CLI values.
    #[arg(long, env = "MOCHI_CONFIG", global = true)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "MOCHI_BIND_HOST", default_value_t = default_bind_host())]
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    #[arg(long, env = "MOCHI_BIND_PORT", default_value_t = default_bind_port())]
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    #[arg(long, env = "MOCHI_UPSTREAM_URL", default_value_t = default_upstream_url())]
    #[serde(default = "default_upstream_url")]
    pub upstream_base_url: String,

    #[arg(long, env = "MOCHI_DATA_ROOT", default_value_os_t = default_data_root())]
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    #[arg(long, env = "MOCHI_SESSIONS_DIR", default_value_t = default_sessions_dir())]
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,

    #[arg(long, env = "MOCHI_TOOLS_DIR", default_value_t = default_tools_dir())]
    #[serde(default = "default_tools_dir")]
    pub tools_dir: String,

    #[arg(long, env = "MOCHI_AGENTS_DIR", default_value_t = default_agents_dir())]
    #[serde(default = "default_agents_dir")]
    pub agents_dir: String,

    #[arg(long, env = "MOCHI_AGENT_CHATS_DIR", default_value_t = default_agent_chats_dir())]
    #[serde(default = "default_agent_chats_dir")]
    pub agent_chats_dir: String,

    #[arg(long, env = "MOCHI_SYSTEM_PROMPTS_DIR", default_value_t = default_system_prompts_dir())]
    #[serde(default = "default_system_prompts_dir")]
    pub system_prompts_dir: String,

    #[arg(long, env = "MOCHI_PLANNING_PROMPT_PATH")]
    #[serde(default)]
    pub planning_prompt_path: Option<PathBuf>,

    #[arg(long, env = "MOCHI_EXECUTION_PROMPT_PATH")]
    #[serde(default)]
    pub execution_prompt_path: Option<PathBuf>,

    #[arg(long, env = "MOCHI_SUMMARIZATION_ENABLED", default_value_t = true)]
    #[serde(default = "default_true")]
    pub summarization_enabled: bool,

    #[arg(long, env = "MOCHI_DYNAMIC_CONTEXT_ENABLED", default_value_t = true)]
    #[serde(default = "default_true")]
    pub dynamic_context_enabled: bool,

    #[arg(long, env = "MOCHI_LOG_LEVEL", default_value_t = default_log_level())]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[arg(long, env = "MOCHI_CONFIRMATION_TIMEOUT_SECS", default_value_t = default_confirmation_timeout_secs())]
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    #[arg(long, env = "MOCHI_MAX_TOOL_ROUNDS", default_value_t = default_max_tool_rounds())]
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    #[arg(long, env = "MOCHI_MAX_AGENT_ITERATIONS", default_value_t = default_max_agent_iterations())]
    #[serde(default = "default_max_agent_iterations")]
    pub max_agent_iterations: u32,

    /// When false, a turn request against an already-locked session is
    /// rejected with 409 instead of waiting for the lock.
    #[arg(long, env = "MOCHI_SESSION_LOCK_WAIT", default_value_t = true)]
    #[serde(default = "default_true")]
    pub session_lock_wait: bool,
}

impl Settings {
    pub fn sessions_path(&self) -> PathBuf {
        self.data_root.join(&self.sessions_dir)
    }

    pub fn agent_chats_path(&self) -> PathBuf {
        self.data_root.join(&self.agent_chats_dir)
    }

    pub fn tools_path(&self) -> PathBuf {
        self.data_root.join(&self.tools_dir)
    }

    pub fn agents_path(&self) -> PathBuf {
        self.data_root.join(&self.agents_dir)
    }

    pub fn system_prompts_path(&self) -> PathBuf {
        self.data_root.join(&self.system_prompts_dir)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config: None,
            bind_host: default_bind_host(),
            bind_port: default_bind_port(),
            upstream_base_url: default_upstream_url(),
            data_root: default_data_root(),
            sessions_dir: default_sessions_dir(),
            tools_dir: default_tools_dir(),
            agents_dir: default_agents_dir(),
            agent_chats_dir: default_agent_chats_dir(),
            system_prompts_dir: default_system_prompts_dir(),
            planning_prompt_path: None,
            execution_prompt_path: None,
            summarization_enabled: true,
            dynamic_context_enabled: true,
            log_level: default_log_level(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            max_tool_rounds: default_max_tool_rounds(),
            max_agent_iterations: default_max_agent_iterations(),
            session_lock_wait: true,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

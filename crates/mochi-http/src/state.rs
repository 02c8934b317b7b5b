// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Dependency container threaded into every handler via
//! [`axum::extract::State`]. Nothing in this crate reaches for global or
//! `static` state; every component a handler needs is reached through
//! this struct.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mochi_agents::{discover_agents, AgentDescriptor};
use mochi_config::Settings;
use mochi_core::{ConfirmationBroker, Orchestrator, SessionStore};
use mochi_model::UpstreamClient;
use mochi_tools::build_registry_from_dir;
use tokio::sync::{Mutex, RwLock};

use crate::error::ApiError;

/// An acquired per-session lock. Must be held for the entire lifetime of
/// the turn it guards, not just the handler call that acquired it — a
/// streaming turn runs on past the point its handler returns.
pub type SessionLockGuard = tokio::sync::OwnedMutexGuard<()>;

/// Per-session mutual exclusion: only one turn may run against a given
/// session at a time. `MOCHI_SESSION_LOCK_WAIT=false` turns contention
/// into an immediate 409 instead of a wait.
#[derive(Clone, Default)]
pub struct SessionLocks {
    table: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().await;
        table.entry(session_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquires the session's lock. If `wait` is false and the lock is
    /// already held, returns a 409 instead of blocking.
    pub async fn acquire(&self, session_id: &str, wait: bool) -> Result<SessionLockGuard, ApiError> {
        let lock = self.lock_for(session_id).await;
        if wait {
            Ok(lock.lock_owned().await)
        } else {
            lock.try_lock_owned().map_err(|_| {
                ApiError::new(axum::http::StatusCode::CONFLICT, "SESSION_BUSY", "a turn is already running for this session")
            })
        }
    }
}

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub sessions: SessionStore,
    pub agent_chats: SessionStore,
    pub tools: Arc<RwLock<Arc<mochi_tools::ToolRegistry>>>,
    pub agents: Arc<RwLock<Arc<Vec<AgentDescriptor>>>>,
    pub confirmations: ConfirmationBroker,
    pub session_locks: SessionLocks,
}

impl AppState {
    pub fn new(settings: Settings, upstream: Arc<dyn UpstreamClient>) -> Self {
        let settings = Arc::new(settings);
        let tools = build_registry_from_dir(&settings.tools_path());
        let agents = discover_agents(&settings.agents_path());
        Self {
            sessions: SessionStore::new(settings.sessions_path()),
            agent_chats: SessionStore::new(settings.agent_chats_path()),
            tools: Arc::new(RwLock::new(Arc::new(tools))),
            agents: Arc::new(RwLock::new(Arc::new(agents))),
            confirmations: ConfirmationBroker::new(),
            session_locks: SessionLocks::default(),
            upstream,
            settings,
        }
    }

    /// Rebuilds the tool registry from `tools_dir`, replacing the one any
    /// in-flight turn is using. Existing turns keep the snapshot they
    /// already captured.
    pub async fn reload_tools(&self) {
        let fresh = build_registry_from_dir(&self.settings.tools_path());
        *self.tools.write().await = Arc::new(fresh);
    }

    /// Rebuilds the agent registry from `agents_dir`.
    pub async fn reload_agents(&self) {
        let fresh = discover_agents(&self.settings.agents_path());
        *self.agents.write().await = Arc::new(fresh);
    }

    /// Snapshots the current tools/agents into a fresh orchestrator for
    /// one request. Cheap: every field is an `Arc` clone or a
    /// `PathBuf`-backed store.
    pub async fn orchestrator(&self) -> Orchestrator {
        Orchestrator {
            sessions: self.sessions.clone(),
            agent_chats: self.agent_chats.clone(),
            tools: self.tools.read().await.clone(),
            agents: self.agents.read().await.clone(),
            upstream: self.upstream.clone(),
            confirmations: self.confirmations.clone(),
            confirmation_timeout: Duration::from_secs(self.settings.confirmation_timeout_secs),
            max_tool_rounds: self.settings.max_tool_rounds,
            max_agent_iterations: self.settings.max_agent_iterations,
        }
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Confirmation broker: a process-wide table of pending tool-execution
//! confirmations, keyed by a short id handed to the client over SSE.
//! Registration arms a timeout that auto-denies the call if nobody
//! resolves it first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use crate::session::generate_id;

/// The outcome of a resolved (or timed-out) confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmationDecision {
    pub approved: bool,
    pub reason: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    NotFound,
    AlreadyResolved,
}

struct Waiter {
    session_id: String,
    tool_name: String,
    arguments: Value,
    sender: Option<oneshot::Sender<ConfirmationDecision>>,
    receiver: Option<oneshot::Receiver<ConfirmationDecision>>,
}

/// Shared table of pending confirmations. Cheap to clone — wraps its
/// state in an `Arc` internally.
#[derive(Clone)]
pub struct ConfirmationBroker {
    waiters: Arc<Mutex<HashMap<String, Waiter>>>,
}

impl ConfirmationBroker {
    pub fn new() -> Self {
        Self { waiters: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Registers a pending confirmation and arms its timeout. Returns the
    /// id to hand to the client.
    pub async fn register(
        &self,
        session_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
        timeout: Duration,
    ) -> String {
        let id = generate_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.waiters.lock().await;
            waiters.insert(
                id.clone(),
                Waiter { session_id: session_id.into(), tool_name: tool_name.into(), arguments, sender: Some(tx), receiver: Some(rx) },
            );
        }

        let broker = self.clone();
        let timeout_id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            broker.complete(&timeout_id, ConfirmationDecision { approved: false, reason: Some("timeout".into()) }).await;
        });

        id
    }

    /// Resolves `id` with an explicit approve/deny decision. A second
    /// call against an already-resolved id is a no-op reporting
    /// `AlreadyResolved`.
    pub async fn resolve(&self, id: &str, approved: bool) -> ResolveOutcome {
        self.complete(id, ConfirmationDecision { approved, reason: None }).await
    }

    async fn complete(&self, id: &str, decision: ConfirmationDecision) -> ResolveOutcome {
        let mut waiters = self.waiters.lock().await;
        let Some(waiter) = waiters.get_mut(id) else { return ResolveOutcome::NotFound };
        match waiter.sender.take() {
            Some(sender) => {
                let _ = sender.send(decision);
                ResolveOutcome::Resolved
            }
            None => ResolveOutcome::AlreadyResolved,
        }
    }

    /// Blocks until `id` is resolved (explicitly or by timeout). Returns
    /// `None` if `id` was never registered or has already been awaited.
    pub async fn wait(&self, id: &str) -> Option<ConfirmationDecision> {
        let receiver = {
            let mut waiters = self.waiters.lock().await;
            let waiter = waiters.get_mut(id)?;
            waiter.receiver.take()?
        };
        let decision = receiver.await.unwrap_or(ConfirmationDecision { approved: false, reason: Some("broker dropped".into()) });
        self.waiters.lock().await.remove(id);
        Some(decision)
    }

    /// Details of a still-pending confirmation, for surfacing to clients.
    pub async fn pending(&self, id: &str) -> Option<(String, String, Value)> {
        let waiters = self.waiters.lock().await;
        waiters.get(id).map(|w| (w.session_id.clone(), w.tool_name.clone(), w.arguments.clone()))
    }
}

impl Default for ConfirmationBroker {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

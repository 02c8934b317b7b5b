// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// Session-level confirmation policy for tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Every tool call is routed through the confirmation broker.
    AlwaysConfirm,
    /// No tool call is ever routed through the confirmation broker.
    NeverConfirm,
    /// Only calls to tools flagged destructive are routed through the
    /// confirmation broker.
    ConfirmDestructive,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        ExecutionPolicy::ConfirmDestructive
    }
}

/// Whether a call to a tool with the given destructiveness flag must go
/// through the confirmation broker under `policy`.
pub fn requires_confirmation(policy: ExecutionPolicy, tool_is_destructive: bool) -> bool {
    match policy {
        ExecutionPolicy::AlwaysConfirm => true,
        ExecutionPolicy::NeverConfirm => false,
        ExecutionPolicy::ConfirmDestructive => tool_is_destructive,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Persisted session store: one JSON file per session under the
//! configured sessions directory, written atomically via a temp file plus
//! rename. Sessions are only ever created, read, mutated or destroyed
//! through the operations on [`SessionStore`] — nothing else touches the
//! files on disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mochi_tools::ExecutionPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use mochi_model::{ChatMessage, ChatRole, ToolCallDescriptor as WireToolCall};

pub const CURRENT_FORMAT_VERSION: &str = "1.3";
const MAX_ADJUSTMENT_HISTORY: usize = 10;
const PREVIEW_MAX_CHARS: usize = 100;

/// Ten hex characters derived from a cryptographically-random source.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("message index {0} is out of range or does not refer to a user message")]
    InvalidMessageIndex(usize),
    #[error("session file is corrupt: {0}")]
    Corrupt(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A single tool call as recorded against an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDescriptor {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One message in a session's history. Unlike the wire-level
/// [`mochi_model::ChatMessage`], every variant carries its own id and
/// timestamp so edits and truncation can be addressed precisely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User { id: String, timestamp: DateTime<Utc>, content: String },
    System { id: String, timestamp: DateTime<Utc>, content: String, source: String },
    Assistant {
        id: String,
        timestamp: DateTime<Utc>,
        content: String,
        #[serde(default)]
        model: String,
        #[serde(default)]
        eval_count: u32,
        #[serde(default)]
        prompt_eval_count: u32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallDescriptor>,
    },
    Tool { id: String, timestamp: DateTime<Utc>, tool_name: String, content: String, is_error: bool },
}

impl Message {
    pub fn id(&self) -> &str {
        match self {
            Message::User { id, .. }
            | Message::System { id, .. }
            | Message::Assistant { id, .. }
            | Message::Tool { id, .. } => id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Message::User { timestamp, .. }
            | Message::System { timestamp, .. }
            | Message::Assistant { timestamp, .. }
            | Message::Tool { timestamp, .. } => *timestamp,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Message::User { content, .. }
            | Message::System { content, .. }
            | Message::Assistant { content, .. } => content,
            Message::Tool { content, .. } => content,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User { id: generate_id(), timestamp: Utc::now(), content: content.into() }
    }

    pub fn system(content: impl Into<String>, source: impl Into<String>) -> Self {
        Message::System { id: generate_id(), timestamp: Utc::now(), content: content.into(), source: source.into() }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallDescriptor>) -> Self {
        Message::Assistant {
            id: generate_id(),
            timestamp: Utc::now(),
            content: content.into(),
            model: String::new(),
            eval_count: 0,
            prompt_eval_count: 0,
            tool_calls,
        }
    }

    /// Same as [`Message::assistant`] but also records the model and token
    /// counts a turn consumed, so a later turn's context-window planner can
    /// read them back via [`Message::usage`].
    pub fn assistant_with_usage(
        content: impl Into<String>,
        model: impl Into<String>,
        eval_count: u32,
        prompt_eval_count: u32,
        tool_calls: Vec<ToolCallDescriptor>,
    ) -> Self {
        Message::Assistant {
            id: generate_id(),
            timestamp: Utc::now(),
            content: content.into(),
            model: model.into(),
            eval_count,
            prompt_eval_count,
            tool_calls,
        }
    }

    /// The token usage recorded against an assistant message, if any was
    /// recorded when it was persisted.
    pub fn usage(&self) -> Option<(u32, u32)> {
        match self {
            Message::Assistant { eval_count, prompt_eval_count, .. } if *eval_count > 0 || *prompt_eval_count > 0 => {
                Some((*eval_count, *prompt_eval_count))
            }
            _ => None,
        }
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Message::Tool { id: generate_id(), timestamp: Utc::now(), tool_name: tool_name.into(), content: content.into(), is_error }
    }

    /// Converts to the wire shape sent to the upstream daemon.
    pub fn to_wire(&self) -> ChatMessage {
        match self {
            Message::User { content, .. } => ChatMessage::user(content.clone()),
            Message::System { content, .. } => ChatMessage::system(content.clone()),
            Message::Assistant { content, tool_calls, .. } => {
                let calls = if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls.iter().map(|c| WireToolCall { name: c.name.clone(), arguments: c.arguments.clone() }).collect())
                };
                ChatMessage::assistant(content.clone(), calls)
            }
            Message::Tool { tool_name, content, .. } => ChatMessage::tool(content.clone(), tool_name.clone()),
        }
    }
}

impl From<&Message> for ChatRole {
    fn from(m: &Message) -> Self {
        match m {
            Message::User { .. } => ChatRole::User,
            Message::System { .. } => ChatRole::System,
            Message::Assistant { .. } => ChatRole::Assistant,
            Message::Tool { .. } => ChatRole::Tool,
        }
    }
}

/// Why the context-window planner last changed `current_window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    InitialSetup,
    UsageThreshold,
    ModelChange,
    NoAdjustment,
    ManualOverride,
}

/// One entry in a session's bounded adjustment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    pub timestamp: DateTime<Utc>,
    pub previous_window: u32,
    pub new_window: u32,
    pub reason: AdjustmentReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindowConfig {
    #[serde(default = "default_true")]
    pub dynamic_enabled: bool,
    pub current_window: u32,
    pub last_adjustment_reason: AdjustmentReason,
    #[serde(default)]
    pub adjustment_history: Vec<AdjustmentEntry>,
    #[serde(default)]
    pub manual_override: bool,
    /// The model in use the last time a window was computed, to detect
    /// the `model_change` adjustment reason. Not itself part of the
    /// invariant set the planner reports on.
    #[serde(default)]
    pub last_model: Option<String>,
}

impl Default for ContextWindowConfig {
    fn default() -> Self {
        Self {
            dynamic_enabled: true,
            current_window: 8192,
            last_adjustment_reason: AdjustmentReason::InitialSetup,
            adjustment_history: Vec::new(),
            manual_override: false,
            last_model: None,
        }
    }
}

impl ContextWindowConfig {
    /// Records a window change, evicting the oldest entry past the cap.
    /// `no_adjustment` decisions are not recorded — callers should only
    /// call this for an actual change of reason or window size.
    pub fn record_adjustment(&mut self, new_window: u32, reason: AdjustmentReason) {
        let previous_window = self.current_window;
        self.current_window = new_window;
        self.last_adjustment_reason = reason;
        if reason == AdjustmentReason::NoAdjustment {
            return;
        }
        self.adjustment_history.push(AdjustmentEntry { timestamp: Utc::now(), previous_window, new_window, reason });
        if self.adjustment_history.len() > MAX_ADJUSTMENT_HISTORY {
            let overflow = self.adjustment_history.len() - MAX_ADJUSTMENT_HISTORY;
            self.adjustment_history.drain(0..overflow);
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default)]
    pub enabled_tools: Vec<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub execution_policy: ExecutionPolicy,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self { enabled_tools: Vec::new(), group: None, execution_policy: ExecutionPolicy::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentSettings {
    #[serde(default)]
    pub enabled_agents: Vec<String>,
    #[serde(default)]
    pub selection_metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub summary: String,
    pub topics: Vec<String>,
}

/// A session's metadata, everything except the message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default)]
    pub summary: Option<SessionSummary>,
    #[serde(default)]
    pub summary_model: Option<String>,
    pub format_version: String,
    #[serde(default)]
    pub tool_settings: ToolSettings,
    #[serde(default)]
    pub agent_settings: AgentSettings,
    #[serde(default)]
    pub context_window_config: ContextWindowConfig,
}

/// A full session: metadata plus its message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub metadata: SessionMetadata,
    pub messages: Vec<Message>,
}

/// Summary row for `list`: metadata plus a truncated preview of the first
/// user message.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListEntry {
    pub metadata: SessionMetadata,
    pub preview: Option<String>,
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{truncated}...")
    }
}

/// On-disk migration ladder. Every step bumps `format_version` and fills
/// in the field that step introduced; a file that fails to parse even
/// after migration is reported as corrupt, never silently rewritten with
/// defaults for fields it did have.
fn migrate(mut value: Value) -> Result<Value, SessionError> {
    loop {
        let version = value
            .get("metadata")
            .and_then(|m| m.get("format_version"))
            .and_then(|v| v.as_str())
            .unwrap_or("1.0")
            .to_string();
        let metadata = value
            .get_mut("metadata")
            .ok_or_else(|| SessionError::Corrupt("missing metadata object".into()))?;
        match version.as_str() {
            "1.0" => {
                metadata["tool_settings"] = serde_json::to_value(ToolSettings::default())?;
                metadata["format_version"] = Value::String("1.1".into());
            }
            "1.1" => {
                metadata["context_window_config"] = serde_json::to_value(ContextWindowConfig::default())?;
                metadata["format_version"] = Value::String("1.2".into());
            }
            "1.2" => {
                metadata["agent_settings"] = serde_json::to_value(AgentSettings::default())?;
                metadata["format_version"] = Value::String("1.3".into());
            }
            "1.3" => return Ok(value),
            other => return Err(SessionError::Corrupt(format!("unknown format_version {other}"))),
        }
    }
}

/// Filesystem-backed store for sessions under a single root directory
/// (the main chat session space and the agent session space are two
/// stores over two different roots, per the same schema).
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{session_id}.json"))
    }

    fn write_atomic(&self, session: &Session) -> Result<(), SessionError> {
        std::fs::create_dir_all(&self.root)?;
        let final_path = self.path_for(&session.metadata.session_id);
        let tmp_path = self.root.join(format!("{}.json.tmp", session.metadata.session_id));
        let bytes = serde_json::to_vec_pretty(session)?;
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    pub fn create(&self, model: impl Into<String>) -> Result<Session, SessionError> {
        let now = Utc::now();
        let session = Session {
            metadata: SessionMetadata {
                session_id: generate_id(),
                model: model.into(),
                created_at: now,
                updated_at: now,
                message_count: 0,
                summary: None,
                summary_model: None,
                format_version: CURRENT_FORMAT_VERSION.to_string(),
                tool_settings: ToolSettings::default(),
                agent_settings: AgentSettings::default(),
                context_window_config: ContextWindowConfig::default(),
            },
            messages: Vec::new(),
        };
        self.write_atomic(&session)?;
        Ok(session)
    }

    pub fn read(&self, session_id: &str) -> Result<Session, SessionError> {
        let path = self.path_for(session_id);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SessionError::NotFound(session_id.to_string())
            } else {
                SessionError::Io(e)
            }
        })?;
        let raw: Value = serde_json::from_slice(&bytes)?;
        let migrated = migrate(raw)?;
        serde_json::from_value(migrated).map_err(|e| SessionError::Corrupt(e.to_string()))
    }

    /// Reads a session (applying any pending format migration) and writes
    /// it straight back, without touching `updated_at`. Used by offline
    /// maintenance to force every on-disk document onto the current
    /// format ahead of an upgrade.
    pub fn resave(&self, session_id: &str) -> Result<Session, SessionError> {
        let session = self.read(session_id)?;
        self.write_atomic(&session)?;
        Ok(session)
    }

    pub fn list(&self) -> Result<Vec<SessionListEntry>, SessionError> {
        std::fs::create_dir_all(&self.root)?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let session = match self.read(stem) {
                Ok(s) => s,
                Err(_) => continue,
            };
            let preview = session.messages.iter().find(|m| m.is_user()).map(|m| truncate_preview(m.text()));
            entries.push(SessionListEntry { metadata: session.metadata, preview });
        }
        entries.sort_by(|a, b| b.metadata.updated_at.cmp(&a.metadata.updated_at));
        Ok(entries)
    }

    pub fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let path = self.path_for(session_id);
        std::fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SessionError::NotFound(session_id.to_string())
            } else {
                SessionError::Io(e)
            }
        })
    }

    pub fn patch_metadata(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionMetadata),
    ) -> Result<Session, SessionError> {
        let mut session = self.read(session_id)?;
        f(&mut session.metadata);
        session.metadata.updated_at = Utc::now();
        self.write_atomic(&session)?;
        Ok(session)
    }

    pub fn append_message(&self, session_id: &str, message: Message) -> Result<Session, SessionError> {
        let mut session = self.read(session_id)?;
        session.messages.push(message);
        session.metadata.message_count = session.messages.len();
        session.metadata.updated_at = Utc::now();
        self.write_atomic(&session)?;
        Ok(session)
    }

    /// Replaces the content of the user message at `index`, advances its
    /// timestamp, and discards every message after it. Fails unless
    /// `index` refers to an existing user message.
    pub fn edit_message(&self, session_id: &str, index: usize, content: String) -> Result<Session, SessionError> {
        let mut session = self.read(session_id)?;
        let is_valid = session.messages.get(index).map(|m| m.is_user()).unwrap_or(false);
        if !is_valid {
            return Err(SessionError::InvalidMessageIndex(index));
        }
        if let Some(Message::User { content: c, timestamp, .. }) = session.messages.get_mut(index) {
            *c = content;
            *timestamp = Utc::now();
        }
        session.messages.truncate(index + 1);
        session.metadata.message_count = session.messages.len();
        session.metadata.updated_at = Utc::now();
        self.write_atomic(&session)?;
        Ok(session)
    }

    /// Replaces the system message at position 0 if one exists, else
    /// inserts a new one there, leaving the rest of the history intact.
    pub fn set_system_message(&self, session_id: &str, content: String, source: String) -> Result<Session, SessionError> {
        let mut session = self.read(session_id)?;
        let new_msg = Message::system(content, source);
        match session.messages.first() {
            Some(Message::System { .. }) => session.messages[0] = new_msg,
            _ => session.messages.insert(0, new_msg),
        }
        session.metadata.message_count = session.messages.len();
        session.metadata.updated_at = Utc::now();
        self.write_atomic(&session)?;
        Ok(session)
    }

    pub fn remove_system_message(&self, session_id: &str) -> Result<Session, SessionError> {
        let mut session = self.read(session_id)?;
        if matches!(session.messages.first(), Some(Message::System { .. })) {
            session.messages.remove(0);
        }
        session.metadata.message_count = session.messages.len();
        session.metadata.updated_at = Utc::now();
        self.write_atomic(&session)?;
        Ok(session)
    }

    pub fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, SessionError> {
        Ok(self.read(session_id)?.messages)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SessionStore) {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn create_then_read_round_trips() {
        let (_tmp, store) = store();
        let created = store.create("llama3").unwrap();
        let read = store.read(&created.metadata.session_id).unwrap();
        assert_eq!(read.metadata.session_id, created.metadata.session_id);
        assert_eq!(read.metadata.format_version, CURRENT_FORMAT_VERSION);
        assert_eq!(read.messages.len(), 0);
    }

    #[test]
    fn read_unknown_session_is_not_found() {
        let (_tmp, store) = store();
        let err = store.read("deadbeef00").unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[test]
    fn append_message_updates_count_and_timestamp() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let before = session.metadata.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let after = store.append_message(&session.metadata.session_id, Message::user("hi")).unwrap();
        assert_eq!(after.metadata.message_count, 1);
        assert!(after.metadata.updated_at >= before);
    }

    #[test]
    fn edit_message_on_user_message_truncates_tail() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let id = session.metadata.session_id.clone();
        store.append_message(&id, Message::user("first")).unwrap();
        store.append_message(&id, Message::assistant("reply", vec![])).unwrap();
        store.append_message(&id, Message::user("second")).unwrap();
        let edited = store.edit_message(&id, 0, "edited first".into()).unwrap();
        assert_eq!(edited.messages.len(), 1);
        assert_eq!(edited.messages[0].text(), "edited first");
    }

    #[test]
    fn edit_message_on_non_user_message_is_invalid() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let id = session.metadata.session_id.clone();
        store.append_message(&id, Message::assistant("reply", vec![])).unwrap();
        let err = store.edit_message(&id, 0, "x".into()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidMessageIndex(0)));
    }

    #[test]
    fn edit_message_out_of_range_is_invalid() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let err = store.edit_message(&session.metadata.session_id, 5, "x".into()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidMessageIndex(5)));
    }

    #[test]
    fn set_system_message_inserts_when_absent() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let id = session.metadata.session_id.clone();
        store.append_message(&id, Message::user("hi")).unwrap();
        let updated = store.set_system_message(&id, "be nice".into(), "api".into()).unwrap();
        assert!(matches!(updated.messages[0], Message::System { .. }));
        assert_eq!(updated.messages.len(), 2);
    }

    #[test]
    fn set_system_message_replaces_existing_at_position_zero() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let id = session.metadata.session_id.clone();
        store.set_system_message(&id, "first".into(), "api".into()).unwrap();
        store.append_message(&id, Message::user("hi")).unwrap();
        let updated = store.set_system_message(&id, "second".into(), "api".into()).unwrap();
        assert_eq!(updated.messages.len(), 2);
        assert_eq!(updated.messages[0].text(), "second");
    }

    #[test]
    fn remove_system_message_is_noop_without_one() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let id = session.metadata.session_id.clone();
        store.append_message(&id, Message::user("hi")).unwrap();
        let updated = store.remove_system_message(&id).unwrap();
        assert_eq!(updated.messages.len(), 1);
    }

    #[test]
    fn list_sorts_by_updated_at_descending_and_includes_preview() {
        let (_tmp, store) = store();
        let a = store.create("llama3").unwrap();
        store.append_message(&a.metadata.session_id, Message::user("alpha message that is first")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = store.create("llama3").unwrap();
        store.append_message(&b.metadata.session_id, Message::user("beta")).unwrap();
        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].metadata.session_id, b.metadata.session_id);
        assert_eq!(list[1].preview.as_deref(), Some("alpha message that is first"));
    }

    #[test]
    fn preview_truncates_long_user_messages() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        let long = "x".repeat(150);
        store.append_message(&session.metadata.session_id, Message::user(long)).unwrap();
        let list = store.list().unwrap();
        let preview = list[0].preview.as_ref().unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS + 3);
    }

    #[test]
    fn delete_removes_session_file() {
        let (_tmp, store) = store();
        let session = store.create("llama3").unwrap();
        store.delete(&session.metadata.session_id).unwrap();
        assert!(matches!(store.read(&session.metadata.session_id), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn context_window_adjustment_history_caps_at_ten() {
        let mut cfg = ContextWindowConfig::default();
        for i in 0..15 {
            cfg.record_adjustment(1000 + i, AdjustmentReason::UsageThreshold);
        }
        assert_eq!(cfg.adjustment_history.len(), MAX_ADJUSTMENT_HISTORY);
        assert_eq!(cfg.adjustment_history.last().unwrap().new_window, 1014);
    }

    #[test]
    fn no_adjustment_does_not_append_to_history() {
        let mut cfg = ContextWindowConfig::default();
        cfg.record_adjustment(8192, AdjustmentReason::NoAdjustment);
        assert!(cfg.adjustment_history.is_empty());
    }

    #[test]
    fn migrate_1_0_fills_defaults_through_to_current() {
        let raw = serde_json::json!({
            "metadata": {
                "session_id": "abc0000000",
                "model": "llama3",
                "created_at": Utc::now(),
                "updated_at": Utc::now(),
                "message_count": 0,
                "format_version": "1.0"
            },
            "messages": []
        });
        let migrated = migrate(raw).unwrap();
        assert_eq!(migrated["metadata"]["format_version"], "1.3");
        assert!(migrated["metadata"]["tool_settings"].is_object());
        assert!(migrated["metadata"]["context_window_config"].is_object());
        assert!(migrated["metadata"]["agent_settings"].is_object());
    }

    #[test]
    fn migrate_unknown_version_is_corrupt() {
        let raw = serde_json::json!({ "metadata": { "format_version": "9.9" } });
        assert!(matches!(migrate(raw), Err(SessionError::Corrupt(_))));
    }

    #[test]
    fn message_to_wire_preserves_tool_calls() {
        let msg = Message::assistant("doing work", vec![ToolCallDescriptor { name: "now".into(), arguments: Value::Null }]);
        let wire = msg.to_wire();
        assert_eq!(wire.role, ChatRole::Assistant);
        assert_eq!(wire.tool_calls.unwrap().len(), 1);
    }

    #[test]
    fn generated_ids_are_ten_hex_chars() {
        let id = generate_id();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

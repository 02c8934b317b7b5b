// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;

use crate::provider::{UpstreamClient, UpstreamError};
use crate::types::{ChatChunk, CompletionRequest, ModelDescriptor};

/// Upstream double that plays back a fixed script of chunk sequences, one
/// sequence per `chat_stream` call, in order. Records every request it
/// received so tests can assert on what the orchestrator actually sent.
pub struct ScriptedUpstream {
    script: Mutex<Vec<Vec<ChatChunk>>>,
    structured_script: Mutex<Vec<Value>>,
    models: Vec<ModelDescriptor>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedUpstream {
    pub fn new(script: Vec<Vec<ChatChunk>>) -> Self {
        Self {
            script: Mutex::new(script),
            structured_script: Mutex::new(Vec::new()),
            models: Vec::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience constructor: a single call returning a run of content
    /// chunks followed by a terminal chunk with the given token counts.
    pub fn single_text_reply(chunks: &[&str], eval_count: u32, prompt_eval_count: u32) -> Self {
        let mut seq: Vec<ChatChunk> = chunks
            .iter()
            .map(|c| ChatChunk { content: c.to_string(), ..Default::default() })
            .collect();
        seq.push(ChatChunk {
            done: true,
            eval_count: Some(eval_count),
            prompt_eval_count: Some(prompt_eval_count),
            ..Default::default()
        });
        Self::new(vec![seq])
    }

    pub fn with_models(mut self, models: Vec<ModelDescriptor>) -> Self {
        self.models = models;
        self
    }

    pub fn with_structured_reply(self, value: Value) -> Self {
        self.structured_script.lock().unwrap().push(value);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, UpstreamError> {
        Ok(self.models.clone())
    }

    async fn get_model(&self, name: &str) -> Result<ModelDescriptor, UpstreamError> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| UpstreamError::ModelNotFound(name.to_string()))
    }

    async fn chat_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<BoxStream<'static, Result<ChatChunk, UpstreamError>>, UpstreamError> {
        self.requests.lock().unwrap().push(request);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(UpstreamError::Protocol("scripted upstream exhausted".into()));
        }
        let seq = script.remove(0);
        Ok(stream::iter(seq.into_iter().map(Ok)).boxed())
    }

    async fn structured_chat(
        &self,
        request: CompletionRequest,
        _schema: Value,
    ) -> Result<Value, UpstreamError> {
        self.requests.lock().unwrap().push(request);
        let mut script = self.structured_script.lock().unwrap();
        if script.is_empty() {
            return Err(UpstreamError::StructuredOutputInvalid("no scripted reply".into()));
        }
        Ok(script.remove(0))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::types::{ChatChunk, CompletionRequest, ModelDescriptor};

/// Failure modes surfaced by an [`UpstreamClient`]. The client never
/// retries internally — callers decide whether and how to retry.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Transport(String),
    #[error("upstream returned a malformed or unexpected response: {0}")]
    Protocol(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("structured output failed validation: {0}")]
    StructuredOutputInvalid(String),
}

/// Adapter over an Ollama-compatible inference daemon's HTTP API.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Models whose capability set includes `completion`.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, UpstreamError>;

    async fn get_model(&self, name: &str) -> Result<ModelDescriptor, UpstreamError>;

    /// A lazy, finite, non-restartable sequence of chat chunks.
    async fn chat_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<BoxStream<'static, Result<ChatChunk, UpstreamError>>, UpstreamError>;

    /// A single response whose content parses into the shape described by
    /// `schema` (a JSON Schema object), or an error.
    async fn structured_chat(
        &self,
        request: CompletionRequest,
        schema: Value,
    ) -> Result<Value, UpstreamError>;
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod catalog;
pub mod mock;
pub mod ollama;
mod provider;
mod types;

pub use mock::ScriptedUpstream;
pub use ollama::OllamaClient;
pub use provider::{UpstreamClient, UpstreamError};
pub use types::*;

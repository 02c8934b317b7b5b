// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Model catalog helpers: capability filtering and context-length lookup.

use serde_json::Value;

/// Conservative fallback used when a model's `/api/show` response carries
/// no recognizable context-length key at all.
pub const DEFAULT_CONTEXT_LENGTH: u32 = 4096;

/// Resolve a model's maximum context length from the `model_info` map
/// returned by `/api/show`.
///
/// Ollama keys context length per architecture family, e.g.
/// `"llama.context_length"`. This looks up the family-qualified key first,
/// falls back to the generic `"general.context_length"` key next, and
/// finally to [`DEFAULT_CONTEXT_LENGTH`].
pub fn resolve_context_length(model_info: &Value, family: &str) -> u32 {
    let family_key = format!("{family}.context_length");
    model_info
        .get(&family_key)
        .and_then(Value::as_u64)
        .or_else(|| model_info.get("general.context_length").and_then(Value::as_u64))
        .map(|v| v as u32)
        .unwrap_or(DEFAULT_CONTEXT_LENGTH)
}

/// `true` iff the given capability set includes `"completion"` — the only
/// capability `list_models` filters on.
pub fn has_completion_capability(capabilities: &[String]) -> bool {
    capabilities.iter().any(|c| c == "completion")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

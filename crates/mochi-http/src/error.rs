// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Maps internal error types to the `{"error": {"code","message","details"}}`
//! envelope and the status codes each code maps to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mochi_core::{SessionError, TurnError};
use serde_json::json;

/// An error ready to be written out as an HTTP response. Constructed from
/// [`TurnError`]/[`SessionError`] via `From`, or directly for
/// request-shape validation failures the HTTP layer itself detects.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: serde_json::Value,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), details: serde_json::Value::Null }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }
}

fn status_for_code(code: &str) -> StatusCode {
    match code {
        "SESSION_NOT_FOUND" | "MODEL_NOT_FOUND" | "TOOL_NOT_FOUND" | "AGENT_NOT_FOUND" | "PROMPT_NOT_FOUND" => StatusCode::NOT_FOUND,
        "INVALID_MESSAGE_INDEX" | "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
        "TOOL_EXECUTION_DENIED" => StatusCode::FORBIDDEN,
        "TOOL_CONFIRMATION_TIMEOUT" => StatusCode::REQUEST_TIMEOUT,
        "AGENT_INVALID" => StatusCode::UNPROCESSABLE_ENTITY,
        "UPSTREAM_UNREACHABLE" | "UPSTREAM_ERROR" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        let code = e.code();
        Self { status: status_for_code(code), code, message: e.to_string(), details: e.details() }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let turn: TurnError = e.into();
        turn.into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": { "code": self.code, "message": self.message, "details": self.details } });
        (self.status, Json(body)).into_response()
    }
}

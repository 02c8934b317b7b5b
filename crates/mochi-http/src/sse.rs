// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Bridges [`mochi_core::Orchestrator::run_streaming`]'s callback-style
//! event emission into an `axum` SSE response body. The orchestrator runs
//! on its own task and pushes events down a channel; the response stream
//! just drains it, exactly the shape `tokio_stream::wrappers::ReceiverStream`
//! is built for.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use mochi_core::{Orchestrator, TurnEvent};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::state::SessionLockGuard;

/// Runs one turn on a background task, returning an SSE response that
/// streams its events as they're emitted. The task outlives the HTTP
/// handler's return if the client disconnects early — `run_streaming`
/// itself handles that by committing whatever was produced so far.
/// `_guard` is moved into the task and held until the turn finishes, so
/// the per-session lock covers the turn's actual lifetime rather than
/// just the handler call that spawned it.
pub fn turn_stream(
    orchestrator: Orchestrator,
    session_id: String,
    user_message: Option<String>,
    think: bool,
    _guard: SessionLockGuard,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<TurnEvent>(64);

    tokio::spawn(async move {
        let _guard = _guard;
        let emit = |event: TurnEvent| {
            // `emit` is called synchronously from inside `run_streaming`;
            // a full channel drops the event rather than blocking the
            // orchestrator task.
            let _ = tx.try_send(event);
        };
        if let Err(e) = orchestrator.run_streaming(&session_id, user_message, think, emit).await {
            let _ = tx.try_send(TurnEvent::Error { code: e.code().to_string(), message: e.to_string(), details: e.details() });
            let _ = tx.try_send(TurnEvent::Done { session_id: session_id.clone() });
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let sse_event = Event::default().event(event.name()).json_data(event.data()).unwrap_or_else(|_| Event::default().event("error"));
        Ok(sse_event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

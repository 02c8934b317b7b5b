// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP surface for the `mochi` service: a plain-HTTP `axum` router
//! exposing the `/api/v1` endpoints, built over the dependency container
//! in [`state::AppState`]. No TLS, peer pairing, or bearer-token
//! machinery lives here — those are out of scope for this service.

pub mod dto;
pub mod error;
pub mod routes;
pub mod sse;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

use tracing::info;

/// Binds to `state.settings.bind_host:bind_port` and serves the `/api/v1`
/// router until the process is terminated.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.settings.bind_host, state.settings.bind_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "mochi HTTP server listening");
    let app = router(state);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

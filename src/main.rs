// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use mochi_core::SessionStore;
use mochi_http::AppState;
use mochi_model::{OllamaClient, UpstreamClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = mochi_config::resolve_file_layer(cli.settings)?;

    init_logging(&settings.log_level);

    let upstream: Arc<dyn UpstreamClient> = Arc::new(OllamaClient::new(settings.upstream_base_url.clone()));
    let state = AppState::new(settings, upstream);

    match cli.command {
        Commands::Serve => mochi_http::serve(state).await,
        Commands::Migrate => migrate(&state).await,
    }
}

/// Forces every session document under the sessions and agent-chat
/// directories onto the current on-disk format, without starting the
/// server. Intended to run ahead of an upgrade that changes the format.
async fn migrate(state: &AppState) -> anyhow::Result<()> {
    let stores = [
        ("session", SessionStore::new(state.settings.sessions_path())),
        ("agent chat", SessionStore::new(state.settings.agent_chats_path())),
    ];

    let mut migrated = 0usize;
    for (kind, store) in &stores {
        for entry in store.list()? {
            store.resave(&entry.metadata.session_id)?;
            info!(kind, session_id = %entry.metadata.session_id, "migrated");
            migrated += 1;
        }
    }

    info!(count = migrated, "migration complete");
    Ok(())
}

/// Resolves the tracing filter from `MOCHI_LOG_LEVEL`, falling back to
/// `RUST_LOG`, then to `info` if neither is set.
fn init_logging(configured_level: &str) {
    // `configured_level` already folds CLI/`MOCHI_LOG_LEVEL`/config-file
    // precedence down to a single value (see `mochi_config::Settings`); it
    // only falls back to `RUST_LOG` when left at its "info" default, so an
    // ad-hoc `RUST_LOG=debug cargo run -- serve` still works unconfigured.
    let filter = if configured_level != "info" {
        EnvFilter::try_new(configured_level).unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

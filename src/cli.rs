// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use mochi_config::Settings;

/// `mochi` top-level command: a headless backend mediating chat clients
/// and a local Ollama-compatible daemon.
#[derive(Parser, Debug)]
#[command(name = "mochi", about = "Headless backend mediating chat clients and a local Ollama-compatible daemon")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server.
    Serve,
    /// Migrate every session document under the configured sessions
    /// directory to the current on-disk format, without starting the
    /// server. Intended for offline maintenance (e.g. before an upgrade).
    Migrate,
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod agents;

pub use agents::{discover_agents, AgentDescriptor, AgentValidation};

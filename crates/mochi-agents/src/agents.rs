// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent discovery.
//!
//! An agent is a subdirectory of the configured agents directory containing
//! an `AGENT.md` skill document (frontmatter `description`, optional
//! `model`, followed by a system prompt body) plus a private tool set
//! discovered by the same `tool.yaml` manifest rules as the Tool Registry. An
//! agent is valid iff its skill document exists, parses, and its private
//! tool set is non-empty.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use mochi_tools::{build_registry_from_dir, ToolRegistry};

#[derive(Debug, Deserialize)]
struct AgentFrontmatter {
    description: String,
    #[serde(default)]
    model: Option<String>,
}

/// A discovered agent, complete with its private tool registry.
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub model: Option<String>,
    pub system_prompt: String,
    pub tools: ToolRegistry,
}

/// Result of discovery for a single candidate agent directory: either a
/// valid descriptor or a reason it was rejected, always reported rather
/// than executed.
pub enum AgentValidation {
    Valid(AgentDescriptor),
    Invalid { name: String, reason: String },
}

fn parse_skill_document(raw: &str) -> Option<(AgentFrontmatter, String)> {
    let rest = raw.trim_start_matches('\n');
    let after_open = rest.strip_prefix("---")?;
    let close = after_open.find("\n---")?;
    let yaml_block = &after_open[..close];
    let body = after_open[close + 4..].trim_start_matches('\n').to_string();
    let fm: AgentFrontmatter = serde_yaml::from_str(yaml_block).ok()?;
    if fm.description.trim().is_empty() {
        return None;
    }
    Some((fm, body))
}

fn validate_agent_dir(dir: &Path) -> AgentValidation {
    let name = dir.file_name().and_then(|s| s.to_str()).unwrap_or("agent").to_string();
    let skill_path = dir.join("AGENT.md");

    let raw = match std::fs::read_to_string(&skill_path) {
        Ok(s) => s,
        Err(e) => {
            return AgentValidation::Invalid { name, reason: format!("AGENT.md unreadable: {e}") }
        }
    };

    let (fm, system_prompt) = match parse_skill_document(&raw) {
        Some(parsed) => parsed,
        None => {
            return AgentValidation::Invalid { name, reason: "AGENT.md missing or invalid frontmatter".into() }
        }
    };

    let tools = build_registry_from_dir(dir);
    if tools.is_empty() {
        return AgentValidation::Invalid { name, reason: "private tool set is empty".into() };
    }

    AgentValidation::Valid(AgentDescriptor { name, description: fm.description, model: fm.model, system_prompt, tools })
}

/// Scan `agents_dir` for one-level-deep agent subdirectories, reporting but
/// never discarding invalid ones: invalid entries are surfaced via
/// `tracing::warn` and excluded from the returned list.
pub fn discover_agents(agents_dir: &Path) -> Vec<AgentDescriptor> {
    let mut valid = Vec::new();
    let entries = match std::fs::read_dir(agents_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %agents_dir.display(), error = %e, "agents directory unreadable");
            return valid;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match validate_agent_dir(&path) {
            AgentValidation::Valid(agent) => valid.push(agent),
            AgentValidation::Invalid { name, reason } => {
                warn!(agent = %name, reason = %reason, "invalid agent skipped");
            }
        }
    }
    valid.sort_by(|a, b| a.name.cmp(&b.name));
    valid
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_agent(dir: &Path, name: &str, description: &str, body: &str, with_tool: bool) {
        let agent_dir = dir.join(name);
        fs::create_dir_all(&agent_dir).unwrap();
        fs::write(agent_dir.join("AGENT.md"), format!("---\ndescription: {description}\n---\n\n{body}")).unwrap();
        if with_tool {
            let tool_dir = agent_dir.join("now");
            fs::create_dir_all(&tool_dir).unwrap();
            fs::write(tool_dir.join("tool.yaml"), "name: now\ndescription: current time\ncommand: [\"date\"]\n").unwrap();
        }
    }

    #[test]
    fn discovers_valid_agent_with_private_tool() {
        let tmp = TempDir::new().unwrap();
        write_agent(tmp.path(), "researcher", "Researches topics.", "You are a researcher.", true);
        let agents = discover_agents(tmp.path());
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "researcher");
        assert_eq!(agents[0].tools.len(), 1);
    }

    #[test]
    fn agent_without_tools_is_invalid() {
        let tmp = TempDir::new().unwrap();
        write_agent(tmp.path(), "empty", "No tools.", "Body.", false);
        assert!(discover_agents(tmp.path()).is_empty());
    }

    #[test]
    fn agent_without_frontmatter_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let agent_dir = tmp.path().join("broken");
        fs::create_dir_all(&agent_dir).unwrap();
        fs::write(agent_dir.join("AGENT.md"), "no frontmatter here").unwrap();
        assert!(discover_agents(tmp.path()).is_empty());
    }

    #[test]
    fn agent_missing_skill_document_is_invalid() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("no-skill")).unwrap();
        assert!(discover_agents(tmp.path()).is_empty());
    }

    #[test]
    fn multiple_agents_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        write_agent(tmp.path(), "zeta", "Z.", "Body.", true);
        write_agent(tmp.path(), "alpha", "A.", "Body.", true);
        let agents = discover_agents(tmp.path());
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].name, "alpha");
        assert_eq!(agents[1].name, "zeta");
    }

    #[test]
    fn missing_agents_dir_returns_empty() {
        let agents = discover_agents(Path::new("/nonexistent/agents/dir"));
        assert!(agents.is_empty());
    }
}

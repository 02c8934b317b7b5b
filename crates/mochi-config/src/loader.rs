// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use crate::Settings;

/// Resolve settings from CLI flags and `MOCHI_*` environment variables,
/// optionally merging a YAML file as the lowest-priority layer beneath them.
///
/// `args` is the raw argv (including argv[0]); pass `std::env::args()` in
/// production and a fixed vector in tests so CLI parsing is deterministic.
pub fn load<I, T>(args: I) -> anyhow::Result<Settings>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    resolve_file_layer(Settings::parse_from(args))
}

/// Merges an already-parsed [`Settings`] with its `--config`/`MOCHI_CONFIG`
/// file layer, if one was given. Split out of [`load`] so a caller that
/// parsed `Settings` as part of a larger `clap` command (flattened under a
/// subcommand, say) can still get the file-layer merge without re-parsing
/// argv from scratch.
pub fn resolve_file_layer(parsed: Settings) -> anyhow::Result<Settings> {
    let Some(path) = parsed.config.clone() else {
        return Ok(parsed);
    };

    debug!(path = %path.display(), "loading config file layer");
    let base = load_yaml_layer(&path)?;
    Ok(merge_cli_over_file(base, parsed))
}

fn load_yaml_layer(path: &Path) -> anyhow::Result<Settings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let file_settings: Settings = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(file_settings)
}

/// CLI/env values (`over`) win for any field the user actually set; fields
/// left at their struct default fall back to the file layer (`base`).
///
/// `clap`'s `env` feature already folds environment variables into `over`,
/// so this merge only has two layers to reconcile: file vs. (CLI ∪ env).
fn merge_cli_over_file(base: Settings, over: Settings) -> Settings {
    let default = Settings::default();
    let pick_string = |o: String, b: String, d: &str| if o != d { o } else { b };
    Settings {
        config: over.config,
        bind_host: pick_string(over.bind_host, base.bind_host, &default.bind_host),
        bind_port: if over.bind_port != default.bind_port { over.bind_port } else { base.bind_port },
        upstream_base_url: pick_string(
            over.upstream_base_url,
            base.upstream_base_url,
            &default.upstream_base_url,
        ),
        data_root: if over.data_root != default.data_root { over.data_root } else { base.data_root },
        sessions_dir: pick_string(over.sessions_dir, base.sessions_dir, &default.sessions_dir),
        tools_dir: pick_string(over.tools_dir, base.tools_dir, &default.tools_dir),
        agents_dir: pick_string(over.agents_dir, base.agents_dir, &default.agents_dir),
        agent_chats_dir: pick_string(
            over.agent_chats_dir,
            base.agent_chats_dir,
            &default.agent_chats_dir,
        ),
        system_prompts_dir: pick_string(
            over.system_prompts_dir,
            base.system_prompts_dir,
            &default.system_prompts_dir,
        ),
        planning_prompt_path: over.planning_prompt_path.or(base.planning_prompt_path),
        execution_prompt_path: over.execution_prompt_path.or(base.execution_prompt_path),
        summarization_enabled: over.summarization_enabled,
        dynamic_context_enabled: over.dynamic_context_enabled,
        log_level: pick_string(over.log_level, base.log_level, &default.log_level),
        confirmation_timeout_secs: if over.confirmation_timeout_secs != default.confirmation_timeout_secs {
            over.confirmation_timeout_secs
        } else {
            base.confirmation_timeout_secs
        },
        max_tool_rounds: if over.max_tool_rounds != default.max_tool_rounds {
            over.max_tool_rounds
        } else {
            base.max_tool_rounds
        },
        max_agent_iterations: if over.max_agent_iterations != default.max_agent_iterations {
            over.max_agent_iterations
        } else {
            base.max_agent_iterations
        },
        session_lock_wait: over.session_lock_wait,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_no_args_returns_defaults() {
        let cfg = load(["mochi"]).unwrap();
        assert_eq!(cfg.bind_port, 11535);
    }

    #[test]
    fn load_cli_flag_overrides_default() {
        let cfg = load(["mochi", "--bind-port", "9999"]).unwrap();
        assert_eq!(cfg.bind_port, 9999);
    }

    #[test]
    fn load_explicit_file_layer_applies_when_cli_silent() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "bind_port: 7777\nupstream_base_url: http://example:1\n").unwrap();
        let path = f.path().to_str().unwrap().to_string();
        let cfg = load(["mochi", "--config", &path]).unwrap();
        assert_eq!(cfg.bind_port, 7777);
        assert_eq!(cfg.upstream_base_url, "http://example:1");
    }

    #[test]
    fn load_cli_flag_wins_over_file_layer() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "bind_port: 7777").unwrap();
        let path = f.path().to_str().unwrap().to_string();
        let cfg = load(["mochi", "--config", &path, "--bind-port", "8888"]).unwrap();
        assert_eq!(cfg.bind_port, 8888);
    }

    #[test]
    fn load_missing_config_file_errors() {
        let result = load(["mochi", "--config", "/tmp/mochi_nonexistent_cfg.yaml"]);
        assert!(result.is_err());
    }
}

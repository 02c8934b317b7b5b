// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Directory-declared tool manifests.
//!
//! Each subdirectory of the configured tools directory may carry a
//! `tool.yaml` sidecar describing a shell-backed tool: its name, schema and
//! the command to invoke. A manifest only describes a schema and a command
//! line — it never injects code, unlike the dynamic symbol discovery this
//! replaces.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Raw shape of a `tool.yaml` sidecar.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    #[serde(default)]
    pub destructive: bool,
    /// Group name this tool contributes to, if any.
    #[serde(default)]
    pub group: Option<String>,
}

fn default_parameters() -> Value {
    serde_json::json!({ "type": "object" })
}

/// Walk `dir` for one-level-deep subdirectories containing a `tool.yaml` and
/// parse each. Entries that fail to parse, or whose manifest has no name or
/// description, are skipped with a warning rather than aborting discovery.
pub fn discover_tool_manifests(dir: &Path) -> Vec<ToolManifest> {
    let mut manifests = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "tool directory unreadable");
            return manifests;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let manifest_path = path.join("tool.yaml");
        if !manifest_path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&manifest_path) {
            Ok(text) => match serde_yaml::from_str::<ToolManifest>(&text) {
                Ok(manifest) if !manifest.name.is_empty() && !manifest.description.is_empty() => {
                    manifests.push(manifest)
                }
                Ok(_) => warn!(path = %manifest_path.display(), "manifest missing name or description, skipped"),
                Err(e) => warn!(path = %manifest_path.display(), error = %e, "unparseable tool manifest, skipped"),
            },
            Err(e) => warn!(path = %manifest_path.display(), error = %e, "unreadable tool manifest, skipped"),
        }
    }
    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    manifests
}

/// A [`Tool`] backed by a manifest-declared shell command. Arguments are
/// passed to the child process as a single JSON document on stdin; the
/// command's stdout (trimmed) becomes the tool result.
pub struct ManifestTool {
    manifest: ToolManifest,
}

impl ManifestTool {
    pub fn new(manifest: ToolManifest) -> Self {
        Self { manifest }
    }

    pub fn group(&self) -> Option<&str> {
        self.manifest.group.as_deref()
    }
}

#[async_trait]
impl Tool for ManifestTool {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn parameters_schema(&self) -> Value {
        self.manifest.parameters.clone()
    }

    fn is_destructive(&self) -> bool {
        self.manifest.destructive
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let start = std::time::Instant::now();
        if self.manifest.command.is_empty() {
            return ToolOutput::err(&call.id, "manifest declares no command", start.elapsed().as_millis() as u64);
        }
        let (program, args) = self.manifest.command.split_first().expect("checked non-empty above");
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolOutput::err(&call.id, format!("spawn failed: {e}"), start.elapsed().as_millis() as u64),
        };

        if let Some(mut stdin) = child.stdin.take() {
            let payload = call.args.to_string();
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                return ToolOutput::err(&call.id, format!("stdin write failed: {e}"), start.elapsed().as_millis() as u64);
            }
        }

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => return ToolOutput::err(&call.id, format!("wait failed: {e}"), start.elapsed().as_millis() as u64),
        };
        let elapsed = start.elapsed().as_millis() as u64;
        if output.status.success() {
            ToolOutput::ok(&call.id, String::from_utf8_lossy(&output.stdout).trim().to_string(), elapsed)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            ToolOutput::err(&call.id, format!("exit {}: {}", output.status, stderr.trim()), elapsed)
        }
    }
}

/// Recursively load every manifest under `dir`'s immediate subdirectories
/// into freshly constructed [`ManifestTool`]s.
pub fn load_manifest_tools(dir: &Path) -> Vec<ManifestTool> {
    discover_tool_manifests(dir).into_iter().map(ManifestTool::new).collect()
}

/// Convenience used by agent private-tool-set discovery: same rules, a
/// different root directory.
pub fn discover_tool_manifests_in(dir: impl AsRef<Path>) -> Vec<ToolManifest> {
    discover_tool_manifests(dir.as_ref())
}

pub fn tool_yaml_path(dir: &Path, tool_subdir: &str) -> PathBuf {
    dir.join(tool_subdir).join("tool.yaml")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_manifest(root: &Path, subdir: &str, contents: &str) {
        let dir = root.join(subdir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("tool.yaml"), contents).unwrap();
    }

    #[test]
    fn discovers_valid_manifest() {
        let tmp = tempdir().unwrap();
        write_manifest(
            tmp.path(),
            "now",
            "name: now\ndescription: current time\ncommand: [\"date\"]\n",
        );
        let manifests = discover_tool_manifests(tmp.path());
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].name, "now");
    }

    #[test]
    fn skips_manifest_missing_description() {
        let tmp = tempdir().unwrap();
        write_manifest(tmp.path(), "broken", "name: broken\n");
        assert!(discover_tool_manifests(tmp.path()).is_empty());
    }

    #[test]
    fn skips_unparseable_yaml() {
        let tmp = tempdir().unwrap();
        write_manifest(tmp.path(), "broken", "not: [valid: yaml");
        assert!(discover_tool_manifests(tmp.path()).is_empty());
    }

    #[test]
    fn ignores_subdirectories_without_manifest() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("empty")).unwrap();
        assert!(discover_tool_manifests(tmp.path()).is_empty());
    }

    #[test]
    fn missing_directory_returns_empty() {
        let manifests = discover_tool_manifests(Path::new("/nonexistent/does/not/exist"));
        assert!(manifests.is_empty());
    }

    #[tokio::test]
    async fn manifest_tool_executes_command_and_captures_stdout() {
        let manifest = ToolManifest {
            name: "echo_args".into(),
            description: "echoes stdin".into(),
            command: vec!["cat".into()],
            parameters: default_parameters(),
            destructive: false,
            group: None,
        };
        let tool = ManifestTool::new(manifest);
        let call = ToolCall { id: "1".into(), name: "echo_args".into(), args: serde_json::json!({"x": 1}) };
        let out = tool.execute(&call).await;
        assert!(!out.is_error);
        assert_eq!(out.content, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn manifest_tool_reports_nonzero_exit_as_error() {
        let manifest = ToolManifest {
            name: "fail".into(),
            description: "always fails".into(),
            command: vec!["false".into()],
            parameters: default_parameters(),
            destructive: false,
            group: None,
        };
        let tool = ManifestTool::new(manifest);
        let call = ToolCall { id: "1".into(), name: "fail".into(), args: serde_json::json!({}) };
        let out = tool.execute(&call).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn manifest_tool_with_empty_command_errors_without_spawning() {
        let manifest = ToolManifest {
            name: "empty".into(),
            description: "no command".into(),
            command: vec![],
            parameters: default_parameters(),
            destructive: false,
            group: None,
        };
        let tool = ManifestTool::new(manifest);
        let call = ToolCall { id: "1".into(), name: "empty".into(), args: serde_json::json!({}) };
        let out = tool.execute(&call).await;
        assert!(out.is_error);
        assert!(out.content.contains("no command"));
    }
}

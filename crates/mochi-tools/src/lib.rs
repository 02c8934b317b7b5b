// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod manifest;
pub mod policy;
pub mod registry;
pub mod tool;

pub use manifest::{discover_tool_manifests, load_manifest_tools, ManifestTool, ToolManifest};
pub use policy::{requires_confirmation, ExecutionPolicy};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{Tool, ToolCall, ToolOutput};

use std::path::Path;

/// Build a registry from every manifest found under `tools_dir`, grouping by
/// each manifest's declared group name.
pub fn build_registry_from_dir(tools_dir: &Path) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for manifest in discover_tool_manifests(tools_dir) {
        let group = manifest.group.clone();
        let tool = ManifestTool::new(manifest);
        match group {
            Some(group) => registry.register_in_group(&group, tool),
            None => registry.register(tool),
        }
    }
    registry
}

//! Tool factory (C8). Grounded on `hive/tools/factory.py`: discover
//! internal tools, run the quarantine gate (C9), then load every approved
//! external tool, allowing an external tool to override an internal one
//! of the same name (with a warning).
//!
//! External tools are JSON manifests rather than Python source — see
//! [`crate::tools::quarantine`] for why. A manifest names a sandboxed
//! command; the factory never executes anything it hasn't hashed and
//! matched against an `approved` `ToolApproval` row.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::HiveError;
use crate::store::Store;
use crate::tools::quarantine::run_quarantine_scan;
use crate::tools::{BoxFuture, Tool, ToolRegistry};

const EXTERNAL_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalToolManifest {
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_widget")]
    pub widget: String,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
    /// Executable, resolved relative to the tools directory; must not
    /// traverse outside it.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_description() -> String { "External tool.".to_string() }
fn default_widget() -> String { "text".to_string() }
fn default_tags() -> Vec<String> { vec!["llm".to_string()] }
fn default_schema() -> Value { serde_json::json!({ "type": "object" }) }

/// A tool backed by a sandboxed external command: invoked with the
/// caller's params as JSON on stdin, expected to print a JSON result on
/// stdout, run with a scrubbed environment and bounded wall-clock time.
pub struct ExternalScriptTool {
    manifest: ExternalToolManifest,
    command_path: PathBuf,
    // Tool::name/description/widget/tags return `&'static str`, a contract
    // that fits compile-time internal tools; external tools only learn
    // these strings at load time, so they're leaked exactly once here
    // rather than on every trait-method call.
    name: &'static str,
    description: &'static str,
    widget: &'static str,
    tags: &'static [&'static str],
}

impl ExternalScriptTool {
    /// Builds the tool, rejecting a manifest whose `command` would escape
    /// the tools directory (the Rust analogue of the original's forbidden
    /// import-prefix check: no access outside the sandboxed area).
    pub fn new(tools_dir: &Path, manifest: ExternalToolManifest) -> anyhow::Result<Self> {
        if manifest.command.contains("..") || Path::new(&manifest.command).is_absolute() {
            anyhow::bail!("tool '{}' has an unsafe command path: {}", manifest.name, manifest.command);
        }
        let command_path = tools_dir.join(&manifest.command);
        let name = Box::leak(manifest.name.clone().into_boxed_str());
        let description = Box::leak(manifest.description.clone().into_boxed_str());
        let widget = Box::leak(manifest.widget.clone().into_boxed_str());
        let tags: Vec<&'static str> = manifest
            .tags
            .iter()
            .map(|t| Box::leak(t.clone().into_boxed_str()) as &'static str)
            .collect();
        let tags = Box::leak(tags.into_boxed_slice());
        Ok(Self { manifest, command_path, name, description, widget, tags })
    }
}

impl Tool for ExternalScriptTool {
    fn name(&self) -> &'static str {
        self.name
    }
    fn description(&self) -> &'static str {
        self.description
    }
    fn widget(&self) -> &'static str {
        self.widget
    }
    fn tags(&self) -> &'static [&'static str] {
        self.tags
    }

    fn input_schema(&self) -> Value {
        self.manifest.input_schema.clone()
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            use tokio::io::AsyncWriteExt;

            let mut child = Command::new(&self.command_path)
                .args(&self.manifest.args)
                .env_clear()
                .env("PATH", std::env::var("PATH").unwrap_or_default())
                .stdin(std::process::Stdio::piped())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .spawn()?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(params.to_string().as_bytes()).await?;
            }

            let output = timeout(EXTERNAL_TOOL_TIMEOUT, child.wait_with_output())
                .await
                .map_err(|_| HiveError::ExternalTool(format!("tool '{}' timed out", self.manifest.name)))??;

            if !output.status.success() {
                return Err(HiveError::ExternalTool(format!(
                    "tool '{}' exited with an error: {}",
                    self.manifest.name,
                    String::from_utf8_lossy(&output.stderr)
                ))
                .into());
            }

            let value: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
                HiveError::ExternalTool(format!("tool '{}' did not return JSON: {e}", self.manifest.name))
            })?;
            Ok(value)
        })
    }
}

/// Load every approved external tool manifest from `tools_dir` after
/// running the quarantine gate.
async fn load_external_tools(store: &Store, tools_dir: &Path) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
    let approved = run_quarantine_scan(store, tools_dir).await?;
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

    for filename in approved {
        let path = tools_dir.join(&filename);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(tool = %filename, error = %e, "could not read approved tool manifest");
                continue;
            }
        };
        let manifest: ExternalToolManifest = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(tool = %filename, error = %e, "invalid tool manifest, skipping");
                continue;
            }
        };
        match ExternalScriptTool::new(tools_dir, manifest) {
            Ok(tool) => tools.push(Arc::new(tool)),
            Err(e) => tracing::error!(tool = %filename, error = %e, "rejected unsafe tool manifest"),
        }
    }

    Ok(tools)
}

/// Assemble the full registry: every internal tool registered by the
/// caller, then external tools layered on top (an external tool with a
/// matching name overrides the internal one, with a warning).
pub async fn extend_with_external_tools(
    registry: &mut ToolRegistry,
    config: &Config,
    store: &Store,
) {
    let external = match load_external_tools(store, &config.tools_dir()).await {
        Ok(tools) => tools,
        Err(e) => {
            tracing::error!(error = %e, "external tool discovery failed");
            Vec::new()
        }
    };

    for tool in external {
        if registry.get(tool.name()).is_some() {
            tracing::warn!(tool = tool.name(), "external tool overrides an internal tool of the same name");
        }
        registry.register(tool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_command_path_escaping_tools_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ExternalToolManifest {
            name: "evil".into(),
            description: default_description(),
            widget: default_widget(),
            tags: default_tags(),
            input_schema: default_schema(),
            command: "../../../bin/sh".into(),
            args: vec![],
        };
        assert!(ExternalScriptTool::new(dir.path(), manifest).is_err());
    }

    #[test]
    fn accepts_relative_command_path() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ExternalToolManifest {
            name: "ok".into(),
            description: default_description(),
            widget: default_widget(),
            tags: default_tags(),
            input_schema: default_schema(),
            command: "ok.sh".into(),
            args: vec![],
        };
        assert!(ExternalScriptTool::new(dir.path(), manifest).is_ok());
    }
}

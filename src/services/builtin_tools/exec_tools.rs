//! Shell/Python/pytest execution tools (§4.3 `shell`/`python` categories).
//!
//! Grounded in the `HookExecutor::run_script`
//! (`services/hook_executor.rs`): `tokio::process::Command` with piped
//! stdout/stderr, working directory pinned, result reported as an
//! exit-status-plus-output structure rather than raising on a non-zero exit
//! (agents need to see a failing command's output, not a generic error).

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::domain::error::BuiltinToolError;
use crate::domain::ports::builtin_tool::BuiltinTool;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const TRUNCATE_BYTES: usize = 16_000;

fn truncate(s: String) -> String {
    if s.len() <= TRUNCATE_BYTES {
        return s;
    }
    let total = s.len();
    let mut cut = TRUNCATE_BYTES;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n(truncated, total {total} bytes)", &s[..cut])
}

async fn run_command(mut command: Command, cwd: &PathBuf, timeout_secs: u64, label: &str) -> Result<Value, BuiltinToolError> {
    command.current_dir(cwd).stdout(Stdio::piped()).stderr(Stdio::piped());

    let child = command.spawn().map_err(|e| BuiltinToolError::ArgError { tool: label.into(), detail: e.to_string() })?;
    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| BuiltinToolError::ArgError { tool: label.into(), detail: format!("timed out after {timeout_secs}s") })?
        .map_err(|e| BuiltinToolError::Io(e.to_string()))?;

    Ok(json!({
        "exit_code": output.status.code(),
        "stdout": truncate(String::from_utf8_lossy(&output.stdout).into_owned()),
        "stderr": truncate(String::from_utf8_lossy(&output.stderr).into_owned()),
    }))
}

#[derive(Deserialize)]
struct BashArgs {
    command: String,
    timeout_secs: Option<u64>,
}

pub struct BashTool {
    cwd: PathBuf,
}

impl BashTool {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl BuiltinTool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: BashArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "bash".into(), detail: e.to_string() })?;
        let mut command = Command::new("bash");
        command.arg("-c").arg(&args.command);
        run_command(command, &self.cwd, args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS), "bash").await
    }
}

#[derive(Deserialize)]
struct PythonArgs {
    code: String,
    timeout_secs: Option<u64>,
}

pub struct PythonTool {
    cwd: PathBuf,
}

impl PythonTool {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl BuiltinTool for PythonTool {
    fn name(&self) -> &str {
        "python"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: PythonArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "python".into(), detail: e.to_string() })?;
        let mut command = Command::new("python3");
        command.arg("-c").arg(&args.code);
        run_command(command, &self.cwd, args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS), "python").await
    }
}

#[derive(Deserialize)]
struct PytestArgs {
    path: Option<String>,
    timeout_secs: Option<u64>,
}

pub struct PytestTool {
    cwd: PathBuf,
}

impl PytestTool {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl BuiltinTool for PytestTool {
    fn name(&self) -> &str {
        "run_pytest"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: PytestArgs = serde_json::from_value(args).map_err(|e| BuiltinToolError::ArgError { tool: "run_pytest".into(), detail: e.to_string() })?;
        let mut command = Command::new("python3");
        command.arg("-m").arg("pytest");
        if let Some(path) = &args.path {
            command.arg(path);
        }
        run_command(command, &self.cwd, args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS), "run_pytest").await
    }
}

/// Construct the full execution tool set for registration (§4.3).
pub fn all(cwd: impl Into<PathBuf>) -> Vec<Arc<dyn BuiltinTool>> {
    let cwd = cwd.into();
    vec![Arc::new(BashTool::new(cwd.clone())), Arc::new(PythonTool::new(cwd.clone())), Arc::new(PytestTool::new(cwd))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn bash_reports_exit_code_and_stdout() {
        let dir = tempdir().unwrap();
        let tool = BashTool::new(dir.path());
        let result = tool.call(json!({"command": "echo hi"})).await.unwrap();
        assert_eq!(result["exit_code"], 0);
        assert!(result["stdout"].as_str().unwrap().contains("hi"));
    }

    #[tokio::test]
    async fn bash_reports_nonzero_exit_without_erroring() {
        let dir = tempdir().unwrap();
        let tool = BashTool::new(dir.path());
        let result = tool.call(json!({"command": "exit 3"})).await.unwrap();
        assert_eq!(result["exit_code"], 3);
    }

    #[tokio::test]
    async fn bash_times_out_on_a_long_command() {
        let dir = tempdir().unwrap();
        let tool = BashTool::new(dir.path());
        let err = tool.call(json!({"command": "sleep 5", "timeout_secs": 1})).await.unwrap_err();
        assert!(matches!(err, BuiltinToolError::ArgError { .. }));
    }
}

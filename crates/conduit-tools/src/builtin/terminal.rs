//! Terminal tools: run shell commands in-process.
//!
//! Commands run through `sh -c` with captured output and a deadline. There is
//! no sandboxing; callers decide what may reach this domain.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::Result;
use crate::tool::{ParamExt, Tool, ToolResult};

/// Domain key for these tools.
pub const DOMAIN: &str = "terminal";

/// Configuration for command execution.
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Default deadline for a command.
    pub timeout: Duration,
    /// Working directory used when a call gives no `cwd`.
    pub working_dir: Option<PathBuf>,
    /// Maximum bytes kept per output stream.
    pub max_output_size: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            working_dir: None,
            max_output_size: 1024 * 1024,
        }
    }
}

impl TerminalConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default command deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the per-stream output cap.
    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// execute_command
// ─────────────────────────────────────────────────────────────────────────────

/// Runs a shell command and returns its captured output.
#[derive(Debug, Clone, Default)]
pub struct ExecuteCommandTool {
    config: TerminalConfig,
}

impl ExecuteCommandTool {
    /// Create with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration.
    pub fn with_config(config: TerminalConfig) -> Self {
        Self { config }
    }

    fn clip(&self, raw: &[u8]) -> String {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches(['\n', '\r']);
        if text.len() > self.config.max_output_size {
            let mut end = self.config.max_output_size;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}\n\n[Output truncated at {} bytes]",
                &text[..end],
                self.config.max_output_size
            )
        } else {
            text.to_string()
        }
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout, stderr and exit code."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory for this command"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Command timeout in seconds",
                    "default": self.config.timeout.as_secs()
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let command = match params.required_str("command", "provide the shell command to run") {
            Ok(c) => c,
            Err(e) => return Ok(e.into()),
        };
        let working_dir = params
            .optional_str("cwd")
            .map(PathBuf::from)
            .or_else(|| self.config.working_dir.clone());
        let deadline = params
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.config.timeout);

        if let Some(dir) = &working_dir
            && !dir.is_dir()
        {
            return Ok(ToolResult::error(format!(
                "Working directory not found: {}",
                dir.display()
            )));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = &working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(command = %command, "executing command");

        match timeout(deadline, cmd.output()).await {
            Ok(Ok(output)) => {
                let payload = json!({
                    "stdout": self.clip(&output.stdout),
                    "stderr": self.clip(&output.stderr),
                    "exitCode": output.status.code(),
                });
                if output.status.success() {
                    Ok(ToolResult::ok(payload))
                } else {
                    let code = output
                        .status
                        .code()
                        .map_or_else(|| "signal".to_string(), |c| c.to_string());
                    Ok(ToolResult::error_with(
                        format!("Command failed with exit code {}", code),
                        payload,
                    ))
                }
            }
            Ok(Err(e)) => Ok(ToolResult::error(format!(
                "Failed to execute command: {}",
                e
            ))),
            Err(_) => Ok(ToolResult::error(format!(
                "Command timed out after {:?}",
                deadline
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// get_working_directory
// ─────────────────────────────────────────────────────────────────────────────

/// Reports the directory commands run in by default.
#[derive(Debug, Clone, Default)]
pub struct WorkingDirectoryTool {
    config: TerminalConfig,
}

impl WorkingDirectoryTool {
    /// Create with custom configuration.
    pub fn with_config(config: TerminalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for WorkingDirectoryTool {
    fn name(&self) -> &str {
        "get_working_directory"
    }

    fn description(&self) -> &str {
        "Return the default working directory for terminal commands."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult> {
        let dir = match &self.config.working_dir {
            Some(dir) => dir.clone(),
            None => match std::env::current_dir() {
                Ok(dir) => dir,
                Err(e) => {
                    return Ok(ToolResult::error(format!(
                        "Cannot determine working directory: {}",
                        e
                    )));
                }
            },
        };
        Ok(ToolResult::ok(json!({"path": dir.display().to_string()})))
    }
}

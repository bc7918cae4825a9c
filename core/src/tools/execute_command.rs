use crate::tools::required_arg;
use crate::traits::{ParamKind, Tool, ToolArgs, ToolParameter, ToolResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a command through the platform shell with host privileges.
///
/// The child is killed if it outlives the timeout.
pub struct ExecuteCommandTool {
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl ExecuteCommandTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

impl Default for ExecuteCommandTool {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout and stderr"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required("command", ParamKind::String)]
    }

    async fn execute(&self, args: &ToolArgs) -> anyhow::Result<ToolResult> {
        let command = required_arg(args, "command")?.trim();
        if command.is_empty() {
            return Ok(ToolResult::error("Empty command"));
        }

        tracing::info!(command = %command, "execute_command");

        let output = match tokio::time::timeout(self.timeout, self.shell_command(command).output())
            .await
        {
            Err(_) => {
                tracing::warn!(command = %command, timeout_secs = self.timeout.as_secs(), "command timed out");
                return Ok(ToolResult::error(format!(
                    "Command timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            Ok(Err(e)) => {
                return Ok(ToolResult::error(format!("Failed to execute command: {e}")));
            }
            Ok(Ok(output)) => output,
        };

        let rendered = format!(
            "STDOUT:\n{}\nSTDERR:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if output.status.success() {
            return Ok(ToolResult::success(rendered));
        }

        let status = output
            .status
            .code()
            .map_or_else(|| "unknown (terminated by signal)".to_string(), |c| c.to_string());
        Ok(ToolResult {
            success: false,
            output: rendered,
            error: Some(format!("Command exited with status {status}")),
        })
    }
}

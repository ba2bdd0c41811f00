//! `shell` tool: runs an authorized command through the platform sandbox.
//! Authorization (read/write policy, secret scanning, LLM judgement) has
//! already run by the time this executor sees the call; it only spawns
//! and captures.

use super::ToolExecutor;
use crate::session::LastSandboxOutput;
use crate::session::Session;
use crate::shell;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use stec_protocol::ToolCall;
use stec_protocol::ToolResult;
use tokio_util::sync::CancellationToken;

pub struct ShellTool {
    session: Arc<Session>,
    cwd: std::path::PathBuf,
}

impl ShellTool {
    pub fn new(session: Arc<Session>, cwd: std::path::PathBuf) -> Self {
        Self { session, cwd }
    }
}

#[async_trait]
impl ToolExecutor for ShellTool {
    fn requires_exclusive_execution(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let command = match call.parameters.get("command").and_then(|v| v.as_array()) {
            Some(argv) => argv.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>(),
            None => return ToolResult::error(&call.id, "missing required parameter `command`"),
        };
        if command.is_empty() {
            return ToolResult::error(&call.id, "command must include at least one argument");
        }

        let mut params = shell::ExecParams::new(command, self.cwd.clone());
        if let Ok(stdin) = call.parameters.required_str("stdin") {
            params.stdin = Some(stdin.to_string());
        }

        match shell::process_exec_tool_call(params, shell::platform_sandbox(), CancellationToken::new()).await {
            Ok(output) => {
                self.session
                    .set_last_sandbox_output(LastSandboxOutput {
                        exit_code: output.exit_code,
                        stdout: output.stdout.clone(),
                        stderr: output.stderr.clone(),
                    })
                    .await;
                ToolResult::success(
                    &call.id,
                    json!({
                        "stdout": output.stdout,
                        "stderr": output.stderr,
                        "exit_code": output.exit_code,
                        "timed_out": output.timed_out,
                    }),
                )
            }
            Err(err) => ToolResult::error(&call.id, err.to_string()),
        }
    }
}

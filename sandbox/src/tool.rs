//! Adapts [`SandboxExecutor`] to the `stec-core` tool registry as the
//! `go_sandbox` tool.

use crate::executor::ExecuteOutcome;
use crate::executor::ExecuteParams;
use crate::executor::SandboxExecutor;
use async_trait::async_trait;
use serde_json::json;
use stec_core::tools::ToolExecutor;
use stec_protocol::ToolCall;
use stec_protocol::ToolResult;
use tokio_util::sync::CancellationToken;

pub struct SandboxTool {
    executor: SandboxExecutor,
}

impl SandboxTool {
    pub fn new(executor: SandboxExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolExecutor for SandboxTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let code = match call.parameters.required_str("code") {
            Ok(code) => code.to_string(),
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };
        let timeout = call.parameters.optional_i64("timeout", 30).unwrap_or(30).max(1) as u64;
        let background = call.parameters.optional_bool("background", false).unwrap_or(false);

        let params = ExecuteParams { code, timeout: Some(timeout), background };
        match self.executor.execute(params, CancellationToken::new()).await {
            Ok(ExecuteOutcome::Completed(result)) => ToolResult::success(
                &call.id,
                json!({
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                    "exit_code": result.exit_code,
                    "timeout": result.timed_out,
                    "metadata": {
                        "duration_ms": result.metadata.duration_ms,
                        "stdout_bytes": result.metadata.stdout_bytes,
                        "stdout_lines": result.metadata.stdout_lines,
                        "stderr_bytes": result.metadata.stderr_bytes,
                        "stderr_lines": result.metadata.stderr_lines,
                        "command_summary": result.metadata.command_summary,
                        "host_calls": result.metadata.host_calls.iter().map(|record| json!({
                            "name": record.name,
                            "detail": record.detail,
                        })).collect::<Vec<_>>(),
                    },
                }),
            ),
            Ok(ExecuteOutcome::Background { job_id, message }) => {
                ToolResult::success(&call.id, json!({ "job_id": job_id, "message": message }))
            }
            Err(err) => ToolResult::error(&call.id, err.to_string()),
        }
    }
}

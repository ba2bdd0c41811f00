//! Built-in tool catalog (§4.F.1): direct tools dispatched straight from
//! the registry without going through the shell executor or WASM sandbox.

use super::ToolExecutor;
use crate::fs::AuthorizedFs;
use crate::session::Session;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use stec_protocol::ToolCall;
use stec_protocol::ToolResult;

pub struct ReadFileTool {
    fs: Arc<AuthorizedFs>,
}

impl ReadFileTool {
    pub fn new(fs: Arc<AuthorizedFs>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl ToolExecutor for ReadFileTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let path = match call.parameters.required_path("path") {
            Ok(p) => p,
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };
        let from = call.parameters.optional_i64("from_line", 0).unwrap_or(0).max(0) as usize;
        let to = call.parameters.optional_i64("to_line", 0).unwrap_or(0).max(0) as usize;

        let content = if from == 0 && to == 0 {
            self.fs.read_file(&path).await
        } else {
            self.fs.read_file_lines(&path, from, to).await
        };

        match content {
            Ok(content) => ToolResult::success(&call.id, json!({ "content": content })),
            Err(err) => ToolResult::error(&call.id, err.to_string()),
        }
    }
}

pub struct ListDirTool {
    fs: Arc<AuthorizedFs>,
}

impl ListDirTool {
    pub fn new(fs: Arc<AuthorizedFs>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl ToolExecutor for ListDirTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let path = match call.parameters.required_path("path") {
            Ok(p) => p,
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };
        match self.fs.list_dir(&path).await {
            Ok(entries) => {
                let entries: Vec<String> =
                    entries.into_iter().map(|p| p.display().to_string()).collect();
                ToolResult::success(&call.id, json!({ "entries": entries }))
            }
            Err(err) => ToolResult::error(&call.id, err.to_string()),
        }
    }
}

/// Writes a file that must not already exist. Authorization (§4.E) already
/// rejected calls where the path exists; this tool still checks again
/// defensively since it may be invoked directly in tests.
pub struct CreateFileTool {
    fs: Arc<AuthorizedFs>,
}

impl CreateFileTool {
    pub fn new(fs: Arc<AuthorizedFs>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl ToolExecutor for CreateFileTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let path = match call.parameters.required_path("path") {
            Ok(p) => p,
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };
        let content = call.parameters.optional_str("content").ok().flatten().unwrap_or("");
        if self.fs.exists(&path).await {
            return ToolResult::error(&call.id, format!("{} already exists", path.display()));
        }
        match self.fs.write_file(&path, content).await {
            Ok(()) => ToolResult::success(&call.id, json!({ "path": path.display().to_string() })),
            Err(err) => ToolResult::error(&call.id, err.to_string()),
        }
    }
}

/// `edit_file`/`replace_file`: overwrites an existing, already-read path.
pub struct EditFileTool {
    fs: Arc<AuthorizedFs>,
}

impl EditFileTool {
    pub fn new(fs: Arc<AuthorizedFs>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl ToolExecutor for EditFileTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let path = match call.parameters.required_path("path") {
            Ok(p) => p,
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };
        let content = match call.parameters.required_str("content") {
            Ok(c) => c,
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };
        match self.fs.write_file(&path, content).await {
            Ok(()) => ToolResult::success(&call.id, json!({ "path": path.display().to_string() })),
            Err(err) => ToolResult::error(&call.id, err.to_string()),
        }
    }
}

/// Dispatches into `stec-diff-editor`, gated by the same read-before-write
/// policy applied per affected path by the authorization core before this
/// tool ever runs.
pub struct ApplyPatchTool {
    cwd: std::path::PathBuf,
}

impl ApplyPatchTool {
    pub fn new(cwd: std::path::PathBuf) -> Self {
        Self { cwd }
    }
}

#[async_trait]
impl ToolExecutor for ApplyPatchTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let patch = match call.parameters.required_str("patch") {
            Ok(p) => p,
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };

        let patch = patch.to_string();
        let cwd = self.cwd.clone();
        let id = call.id.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let previous = std::env::current_dir().ok();
            if std::env::set_current_dir(&cwd).is_err() {
                return Err("failed to change into working directory for apply_patch".to_string());
            }
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let result = stec_diff_editor::apply_patch(&patch, &mut stdout, &mut stderr);
            if let Some(previous) = previous {
                let _ = std::env::set_current_dir(previous);
            }
            match result {
                Ok(()) => Ok((
                    String::from_utf8_lossy(&stdout).to_string(),
                    String::from_utf8_lossy(&stderr).to_string(),
                )),
                Err(err) => Err(err.to_string()),
            }
        })
        .await;

        match outcome {
            Ok(Ok((stdout, stderr))) => {
                ToolResult::success(&id, json!({ "stdout": stdout, "stderr": stderr }))
            }
            Ok(Err(message)) => ToolResult::error(&id, message),
            Err(join_err) => ToolResult::error(&id, join_err.to_string()),
        }
    }
}

pub struct ReadLastSandboxOutputTool {
    session: Arc<Session>,
}

impl ReadLastSandboxOutputTool {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ToolExecutor for ReadLastSandboxOutputTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        match self.session.last_sandbox_output().await {
            Some(output) => ToolResult::success(
                &call.id,
                json!({
                    "exit_code": output.exit_code,
                    "stdout": output.stdout,
                    "stderr": output.stderr,
                }),
            ),
            None => ToolResult::success(&call.id, json!(null)),
        }
    }
}

pub struct BackgroundJobStatusTool {
    session: Arc<Session>,
}

impl BackgroundJobStatusTool {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ToolExecutor for BackgroundJobStatusTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let job_id = match call.parameters.required_str("id") {
            Ok(id) => id.to_string(),
            Err(err) => return ToolResult::error(&call.id, err.to_string()),
        };
        match self.session.background_job(&job_id).await {
            Some(job) => ToolResult::success(
                &call.id,
                json!({
                    "id": job.id,
                    "completed": job.completed,
                    "exit_code": job.exit_code,
                    "stdout_lines": job.stdout_lines,
                    "stderr_lines": job.stderr_lines,
                }),
            ),
            None => ToolResult::error(&call.id, format!("no background job with id `{job_id}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::fs::TokioFilesystem;
    use stec_protocol::Params;

    fn call(name: &str, params: serde_json::Value) -> ToolCall {
        ToolCall::new("t1", name, Params::new(params.as_object().cloned().unwrap_or_default()))
    }

    #[tokio::test]
    async fn create_file_rejects_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("already.txt");
        std::fs::write(&existing, "x").unwrap();

        let session = Arc::new(Session::new(dir.path().to_path_buf()));
        let fs = Arc::new(AuthorizedFs::new(Arc::new(TokioFilesystem), session));
        let tool = CreateFileTool::new(fs);

        let result = tool
            .execute(&call("create_file", json!({ "path": existing.to_str().unwrap() })))
            .await;
        assert!(!result.is_ok());
    }

    #[tokio::test]
    async fn read_last_sandbox_output_returns_null_when_absent() {
        let session = Arc::new(Session::new(std::path::PathBuf::from("/tmp")));
        let tool = ReadLastSandboxOutputTool::new(session);
        let result = tool.execute(&call("read_last_sandbox_output", json!({}))).await;
        assert!(result.is_ok());
    }
}

//! Bootstraps the STEC components and drives them from stdin/stdout.

use std::path::PathBuf;
use std::sync::Arc;

use stec_core::actor;
use stec_core::approval::ApprovalClient;
use stec_core::approval::NullSink;
use stec_core::authorization::judge::NoJudge;
use stec_core::authorization::secrets::RegexSecretDetector;
use stec_core::authorization::AuthorizationCore;
use stec_core::config;
use stec_core::fs::AuthorizedFs;
use stec_core::fs::TokioFilesystem;
use stec_core::session::Session;
use stec_core::tools::builtin::ApplyPatchTool;
use stec_core::tools::builtin::BackgroundJobStatusTool;
use stec_core::tools::builtin::CreateFileTool;
use stec_core::tools::builtin::EditFileTool;
use stec_core::tools::builtin::ListDirTool;
use stec_core::tools::builtin::ReadFileTool;
use stec_core::tools::builtin::ReadLastSandboxOutputTool;
use stec_core::tools::executor_actor::ExecutorActor;
use stec_core::tools::executor_actor::ToolExecution;
use stec_core::tools::parallel::ParallelTool;
use stec_core::tools::shell_tool::ShellTool;
use stec_core::tools::HealthMonitor;
use stec_core::tools::ToolRegistry;
use stec_protocol::ToolCall;
use stec_protocol::ToolResult;
use stec_sandbox::compiler::RustcWasmBackend;
use stec_sandbox::SandboxExecutor;
use stec_sandbox::SandboxTool;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tracing::error;
use tracing::info;

const DIRECT_TOOL_NAMES: &[&str] = &[
    "read_file",
    "list_dir",
    "create_file",
    "edit_file",
    "apply_patch",
    "read_last_sandbox_output",
    "background_job_status",
    "shell",
    "go_sandbox",
];

pub struct Runtime {
    registry: Arc<ToolRegistry>,
    executor: actor::ActorRef<ToolExecution>,
    authorization: Arc<AuthorizationCore>,
}

impl Runtime {
    pub async fn bootstrap(workspace_root: PathBuf, stec_home: PathBuf) -> anyhow::Result<Self> {
        let config_file = config::load_config(&stec_home).await?;
        let wasm_compiler_path = config_file.wasm_compiler_path.clone();
        let options = config_file.into_authorization_options();

        let session = Arc::new(Session::new(workspace_root.clone()));
        let fs = Arc::new(AuthorizedFs::new(Arc::new(TokioFilesystem), session.clone()));
        let authorization = Arc::new(AuthorizationCore::new(
            session.clone(),
            options,
            Arc::new(NoJudge),
            Arc::new(RegexSecretDetector),
        ));
        // No interactive operator is wired into this harness (the terminal
        // UI is out of scope here); every ask-user decision auto-denies.
        let approval = Arc::new(ApprovalClient::new(Arc::new(NullSink)));

        let mut direct = ToolRegistry::new();
        direct.register("read_file", Arc::new(ReadFileTool::new(fs.clone())));
        direct.register("list_dir", Arc::new(ListDirTool::new(fs.clone())));
        direct.register("create_file", Arc::new(CreateFileTool::new(fs.clone())));
        direct.register("edit_file", Arc::new(EditFileTool::new(fs.clone())));
        direct.register("apply_patch", Arc::new(ApplyPatchTool::new(workspace_root.clone())));
        direct.register("read_last_sandbox_output", Arc::new(ReadLastSandboxOutputTool::new(session.clone())));
        direct.register("background_job_status", Arc::new(BackgroundJobStatusTool::new(session.clone())));
        direct.register("shell", Arc::new(ShellTool::new(session.clone(), workspace_root.clone())));

        let compiler: Arc<dyn stec_sandbox::compiler::CompilerBackend> = match wasm_compiler_path {
            Some(binary) => Arc::new(RustcWasmBackend::new(binary)),
            None => Arc::new(RustcWasmBackend::default()),
        };
        let sandbox_executor = SandboxExecutor {
            compiler,
            authorization: authorization.clone(),
            approval: approval.clone(),
            session: session.clone(),
            fs: fs.clone(),
            html_converter: Arc::new(stec_sandbox::collaborators::HeuristicHtmlConverter),
            summarizer: Arc::new(stec_sandbox::collaborators::NoSummarizer),
            http_client: reqwest::Client::new(),
            stec_home: stec_home.clone(),
        };
        direct.register("go_sandbox", Arc::new(SandboxTool::new(sandbox_executor)));

        let direct = Arc::new(direct);

        // `parallel` fans out into every other registered tool; it is kept
        // in a second, outer registry so it can hold a reference to the
        // inner one without needing interior mutability on `ToolRegistry`.
        let mut outer = ToolRegistry::new();
        for name in DIRECT_TOOL_NAMES {
            let name = *name;
            if let Some(executor) = direct.get(name) {
                outer.register(name, executor);
            }
        }
        outer.register("parallel", Arc::new(ParallelTool::new(direct.clone())));

        let registry = Arc::new(outer);
        let health = Arc::new(HealthMonitor::new());
        let executor = actor::spawn("tool-executor", 64, ExecutorActor::new(registry.clone(), health));

        Ok(Self { registry, executor, authorization })
    }

    /// Authorizes then dispatches a single call, applying the §4.E
    /// decision before the call ever reaches a tool executor.
    async fn handle(&self, call: ToolCall) -> ToolResult {
        let decision = self.authorization.authorize_tool_call(&call.name, &call.parameters).await;
        if !decision.allowed {
            return if decision.requires_user_input {
                ToolResult::requires_user_input(&call.id, decision.reason)
            } else {
                ToolResult::error(&call.id, decision.reason)
            };
        }

        let (tx, rx) = oneshot::channel();
        let call_id = call.id.clone();
        if let Err(err) = self.executor.send(ToolExecution::new(call, tx)) {
            return ToolResult::error(call_id, err.to_string());
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => ToolResult::error(call_id, "tool executor dropped the response channel"),
        }
    }

    /// Reads one JSON-encoded `ToolCall` per line from `stdin`, dispatches
    /// it, and writes the resulting `ToolResult` as one JSON line to
    /// `stdout`. Runs until stdin closes.
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut lines = tokio::io::BufReader::new(stdin).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let call: ToolCall = match serde_json::from_str(&line) {
                Ok(call) => call,
                Err(err) => {
                    error!(error = %err, "failed to parse tool call line");
                    continue;
                }
            };

            info!(tool = %call.name, call_id = %call.id, "dispatching tool call");
            let result = self.handle(call).await;
            let encoded = serde_json::to_string(&result)?;
            stdout.write_all(encoded.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        Ok(())
    }
}

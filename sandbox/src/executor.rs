//! Compile -> instantiate -> run -> capture, the pipeline behind one
//! sandbox invocation (§4.H). A fresh `wasmtime::Store` and temp directory
//! back every call; both are torn down on return regardless of outcome.

use crate::call_tracker::CallRecord;
use crate::call_tracker::CallTracker;
use crate::collaborators::HtmlConverter;
use crate::collaborators::Summarizer;
use crate::compiler::CompilerBackend;
use crate::error::SandboxRunError;
use crate::host_abi::{self, SandboxContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use stec_core::approval::ApprovalClient;
use stec_core::authorization::AuthorizationCore;
use stec_core::deadline::Deadline;
use stec_core::fs::AuthorizedFs;
use stec_core::session::BackgroundJob;
use stec_core::session::Session;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use wasmtime::{AsContextMut, Config, Engine, Linker, Memory, Store};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::WasiCtxBuilder;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 3600;
const COMMAND_SUMMARY_MAX_LEN: usize = 80;

pub struct ExecuteParams {
    pub code: String,
    pub timeout: Option<u64>,
    pub background: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutionMeta {
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub duration_ms: u64,
    pub stdout_bytes: usize,
    pub stdout_lines: usize,
    pub stderr_bytes: usize,
    pub stderr_lines: usize,
    pub command_summary: String,
    pub host_calls: Vec<CallRecord>,
}

#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub metadata: ExecutionMeta,
}

/// What `SandboxExecutor::execute` hands back: either the finished run, or
/// (in background mode) the job id a poller can track.
pub enum ExecuteOutcome {
    Completed(ExecuteResult),
    Background { job_id: String, message: String },
}

#[derive(Clone)]
pub struct SandboxExecutor {
    pub compiler: Arc<dyn CompilerBackend>,
    pub authorization: Arc<AuthorizationCore>,
    pub approval: Arc<ApprovalClient>,
    pub session: Arc<Session>,
    pub fs: Arc<AuthorizedFs>,
    pub html_converter: Arc<dyn HtmlConverter>,
    pub summarizer: Arc<dyn Summarizer>,
    pub http_client: reqwest::Client,
    pub stec_home: PathBuf,
}

struct HostState {
    wasi: WasiP1Ctx,
    ctx: Arc<SandboxContext>,
}

fn command_summary(code: &str) -> String {
    let first_line = code.lines().find(|line| !line.trim().is_empty()).unwrap_or("").trim();
    if first_line.chars().count() <= COMMAND_SUMMARY_MAX_LEN {
        first_line.to_string()
    } else {
        let mut truncated: String = first_line.chars().take(COMMAND_SUMMARY_MAX_LEN).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

impl SandboxExecutor {
    pub async fn execute(&self, params: ExecuteParams, cancel: CancellationToken) -> Result<ExecuteOutcome, SandboxRunError> {
        if !params.background {
            return self.run_pipeline(params, cancel).await.map(ExecuteOutcome::Completed);
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let job_cancel = cancel.child_token();
        let job = BackgroundJob {
            id: job_id.clone(),
            command_summary: command_summary(&params.code),
            working_dir: self.session.working_dir().await,
            start_time: SystemTime::now(),
            completed: false,
            exit_code: None,
            stdout_lines: Vec::new(),
            stderr_lines: Vec::new(),
            cancel_handle: job_cancel.clone(),
            done_signal: Arc::new(Notify::new()),
        };
        self.session.insert_background_job(job).await;

        let worker = self.clone();
        let worker_job_id = job_id.clone();
        tokio::spawn(async move {
            let outcome = worker.run_pipeline(params, job_cancel).await;
            let (exit_code, stdout_lines, stderr_lines) = match outcome {
                Ok(result) => (
                    Some(result.exit_code),
                    result.stdout.lines().map(str::to_string).collect(),
                    result.stderr.lines().map(str::to_string).collect(),
                ),
                Err(err) => (Some(-1), Vec::new(), vec![err.to_string()]),
            };
            worker
                .session
                .update_background_job(&worker_job_id, |job| {
                    job.completed = true;
                    job.exit_code = exit_code;
                    job.stdout_lines = stdout_lines;
                    job.stderr_lines = stderr_lines;
                })
                .await;
            if let Some(job) = worker.session.background_job(&worker_job_id).await {
                job.done_signal.notify_waiters();
            }
        });

        Ok(ExecuteOutcome::Background {
            job_id,
            message: "background execution started".to_string(),
        })
    }

    async fn run_pipeline(&self, params: ExecuteParams, cancel: CancellationToken) -> Result<ExecuteResult, SandboxRunError> {
        let started_at = SystemTime::now();
        let requested = params.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS).min(MAX_TIMEOUT_SECS);
        let deadline = Deadline::new(Duration::from_secs(requested), || {});

        let run_dir = tempfile::Builder::new().prefix("sandbox_").tempdir().map_err(SandboxRunError::Io)?;
        let wasm_path = self.compiler.compile(&params.code, run_dir.path()).await?;

        let stdout_path = run_dir.path().join("stdout.txt");
        let stderr_path = run_dir.path().join("stderr.txt");
        tokio::fs::write(&stdout_path, b"").await.map_err(SandboxRunError::Io)?;
        tokio::fs::write(&stderr_path, b"").await.map_err(SandboxRunError::Io)?;

        let tracker = Arc::new(CallTracker::new());
        let ctx = Arc::new(SandboxContext {
            fs: self.fs.clone(),
            session: self.session.clone(),
            authorization: self.authorization.clone(),
            approval: self.approval.clone(),
            deadline: deadline.clone(),
            html_converter: self.html_converter.clone(),
            summarizer: self.summarizer.clone(),
            http_client: self.http_client.clone(),
            stec_home: self.stec_home.clone(),
            workspace_root: self.session.working_dir().await,
            tracker: tracker.clone(),
        });

        let run = self.run_module(wasm_path, &stdout_path, &stderr_path, ctx.clone());

        let outcome = tokio::select! {
            result = run => result,
            _ = deadline.cancellation_token().cancelled() => {
                Err(SandboxRunError::Timeout)
            }
            _ = cancel.cancelled() => {
                Err(SandboxRunError::Cancelled)
            }
        };

        let stdout = tokio::fs::read_to_string(&stdout_path).await.unwrap_or_default();
        let stderr = tokio::fs::read_to_string(&stderr_path).await.unwrap_or_default();

        let (exit_code, stderr, timed_out) = match outcome {
            Ok(exit_code) => (exit_code, stderr, false),
            Err(SandboxRunError::Timeout) => (-1, "Execution timeout".to_string(), true),
            Err(other) => return Err(other),
        };

        let ended_at = SystemTime::now();
        let metadata = ExecutionMeta {
            started_at,
            ended_at,
            duration_ms: ended_at.duration_since(started_at).unwrap_or_default().as_millis() as u64,
            stdout_bytes: stdout.len(),
            stdout_lines: stdout.lines().count(),
            stderr_bytes: stderr.len(),
            stderr_lines: stderr.lines().count(),
            command_summary: command_summary(&params.code),
            host_calls: tracker.records(),
        };

        let result = ExecuteResult { stdout, stderr, exit_code, timed_out, metadata };

        self.session
            .set_last_sandbox_output(stec_core::session::LastSandboxOutput {
                exit_code: result.exit_code,
                stdout: result.stdout.clone(),
                stderr: result.stderr.clone(),
            })
            .await;

        Ok(result)
    }

    async fn run_module(
        &self,
        wasm_path: PathBuf,
        stdout_path: &std::path::Path,
        stderr_path: &std::path::Path,
        ctx: Arc<SandboxContext>,
    ) -> Result<i32, SandboxRunError> {
        let mut config = Config::new();
        config.async_support(true);
        let engine = Engine::new(&config).map_err(SandboxRunError::Wasmtime)?;

        let module = tokio::task::spawn_blocking({
            let engine = engine.clone();
            move || wasmtime::Module::from_file(&engine, &wasm_path)
        })
        .await
        .map_err(|err| SandboxRunError::Runtime(err.to_string()))?
        .map_err(SandboxRunError::Wasmtime)?;

        let stdout_file = wasmtime_wasi::sync::file::File::from_cap_std(
            cap_std::fs::File::from_std(std::fs::File::create(stdout_path).map_err(SandboxRunError::Io)?),
        );
        let stderr_file = wasmtime_wasi::sync::file::File::from_cap_std(
            cap_std::fs::File::from_std(std::fs::File::create(stderr_path).map_err(SandboxRunError::Io)?),
        );

        let wasi = WasiCtxBuilder::new()
            .stdout(Box::new(stdout_file))
            .stderr(Box::new(stderr_file))
            .envs(&std::env::vars().collect::<Vec<_>>())
            .build_p1();

        let mut linker: Linker<HostState> = Linker::new(&engine);
        preview1::add_to_linker_async(&mut linker, |state: &mut HostState| &mut state.wasi)
            .map_err(SandboxRunError::Wasmtime)?;
        register_host_abi(&mut linker).map_err(SandboxRunError::Wasmtime)?;

        let mut store = Store::new(&engine, HostState { wasi, ctx });

        let instance = linker
            .instantiate_async(&mut store, &module)
            .await
            .map_err(SandboxRunError::Wasmtime)?;

        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(SandboxRunError::Wasmtime)?;

        match start.call_async(&mut store, ()).await {
            Ok(()) => Ok(0),
            Err(err) => {
                if let Some(exit) = err.downcast_ref::<wasmtime_wasi::I32Exit>() {
                    Ok(exit.0)
                } else {
                    Err(SandboxRunError::Runtime(err.to_string()))
                }
            }
        }
    }
}

/// Reads a `(ptr, len)` guest buffer into an owned `String`.
fn read_guest_string(memory: &Memory, store: &mut impl AsContextMut, ptr: u32, len: u32) -> anyhow::Result<String> {
    let mut buf = vec![0u8; len as usize];
    memory.read(store, ptr as usize, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Writes `data` into the guest's `(ptr, cap)` buffer, truncating silently
/// on overflow, and returns the number of bytes actually written.
fn write_guest_buffer(memory: &Memory, store: &mut impl AsContextMut, ptr: u32, cap: u32, data: &[u8]) -> anyhow::Result<u32> {
    let written = data.len().min(cap as usize);
    memory.write(store, ptr as usize, &data[..written])?;
    Ok(written as u32)
}

fn register_host_abi(linker: &mut Linker<HostState>) -> anyhow::Result<()> {
    linker.func_wrap_async(
        "env",
        "fetch",
        |mut caller: wasmtime::Caller<'_, HostState>,
         (method_ptr, method_len, url_ptr, url_len, body_ptr, body_len, resp_ptr, resp_cap): (u32, u32, u32, u32, u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let method = read_guest_string(&memory, &mut caller, method_ptr, method_len)?;
                let url = read_guest_string(&memory, &mut caller, url_ptr, url_len)?;
                let mut body = vec![0u8; body_len as usize];
                memory.read(&mut caller, body_ptr as usize, &mut body)?;
                let ctx = caller.data().ctx.clone();
                let (status, response) = host_abi::host_fetch(&ctx, &method, &url, &body).await;
                write_guest_buffer(&memory, &mut caller, resp_ptr, resp_cap, &response)?;
                Ok(status)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "shell",
        |mut caller: wasmtime::Caller<'_, HostState>,
         (argv_ptr, argv_len, stdin_ptr, stdin_len, stdout_ptr, stdout_cap, stderr_ptr, stderr_cap): (u32, u32, u32, u32, u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let argv_json = read_guest_string(&memory, &mut caller, argv_ptr, argv_len)?;
                let stdin = read_guest_string(&memory, &mut caller, stdin_ptr, stdin_len)?;
                let ctx = caller.data().ctx.clone();
                let (exit_code, stdout, stderr) = host_abi::host_shell(&ctx, &argv_json, &stdin).await;
                write_guest_buffer(&memory, &mut caller, stdout_ptr, stdout_cap, &stdout)?;
                write_guest_buffer(&memory, &mut caller, stderr_ptr, stderr_cap, &stderr)?;
                Ok(exit_code)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "summarize",
        |mut caller: wasmtime::Caller<'_, HostState>, (prompt_ptr, prompt_len, text_ptr, text_len, out_ptr, out_cap): (u32, u32, u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let prompt = read_guest_string(&memory, &mut caller, prompt_ptr, prompt_len)?;
                let text = read_guest_string(&memory, &mut caller, text_ptr, text_len)?;
                let ctx = caller.data().ctx.clone();
                match host_abi::host_summarize(&ctx, &prompt, &text).await {
                    Ok(summary) => {
                        write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, summary.as_bytes())?;
                        Ok(host_abi::status::OK)
                    }
                    Err(code) => Ok(code),
                }
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "read_file",
        |mut caller: wasmtime::Caller<'_, HostState>, (path_ptr, path_len, from_line, to_line, out_ptr, out_cap): (u32, u32, i32, i32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let path = read_guest_string(&memory, &mut caller, path_ptr, path_len)?;
                let ctx = caller.data().ctx.clone();
                match host_abi::host_read_file(&ctx, &path, from_line, to_line).await {
                    Ok(content) => {
                        write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, content.as_bytes())?;
                        Ok(host_abi::status::OK)
                    }
                    Err(code) => Ok(code),
                }
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "create_file",
        |mut caller: wasmtime::Caller<'_, HostState>, (path_ptr, path_len, content_ptr, content_len): (u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let path = read_guest_string(&memory, &mut caller, path_ptr, path_len)?;
                let content = read_guest_string(&memory, &mut caller, content_ptr, content_len)?;
                let ctx = caller.data().ctx.clone();
                Ok(host_abi::host_create_file(&ctx, &path, &content).await)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "write_file",
        |mut caller: wasmtime::Caller<'_, HostState>,
         (path_ptr, path_len, append_mode, content_ptr, content_len, out_ptr, out_cap): (u32, u32, i32, u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let path = read_guest_string(&memory, &mut caller, path_ptr, path_len)?;
                let content = read_guest_string(&memory, &mut caller, content_ptr, content_len)?;
                let ctx = caller.data().ctx.clone();
                let (status, message) = host_abi::host_write_file(&ctx, &path, append_mode != 0, &content).await;
                write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, message.as_bytes())?;
                Ok(status)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "mkdir",
        |mut caller: wasmtime::Caller<'_, HostState>, (path_ptr, path_len, recursive, out_ptr, out_cap): (u32, u32, i32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let path = read_guest_string(&memory, &mut caller, path_ptr, path_len)?;
                let ctx = caller.data().ctx.clone();
                let (status, message) = host_abi::host_mkdir(&ctx, &path, recursive != 0).await;
                write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, message.as_bytes())?;
                Ok(status)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "move",
        |mut caller: wasmtime::Caller<'_, HostState>, (src_ptr, src_len, dst_ptr, dst_len, out_ptr, out_cap): (u32, u32, u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let src = read_guest_string(&memory, &mut caller, src_ptr, src_len)?;
                let dst = read_guest_string(&memory, &mut caller, dst_ptr, dst_len)?;
                let ctx = caller.data().ctx.clone();
                let (status, message) = host_abi::host_move(&ctx, &src, &dst).await;
                write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, message.as_bytes())?;
                Ok(status)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "remove_file",
        |mut caller: wasmtime::Caller<'_, HostState>, (path_ptr, path_len, out_ptr, out_cap): (u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let path = read_guest_string(&memory, &mut caller, path_ptr, path_len)?;
                let ctx = caller.data().ctx.clone();
                let (status, message) = host_abi::host_remove_file(&ctx, &path).await;
                write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, message.as_bytes())?;
                Ok(status)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "remove_dir",
        |mut caller: wasmtime::Caller<'_, HostState>, (path_ptr, path_len, recursive, out_ptr, out_cap): (u32, u32, i32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let path = read_guest_string(&memory, &mut caller, path_ptr, path_len)?;
                let ctx = caller.data().ctx.clone();
                let (status, message) = host_abi::host_remove_dir(&ctx, &path, recursive != 0).await;
                write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, message.as_bytes())?;
                Ok(status)
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "list_files",
        |mut caller: wasmtime::Caller<'_, HostState>, (glob_ptr, glob_len, out_ptr, out_cap): (u32, u32, u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(host_abi::status::MEMORY_ERROR),
                };
                let glob_pattern = read_guest_string(&memory, &mut caller, glob_ptr, glob_len)?;
                let ctx = caller.data().ctx.clone();
                match host_abi::host_list_files(&ctx, &glob_pattern).await {
                    Ok(listing) => {
                        write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, listing.as_bytes())?;
                        Ok(host_abi::status::OK)
                    }
                    Err(code) => Ok(code),
                }
            })
        },
    )?;

    linker.func_wrap(
        "env",
        "convert_html",
        |mut caller: wasmtime::Caller<'_, HostState>, (html_ptr, html_len, out_ptr, out_cap): (u32, u32, u32, u32)| -> anyhow::Result<i32> {
            let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                Some(memory) => memory,
                None => return Ok(host_abi::status::MEMORY_ERROR),
            };
            let html = read_guest_string(&memory, &mut caller, html_ptr, html_len)?;
            let ctx = caller.data().ctx.clone();
            let converted = host_abi::host_convert_html(&ctx, &html);
            write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, converted.as_bytes())?;
            Ok(host_abi::status::OK)
        },
    )?;

    linker.func_wrap_async("env", "get_last_exit_code", |caller: wasmtime::Caller<'_, HostState>, ()| {
        Box::new(async move {
            let ctx = caller.data().ctx.clone();
            Ok::<i32, anyhow::Error>(host_abi::host_get_last_exit_code(&ctx).await)
        })
    })?;

    linker.func_wrap_async(
        "env",
        "get_last_stdout",
        |mut caller: wasmtime::Caller<'_, HostState>, (out_ptr, out_cap): (u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(0u32),
                };
                let ctx = caller.data().ctx.clone();
                let stdout = host_abi::host_get_last_stdout(&ctx).await;
                write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, stdout.as_bytes())
            })
        },
    )?;

    linker.func_wrap_async(
        "env",
        "get_last_stderr",
        |mut caller: wasmtime::Caller<'_, HostState>, (out_ptr, out_cap): (u32, u32)| {
            Box::new(async move {
                let memory = match caller.get_export("memory").and_then(|export| export.into_memory()) {
                    Some(memory) => memory,
                    None => return Ok(0u32),
                };
                let ctx = caller.data().ctx.clone();
                let stderr = host_abi::host_get_last_stderr(&ctx).await;
                write_guest_buffer(&memory, &mut caller, out_ptr, out_cap, stderr.as_bytes())
            })
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::collaborators::{NoSummarizer, PassthroughHtmlConverter};
    use crate::compiler::PrecompiledBackend;
    use stec_core::approval::NullSink;
    use stec_core::authorization::judge::NoJudge;
    use stec_core::authorization::secrets::RegexSecretDetector;
    use stec_core::authorization::AuthorizationCore;
    use stec_core::fs::{AuthorizedFs, TokioFilesystem};

    fn make_executor(fixture_wasm: PathBuf, stec_home: PathBuf, workspace: PathBuf) -> SandboxExecutor {
        let session = Arc::new(Session::new(workspace));
        SandboxExecutor {
            compiler: Arc::new(PrecompiledBackend::new(fixture_wasm)),
            authorization: Arc::new(AuthorizationCore::new(
                session.clone(),
                Default::default(),
                Arc::new(NoJudge),
                Arc::new(RegexSecretDetector),
            )),
            approval: Arc::new(ApprovalClient::new(Arc::new(NullSink))),
            fs: Arc::new(AuthorizedFs::new(Arc::new(TokioFilesystem), session.clone())),
            session,
            html_converter: Arc::new(PassthroughHtmlConverter),
            summarizer: Arc::new(NoSummarizer),
            http_client: reqwest::Client::new(),
            stec_home,
        }
    }

    #[tokio::test]
    async fn empty_source_fails_before_any_runtime_setup() {
        let fixture_dir = tempfile::tempdir().unwrap();
        let fixture = fixture_dir.path().join("fixture.wasm");
        std::fs::write(&fixture, b"\0asm").unwrap();
        let stec_home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();

        let executor = make_executor(fixture, stec_home.path().to_path_buf(), workspace.path().to_path_buf());
        let result = executor
            .execute(
                ExecuteParams { code: String::new(), timeout: Some(5), background: false },
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(SandboxRunError::Compile(_))));
    }

    #[tokio::test]
    async fn background_mode_installs_a_job_record_and_returns_immediately() {
        let fixture_dir = tempfile::tempdir().unwrap();
        let fixture = fixture_dir.path().join("fixture.wasm");
        std::fs::write(&fixture, b"\0asm").unwrap();
        let stec_home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();

        let executor = make_executor(fixture, stec_home.path().to_path_buf(), workspace.path().to_path_buf());
        let session = executor.session.clone();
        let result = executor
            .execute(
                ExecuteParams { code: String::new(), timeout: Some(5), background: true },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let job_id = match result {
            ExecuteOutcome::Background { job_id, .. } => job_id,
            ExecuteOutcome::Completed(_) => panic!("expected a background job id"),
        };

        let job = wait_for_completion(&session, &job_id).await;
        assert!(job.completed);
        assert_eq!(job.exit_code, Some(-1));
        assert!(!job.stderr_lines.is_empty());
    }

    async fn wait_for_completion(session: &Session, job_id: &str) -> stec_core::session::BackgroundJob {
        for _ in 0..200 {
            if let Some(job) = session.background_job(job_id).await {
                if job.completed {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background job `{job_id}` never completed");
    }
}

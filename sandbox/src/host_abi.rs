//! The fixed host-function ABI (§6, module `env`). These functions operate
//! on owned buffers; `executor.rs` is the only place that marshals to and
//! from the guest's `(ptr,len)` linear-memory pairs, keeping the policy
//! logic here independent of wasmtime's `Caller`/memory plumbing.

use crate::call_tracker::CallTracker;
use crate::collaborators::HtmlConverter;
use crate::collaborators::Summarizer;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use stec_core::approval::ApprovalClient;
use stec_core::authorization::AuthorizationCore;
use stec_core::deadline::Deadline;
use stec_core::fs::AuthorizedFs;
use stec_core::session::Session;
use stec_protocol::Params;

pub mod status {
    pub const OK: i32 = 0;
    pub const MEMORY_ERROR: i32 = -1;
    pub const NO_CLIENT: i32 = -2;
    pub const CALL_FAILED: i32 = -3;
    pub const CHECK_FAILED: i32 = -3;
    pub const ALREADY_EXISTS: i32 = -4;
    pub const WRITE_FAILED: i32 = -5;
    pub const HTTP_FORBIDDEN: i32 = 403;
    pub const HTTP_BAD_REQUEST: i32 = 400;
    pub const HTTP_INTERNAL_ERROR: i32 = 500;
}

pub struct SandboxContext {
    pub fs: Arc<AuthorizedFs>,
    pub session: Arc<Session>,
    pub authorization: Arc<AuthorizationCore>,
    pub approval: Arc<ApprovalClient>,
    pub deadline: Arc<Deadline>,
    pub html_converter: Arc<dyn HtmlConverter>,
    pub summarizer: Arc<dyn Summarizer>,
    pub http_client: reqwest::Client,
    pub stec_home: PathBuf,
    pub workspace_root: PathBuf,
    pub tracker: Arc<CallTracker>,
}

fn params_of(pairs: &[(&str, serde_json::Value)]) -> Params {
    let mut map = serde_json::Map::new();
    for (key, value) in pairs {
        map.insert(key.to_string(), value.clone());
    }
    Params::new(map)
}

/// `fetch`: the host performs the HTTP call so the guest never needs raw
/// socket access. Returns the HTTP status (200-599), or a 400/403/500 for
/// client/authorization/internal errors.
pub async fn host_fetch(ctx: &SandboxContext, method: &str, url: &str, body: &[u8]) -> (i32, Vec<u8>) {
    ctx.tracker.record("fetch", format!("{method} {url}"));

    let decision = ctx
        .authorization
        .authorize_tool_call("go_sandbox_domain", &params_of(&[("url", json!(url))]))
        .await;

    if !decision.allowed {
        if !decision.requires_user_input {
            return (status::HTTP_FORBIDDEN, decision.reason.into_bytes());
        }
        ctx.deadline.pause().await;
        let outcome = ctx
            .approval
            .request_domain_authorization(url, &decision.reason, &decision.suggested_prefix, &ctx.deadline.cancellation_token())
            .await;
        ctx.deadline.resume(|| {}).await;

        if !outcome.allows_execution() {
            return (status::HTTP_FORBIDDEN, b"domain authorization denied".to_vec());
        }
        ctx.session.authorize_domain(&decision.suggested_prefix).await;
        if let Err(err) = stec_core::config::persist_authorized_domain(&ctx.stec_home, &decision.suggested_prefix).await {
            tracing::warn!(error = %err, "failed to persist authorized domain; continuing for this session");
        }
    }

    match reqwest_fetch(&ctx.http_client, method, url, body).await {
        Ok((status, bytes)) => (status, bytes),
        Err(message) => (status::HTTP_INTERNAL_ERROR, message.into_bytes()),
    }
}

/// The actual HTTP call, kept in one small function so the authorization
/// flow above never has to know about `reqwest` directly.
async fn reqwest_fetch(client: &reqwest::Client, method: &str, url: &str, body: &[u8]) -> Result<(i32, Vec<u8>), String> {
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|err| format!("invalid HTTP method `{method}`: {err}"))?;
    let mut request = client.request(method, url);
    if !body.is_empty() {
        request = request.body(body.to_vec());
    }
    let response = request.send().await.map_err(|err| err.to_string())?;
    let status = response.status().as_u16() as i32;
    let bytes = response.bytes().await.map_err(|err| err.to_string())?;
    Ok((status, bytes.to_vec()))
}

/// `shell`: delegates execution to `stec-core`'s shell executor after an
/// authorization round trip identical in shape to `fetch`'s.
pub async fn host_shell(ctx: &SandboxContext, argv_json: &str, stdin: &str) -> (i32, Vec<u8>, Vec<u8>) {
    let argv: Vec<String> = match serde_json::from_str(argv_json) {
        Ok(argv) => argv,
        Err(_) => return (-1, Vec::new(), b"command argv was not valid JSON".to_vec()),
    };
    if argv.is_empty() {
        return (-1, Vec::new(), b"command must include at least one argument".to_vec());
    }
    let command_line = argv.join(" ");
    ctx.tracker.record("shell", &command_line);

    let decision = ctx
        .authorization
        .authorize_tool_call("command", &params_of(&[("command", json!(command_line))]))
        .await;

    if !decision.allowed {
        if !decision.requires_user_input {
            return (-1, Vec::new(), decision.reason.into_bytes());
        }
        ctx.deadline.pause().await;
        let outcome = ctx
            .approval
            .request_authorization("command", &command_line, &decision.reason, &decision.suggested_prefix, &ctx.deadline.cancellation_token())
            .await;
        ctx.deadline.resume(|| {}).await;

        if !outcome.allows_execution() {
            return (-1, Vec::new(), b"command authorization denied".to_vec());
        }
        ctx.session.authorize_command(&decision.suggested_prefix).await;
        if let Err(err) = stec_core::config::persist_authorized_command(&ctx.stec_home, &decision.suggested_prefix).await {
            tracing::warn!(error = %err, "failed to persist authorized command; continuing for this session");
        }
    }

    let params = stec_core::shell::ExecParams {
        stdin: if stdin.is_empty() { None } else { Some(stdin.to_string()) },
        ..stec_core::shell::ExecParams::new(argv, ctx.workspace_root.clone())
    };

    match stec_core::shell::process_exec_tool_call(
        params,
        stec_core::shell::platform_sandbox(),
        ctx.deadline.cancellation_token(),
    )
    .await
    {
        Ok(output) => {
            ctx.session
                .set_last_sandbox_output(stec_core::session::LastSandboxOutput {
                    exit_code: output.exit_code,
                    stdout: output.stdout.clone(),
                    stderr: output.stderr.clone(),
                })
                .await;
            (output.exit_code, output.stdout.into_bytes(), output.stderr.into_bytes())
        }
        Err(err) => (-1, Vec::new(), err.to_string().into_bytes()),
    }
}

pub async fn host_summarize(ctx: &SandboxContext, prompt: &str, text: &str) -> Result<String, i32> {
    ctx.tracker.record("summarize", prompt);
    match ctx.summarizer.summarize(prompt, text).await {
        Ok(summary) => Ok(summary),
        Err(crate::collaborators::SummarizeError::Unconfigured) => Err(status::NO_CLIENT),
        Err(_) => Err(-3),
    }
}

pub async fn host_read_file(ctx: &SandboxContext, path: &str, from_line: i32, to_line: i32) -> Result<String, i32> {
    ctx.tracker.record("read_file", path);
    let resolved = ctx.workspace_root.join(path);
    let from = from_line.max(0) as usize;
    let to = to_line.max(0) as usize;
    let result = if from == 0 && to == 0 {
        ctx.fs.read_file(&resolved).await
    } else {
        ctx.fs.read_file_lines(&resolved, from, to).await
    };
    result.map_err(|_| -3)
}

pub async fn host_create_file(ctx: &SandboxContext, path: &str, content: &str) -> i32 {
    ctx.tracker.record("create_file", path);
    let resolved = ctx.workspace_root.join(path);
    if ctx.fs.exists(&resolved).await {
        return status::ALREADY_EXISTS;
    }
    match ctx.fs.write_file(&resolved, content).await {
        Ok(()) => status::OK,
        Err(_) => status::WRITE_FAILED,
    }
}

pub async fn host_write_file(ctx: &SandboxContext, path: &str, append: bool, content: &str) -> (i32, String) {
    ctx.tracker.record("write_file", path);
    let resolved = ctx.workspace_root.join(path);

    let content = if append {
        match ctx.fs.read_file(&resolved).await {
            Ok(existing) => format!("{existing}{content}"),
            Err(_) => content.to_string(),
        }
    } else {
        content.to_string()
    };

    match ctx.fs.write_file(&resolved, &content).await {
        Ok(()) => (status::OK, String::new()),
        Err(err) => (-6, err.to_string()),
    }
}

pub async fn host_mkdir(ctx: &SandboxContext, path: &str, _recursive: bool) -> (i32, String) {
    ctx.tracker.record("mkdir", path);
    let resolved = ctx.workspace_root.join(path);
    match ctx.fs.mkdir_all(&resolved).await {
        Ok(()) => (status::OK, String::new()),
        Err(err) => (-5, err.to_string()),
    }
}

pub async fn host_move(ctx: &SandboxContext, src: &str, dst: &str) -> (i32, String) {
    ctx.tracker.record("move", format!("{src} -> {dst}"));
    let src_resolved = ctx.workspace_root.join(src);
    let dst_resolved = ctx.workspace_root.join(dst);
    if dst_resolved.starts_with(&src_resolved) {
        return (-8, "cannot move a directory into itself".to_string());
    }
    match ctx.fs.mv(&src_resolved, &dst_resolved).await {
        Ok(()) => (status::OK, String::new()),
        Err(err) => (-7, err.to_string()),
    }
}

pub async fn host_remove_file(ctx: &SandboxContext, path: &str) -> (i32, String) {
    ctx.tracker.record("remove_file", path);
    let resolved = ctx.workspace_root.join(path);
    match ctx.fs.delete(&resolved).await {
        Ok(()) => (status::OK, String::new()),
        Err(err) => (-1, err.to_string()),
    }
}

pub async fn host_remove_dir(ctx: &SandboxContext, path: &str, _recursive: bool) -> (i32, String) {
    ctx.tracker.record("remove_dir", path);
    let resolved = ctx.workspace_root.join(path);
    match ctx.fs.delete(&resolved).await {
        Ok(()) => (status::OK, String::new()),
        Err(err) => (-1, err.to_string()),
    }
}

pub async fn host_list_files(ctx: &SandboxContext, glob_pattern: &str) -> Result<String, i32> {
    ctx.tracker.record("list_files", glob_pattern);
    let entries = match ctx.fs.list_dir(&ctx.workspace_root).await {
        Ok(entries) => entries,
        Err(_) => return Err(-2),
    };

    let pattern = wildmatch::WildMatch::new(glob_pattern);
    let relative: Vec<String> = entries
        .into_iter()
        .filter_map(|path| path.strip_prefix(&ctx.workspace_root).ok().map(|p| p.display().to_string()))
        .filter(|relative| pattern.matches(relative))
        .collect();
    Ok(relative.join("\n"))
}

pub fn host_convert_html(ctx: &SandboxContext, html: &str) -> String {
    ctx.tracker.record("convert_html", "");
    ctx.html_converter.convert(html)
}

pub async fn host_get_last_exit_code(ctx: &SandboxContext) -> i32 {
    ctx.session.last_sandbox_output().await.map(|output| output.exit_code).unwrap_or(0)
}

pub async fn host_get_last_stdout(ctx: &SandboxContext) -> String {
    ctx.session.last_sandbox_output().await.map(|output| output.stdout).unwrap_or_default()
}

pub async fn host_get_last_stderr(ctx: &SandboxContext) -> String {
    ctx.session.last_sandbox_output().await.map(|output| output.stderr).unwrap_or_default()
}

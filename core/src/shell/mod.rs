//! Shell executor (§4.G): direct or OS-isolated process execution with
//! argv, stdin, and a timeout. Commands are spawned directly (never through
//! a shell interpreter); stdin comes from memory; stdout/stderr are
//! captured in full, then truncated for the caller.

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod seatbelt;

use crate::error::CoreError;
use crate::error::SandboxError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

pub const MAX_STREAM_OUTPUT_BYTES: usize = 10 * 1024;
pub const MAX_STREAM_OUTPUT_LINES: usize = 256;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which OS-level isolation (if any) the command runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxType {
    None,
    LinuxSeccomp,
    MacosSeatbelt,
}

/// The platform's best available sandbox, or `None` if this OS has none
/// implemented.
pub fn platform_sandbox() -> SandboxType {
    if cfg!(target_os = "linux") {
        SandboxType::LinuxSeccomp
    } else if cfg!(target_os = "macos") {
        SandboxType::MacosSeatbelt
    } else {
        SandboxType::None
    }
}

#[derive(Debug, Clone)]
pub struct ExecParams {
    pub command: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
    pub env: HashMap<String, String>,
    pub stdin: Option<String>,
    /// Paths the sandboxed process may write to, beyond `cwd`.
    pub writable_roots: Vec<PathBuf>,
}

impl ExecParams {
    pub fn new(command: Vec<String>, cwd: PathBuf) -> Self {
        Self {
            command,
            cwd,
            timeout: DEFAULT_TIMEOUT,
            env: HashMap::new(),
            stdin: None,
            writable_roots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecToolCallOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

pub async fn process_exec_tool_call(
    params: ExecParams,
    sandbox_type: SandboxType,
    cancel: CancellationToken,
) -> Result<ExecToolCallOutput, CoreError> {
    if params.command.is_empty() {
        return Err(SandboxError::Denied("command must include at least one argument".to_string()).into());
    }

    match sandbox_type {
        SandboxType::None => exec(params, cancel).await,
        #[cfg(target_os = "linux")]
        SandboxType::LinuxSeccomp => linux::exec_linux(params, cancel).await,
        #[cfg(not(target_os = "linux"))]
        SandboxType::LinuxSeccomp => exec(params, cancel).await,
        #[cfg(target_os = "macos")]
        SandboxType::MacosSeatbelt => seatbelt::exec_under_seatbelt(params, cancel).await,
        #[cfg(not(target_os = "macos"))]
        SandboxType::MacosSeatbelt => exec(params, cancel).await,
    }
}

/// Direct, unsandboxed spawn-and-capture. The primitive every sandboxed
/// variant builds on.
pub async fn exec(params: ExecParams, cancel: CancellationToken) -> Result<ExecToolCallOutput, CoreError> {
    let started = std::time::Instant::now();
    let [program, args @ ..] = params.command.as_slice() else {
        unreachable!("checked non-empty above");
    };

    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .current_dir(&params.cwd)
        .envs(&params.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|err| {
        CoreError::Sandbox(SandboxError::Denied(format!("failed to spawn `{program}`: {err}")))
    })?;

    if let Some(stdin_data) = &params.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(stdin_data.as_bytes()).await;
        }
    } else {
        drop(child.stdin.take());
    }

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let stdout_task = tokio::spawn(async move { read_capped(&mut stdout_pipe).await });
    let stderr_task = tokio::spawn(async move { read_capped(&mut stderr_pipe).await });

    let wait = child.wait();
    let timed_out;
    let exit_code;
    tokio::select! {
        status = tokio::time::timeout(params.timeout, wait) => {
            match status {
                Ok(Ok(status)) => {
                    timed_out = false;
                    exit_code = status.code().unwrap_or(-1);
                }
                Ok(Err(err)) => {
                    return Err(CoreError::Sandbox(SandboxError::Denied(err.to_string())));
                }
                Err(_elapsed) => {
                    let _ = child.start_kill();
                    timed_out = true;
                    exit_code = -1;
                }
            }
        }
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            return Err(CoreError::Cancelled);
        }
    }

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(ExecToolCallOutput {
        exit_code,
        stdout,
        stderr,
        duration: started.elapsed(),
        timed_out,
    })
}

async fn read_capped(reader: &mut (impl tokio::io::AsyncRead + Unpin)) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() >= MAX_STREAM_OUTPUT_BYTES * 4 {
                    break;
                }
            }
        }
    }
    truncate_output(&String::from_utf8_lossy(&buf))
}

fn truncate_output(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    let truncated_lines = lines.len() > MAX_STREAM_OUTPUT_LINES;
    if truncated_lines {
        lines.truncate(MAX_STREAM_OUTPUT_LINES);
    }
    let mut joined = lines.join("\n");
    if joined.len() > MAX_STREAM_OUTPUT_BYTES {
        joined.truncate(MAX_STREAM_OUTPUT_BYTES);
        joined.push_str("\n...[truncated]");
    } else if truncated_lines {
        joined.push_str("\n...[truncated]");
    }
    joined
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn exec_captures_stdout_and_exit_code() {
        let params = ExecParams::new(
            vec!["echo".to_string(), "hello".to_string()],
            std::env::temp_dir(),
        );
        let output = exec(params, CancellationToken::new()).await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "hello");
        assert!(!output.timed_out);
    }

    #[tokio::test]
    async fn exec_times_out_long_running_command() {
        let mut params = ExecParams::new(
            vec!["sleep".to_string(), "5".to_string()],
            std::env::temp_dir(),
        );
        params.timeout = Duration::from_millis(50);
        let output = exec(params, CancellationToken::new()).await.unwrap();
        assert!(output.timed_out);
        assert_eq!(output.exit_code, -1);
    }

    #[tokio::test]
    async fn empty_command_is_rejected_before_spawn() {
        let params = ExecParams::new(vec![], std::env::temp_dir());
        let result = process_exec_tool_call(params, SandboxType::None, CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[test]
    fn truncate_output_caps_line_count() {
        let many_lines = (0..300).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let truncated = truncate_output(&many_lines);
        assert!(truncated.contains("truncated"));
    }
}

//! The compiler-invocation seam (§4.H.1): the concrete WASM toolchain (a
//! `rustc --target wasm32-wasip1` binary or equivalent) is shelled out to
//! here, behind the same trait a test double can stand in for.

use crate::error::CompileError;
use async_trait::async_trait;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;

#[async_trait]
pub trait CompilerBackend: Send + Sync {
    async fn compile(&self, source: &str, out_dir: &Path) -> Result<PathBuf, CompileError>;
}

const COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

/// Invokes a `rustc --target wasm32-wasip1` (or TinyGo-equivalent) binary
/// against the submitted source, writing it to a scratch `.rs` file first.
/// This is the production backend; `go_sandbox` calls reach it unless a
/// test wires up [`PrecompiledBackend`] instead.
pub struct RustcWasmBackend {
    compiler_path: PathBuf,
}

impl RustcWasmBackend {
    pub fn new(compiler_path: PathBuf) -> Self {
        Self { compiler_path }
    }
}

impl Default for RustcWasmBackend {
    fn default() -> Self {
        Self::new(PathBuf::from("rustc"))
    }
}

#[async_trait]
impl CompilerBackend for RustcWasmBackend {
    async fn compile(&self, source: &str, out_dir: &Path) -> Result<PathBuf, CompileError> {
        if source.trim().is_empty() {
            return Err(CompileError::EmptySource);
        }

        let source_path = out_dir.join("main.rs");
        tokio::fs::write(&source_path, source)
            .await
            .map_err(|err| CompileError::BackendFailed(err.to_string()))?;

        let destination = out_dir.join("main.wasm");
        let mut command = tokio::process::Command::new(&self.compiler_path);
        command
            .arg("--target")
            .arg("wasm32-wasip1")
            .arg("-O")
            .arg(&source_path)
            .arg("-o")
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|err| CompileError::BackendFailed(format!("failed to spawn `{}`: {err}", self.compiler_path.display())))?;

        let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
        let stdout_task = tokio::spawn(async move { read_all(&mut stdout_pipe).await });
        let stderr_task = tokio::spawn(async move { read_all(&mut stderr_pipe).await });

        let status = match tokio::time::timeout(COMPILE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => return Err(CompileError::BackendFailed(err.to_string())),
            Err(_elapsed) => {
                let _ = child.start_kill();
                return Err(CompileError::BackendFailed("compiler timed out".to_string()));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(CompileError::BackendFailed(if stderr.is_empty() { stdout } else { stderr }));
        }

        Ok(destination)
    }
}

async fn read_all(reader: &mut (impl tokio::io::AsyncRead + Unpin)) -> String {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

/// Test-only double that copies a fixture `.wasm` file in place of
/// invoking a real toolchain. Never wired up for production use.
pub struct PrecompiledBackend {
    fixture_wasm: PathBuf,
}

impl PrecompiledBackend {
    pub fn new(fixture_wasm: PathBuf) -> Self {
        Self { fixture_wasm }
    }
}

#[async_trait]
impl CompilerBackend for PrecompiledBackend {
    async fn compile(&self, source: &str, out_dir: &Path) -> Result<PathBuf, CompileError> {
        if source.trim().is_empty() {
            return Err(CompileError::EmptySource);
        }
        let destination = out_dir.join("main.wasm");
        tokio::fs::copy(&self.fixture_wasm, &destination)
            .await
            .map_err(|err| CompileError::BackendFailed(err.to_string()))?;
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn empty_source_is_rejected_before_touching_the_backend() {
        let backend = PrecompiledBackend::new(PathBuf::from("/nonexistent.wasm"));
        let dir = tempfile::tempdir().unwrap();
        let result = backend.compile("", dir.path()).await;
        assert!(matches!(result, Err(CompileError::EmptySource)));
    }

    #[tokio::test]
    async fn rustc_backend_rejects_empty_source_before_spawning() {
        let backend = RustcWasmBackend::new(PathBuf::from("/nonexistent-rustc"));
        let dir = tempfile::tempdir().unwrap();
        let result = backend.compile("   \n", dir.path()).await;
        assert!(matches!(result, Err(CompileError::EmptySource)));
    }

    #[tokio::test]
    async fn rustc_backend_reports_spawn_failure_for_missing_binary() {
        let backend = RustcWasmBackend::new(PathBuf::from("/nonexistent-rustc-binary"));
        let dir = tempfile::tempdir().unwrap();
        let result = backend.compile("fn main() {}", dir.path()).await;
        assert!(matches!(result, Err(CompileError::BackendFailed(_))));
    }

    #[tokio::test]
    async fn copies_fixture_wasm_into_out_dir() {
        let fixture_dir = tempfile::tempdir().unwrap();
        let fixture = fixture_dir.path().join("fixture.wasm");
        std::fs::write(&fixture, b"\0asm").unwrap();

        let backend = PrecompiledBackend::new(fixture);
        let out_dir = tempfile::tempdir().unwrap();
        let compiled = backend.compile("fn main() {}", out_dir.path()).await.unwrap();
        assert!(compiled.exists());
        assert_eq!(tokio::fs::read(&compiled).await.unwrap(), b"\0asm");
    }
}

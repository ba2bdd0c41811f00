use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxRunError {
    #[error("compilation failed")]
    CompileFailed { stdout: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("execution timeout")]
    Timeout,

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wasmtime(#[from] anyhow::Error),
}

#[derive(Debug, Error, Clone)]
pub enum CompileError {
    #[error("compiler backend failed: {0}")]
    BackendFailed(String),

    #[error("source was empty")]
    EmptySource,
}

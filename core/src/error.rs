use thiserror::Error;

/// Crate-wide error type. Mirrors the teacher's `CodexErr`: one flat enum
/// with `#[from]` transparent conversions for the infrastructure errors that
/// show up at every layer, plus a handful of STEC-specific variants.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("actor {0} is not registered")]
    ActorNotFound(String),

    #[error("actor {0} is already registered")]
    ActorAlreadyRegistered(String),

    #[error("actor {0} mailbox is full")]
    MailboxFull(String),

    #[error("actor {0} has been stopped")]
    ActorStopped(String),

    #[error("sandbox execution error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("operation timed out")]
    Timeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml_edit::TomlError),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("denied: {0}")]
    Denied(String),

    #[cfg(target_os = "linux")]
    #[error("failed to install seccomp filter: {0}")]
    SeccompInstall(String),

    #[cfg(target_os = "linux")]
    #[error(transparent)]
    LandlockRuleset(#[from] landlock::RulesetError),

    #[error("sandboxed process timed out")]
    Timeout,

    #[error("process terminated by signal {0}")]
    Signal(i32),
}

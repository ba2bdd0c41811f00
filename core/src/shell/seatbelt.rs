//! macOS sandboxing via Seatbelt (`sandbox-exec`), following the teacher's
//! `seatbelt.rs`: a generated `.sbpl` policy granting read-only access by
//! default, with write access scoped to declared writable roots, run
//! through the hardcoded system binary only.

use super::ExecParams;
use super::ExecToolCallOutput;
use crate::error::CoreError;
use crate::error::SandboxError;
use tokio_util::sync::CancellationToken;

const SANDBOX_EXEC_PATH: &str = "/usr/bin/sandbox-exec";

const BASE_POLICY: &str = r#"
(version 1)
(deny default)
(allow process-fork)
(allow process-exec)
(allow file-read*)
(allow sysctl-read)
(allow mach-lookup)
"#;

fn render_policy(writable_roots: &[std::path::PathBuf]) -> String {
    let mut policy = BASE_POLICY.to_string();
    if writable_roots.is_empty() {
        return policy;
    }
    policy.push_str("(allow file-write*\n");
    for (index, root) in writable_roots.iter().enumerate() {
        policy.push_str(&format!("  (subpath (param \"WRITABLE_ROOT_{index}\"))\n"));
    }
    policy.push_str(")\n");
    policy
}

pub async fn exec_under_seatbelt(
    params: ExecParams,
    cancel: CancellationToken,
) -> Result<ExecToolCallOutput, CoreError> {
    if !std::path::Path::new(SANDBOX_EXEC_PATH).exists() {
        return Err(SandboxError::Denied(format!("{SANDBOX_EXEC_PATH} is not available")).into());
    }

    let policy = render_policy(&params.writable_roots);
    let mut wrapped = vec![
        SANDBOX_EXEC_PATH.to_string(),
        "-p".to_string(),
        policy,
    ];
    for (index, root) in params.writable_roots.iter().enumerate() {
        wrapped.push("-D".to_string());
        wrapped.push(format!("WRITABLE_ROOT_{index}={}", root.display()));
    }
    wrapped.push("--".to_string());
    wrapped.extend(params.command.iter().cloned());

    let wrapped_params = ExecParams {
        command: wrapped,
        ..params
    };
    super::exec(wrapped_params, cancel).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn policy_without_writable_roots_is_read_only() {
        let policy = render_policy(&[]);
        assert!(!policy.contains("file-write"));
    }

    #[test]
    fn policy_with_writable_roots_parameterizes_each() {
        let policy = render_policy(&[std::path::PathBuf::from("/workspace")]);
        assert!(policy.contains("WRITABLE_ROOT_0"));
    }
}

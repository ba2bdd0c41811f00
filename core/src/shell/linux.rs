//! Linux sandboxing: a Landlock filesystem ruleset plus a seccomp filter
//! denying network syscalls, installed on a dedicated thread (with its own
//! single-threaded runtime) before the command is spawned — mirroring the
//! teacher's `exec_linux`/`linux.rs` split so the restriction applies to
//! the whole process tree the spawned thread owns, not just the parent.

use super::ExecParams;
use super::ExecToolCallOutput;
use crate::error::CoreError;
use crate::error::SandboxError;
use landlock::ABI;
use landlock::Access;
use landlock::AccessFs;
use landlock::CompatLevel;
use landlock::Compatible;
use landlock::RulesetAttr;
use landlock::RulesetCreatedAttr;
use landlock::RulesetStatus;
use seccompiler::BpfProgram;
use seccompiler::SeccompAction;
use seccompiler::SeccompCmpArgLen;
use seccompiler::SeccompCmpOp;
use seccompiler::SeccompCondition;
use seccompiler::SeccompFilter;
use seccompiler::SeccompRule;
use seccompiler::TargetArch;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// System read-only roots every sandboxed command needs for a working
/// toolchain: the standard binary/library locations plus `/etc` for things
/// like DNS resolution and locale data.
const SYSTEM_READ_ONLY_ROOTS: &[&str] = &["/usr", "/bin", "/lib", "/lib64", "/etc"];

pub async fn exec_linux(
    params: ExecParams,
    cancel: CancellationToken,
) -> Result<ExecToolCallOutput, CoreError> {
    // The landlock/seccomp rulesets are installed per-thread and are
    // inherited by anything that thread execs, so we run the whole capture
    // pipeline on a fresh thread with its own single-threaded runtime,
    // matching the teacher's `exec_linux` shape.
    let (result_tx, result_rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = result_tx.send(Err(CoreError::Io(err)));
                return;
            }
        };
        let result = runtime.block_on(async move {
            apply_sandbox_policy_to_current_thread(&params.writable_roots)?;
            super::exec(params, cancel).await
        });
        let _ = result_tx.send(result);
    });

    result_rx.await.map_err(|_| CoreError::Cancelled)?
}

fn apply_sandbox_policy_to_current_thread(writable_roots: &[std::path::PathBuf]) -> Result<(), CoreError> {
    install_filesystem_landlock_rules_on_current_thread(writable_roots)?;
    install_network_seccomp_filter_on_current_thread()?;
    Ok(())
}

fn install_filesystem_landlock_rules_on_current_thread(
    writable_roots: &[std::path::PathBuf],
) -> Result<(), CoreError> {
    let abi = ABI::V5;
    let access_ro = AccessFs::from_read(abi);
    let access_rw = AccessFs::from_all(abi);

    let mut ruleset = landlock::Ruleset::default()
        .set_compatibility(CompatLevel::BestEffort)
        .handle_access(access_rw)
        .map_err(SandboxError::from)?
        .create()
        .map_err(SandboxError::from)?
        .add_rules(landlock::path_beneath_rules(&["/"], access_ro))
        .map_err(SandboxError::from)?
        .add_rules(landlock::path_beneath_rules(&["/dev/null"], access_rw))
        .map_err(SandboxError::from)?;

    for root in SYSTEM_READ_ONLY_ROOTS {
        if std::path::Path::new(root).exists() {
            ruleset = ruleset
                .add_rules(landlock::path_beneath_rules(&[root], access_ro))
                .map_err(SandboxError::from)?;
        }
    }

    for writable in writable_roots {
        if writable.exists() {
            ruleset = ruleset
                .add_rules(landlock::path_beneath_rules(&[writable], access_rw))
                .map_err(SandboxError::from)?;
        }
    }

    let status = ruleset
        .set_no_new_privs(true)
        .restrict_self()
        .map_err(SandboxError::from)?;

    if status.ruleset == RulesetStatus::NotEnforced {
        tracing::warn!("landlock ruleset was not enforced by the running kernel (best-effort mode)");
    }

    Ok(())
}

fn install_network_seccomp_filter_on_current_thread() -> Result<(), CoreError> {
    let mut rules: BTreeMap<i64, Vec<SeccompRule>> = BTreeMap::new();

    let denied_syscalls = [
        libc::SYS_connect,
        libc::SYS_accept,
        libc::SYS_accept4,
        libc::SYS_bind,
        libc::SYS_listen,
        libc::SYS_getpeername,
        libc::SYS_getsockname,
        libc::SYS_shutdown,
        libc::SYS_sendto,
        libc::SYS_sendmsg,
        libc::SYS_sendmmsg,
        libc::SYS_recvfrom,
        libc::SYS_recvmsg,
        libc::SYS_recvmmsg,
        libc::SYS_getsockopt,
        libc::SYS_setsockopt,
        libc::SYS_ptrace,
        libc::SYS_socketpair,
    ];
    for syscall in denied_syscalls {
        rules.insert(syscall, vec![]);
    }

    // AF_UNIX sockets are still needed for local IPC (e.g. a language
    // server over a unix socket); only AF_INET/AF_INET6 are denied.
    rules.insert(
        libc::SYS_socket,
        vec![SeccompRule::new(vec![SeccompCondition::new(
            0,
            SeccompCmpArgLen::Dword,
            SeccompCmpOp::Ne,
            libc::AF_UNIX as u64,
        )
        .map_err(|err| SandboxError::SeccompInstall(err.to_string()))?])
        .map_err(|err| SandboxError::SeccompInstall(err.to_string()))?],
    );

    #[cfg(target_arch = "x86_64")]
    let arch = TargetArch::x86_64;
    #[cfg(target_arch = "aarch64")]
    let arch = TargetArch::aarch64;

    let filter = SeccompFilter::new(
        rules,
        SeccompAction::Allow,
        SeccompAction::Errno(libc::EPERM as u32),
        arch,
    )
    .map_err(|err| SandboxError::SeccompInstall(err.to_string()))?;

    let program: BpfProgram = filter
        .try_into()
        .map_err(|err: seccompiler::Error| SandboxError::SeccompInstall(err.to_string()))?;

    seccompiler::apply_filter(&program).map_err(|err| SandboxError::SeccompInstall(err.to_string()))?;

    Ok(())
}

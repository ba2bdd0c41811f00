//! Sandbox permission model for the shell executor (§4.G). Mirrors the
//! teacher's `protocol.rs::SandboxPolicy`/`SandboxPermission` shape.

use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxPermission {
    DiskFullReadAccess,
    DiskWritePlatformUserTempFolder,
    DiskWritePlatformGlobalTempFolder,
    DiskWriteCwd,
    DiskWriteFolder { folder: PathBuf },
    DiskFullWriteAccess,
    NetworkFullAccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SandboxPolicy {
    permissions: Vec<SandboxPermission>,
}

impl From<Vec<SandboxPermission>> for SandboxPolicy {
    fn from(permissions: Vec<SandboxPermission>) -> Self {
        Self { permissions }
    }
}

impl SandboxPolicy {
    pub fn new_read_only_policy() -> Self {
        Self {
            permissions: vec![SandboxPermission::DiskFullReadAccess],
        }
    }

    pub fn new_read_only_policy_with_writable_roots(writable_roots: &[PathBuf]) -> Self {
        let mut permissions = Self::new_read_only_policy().permissions;
        permissions.extend(
            writable_roots
                .iter()
                .map(|folder| SandboxPermission::DiskWriteFolder {
                    folder: folder.clone(),
                }),
        );
        Self { permissions }
    }

    pub fn new_full_access_policy() -> Self {
        Self {
            permissions: vec![
                SandboxPermission::DiskFullReadAccess,
                SandboxPermission::DiskFullWriteAccess,
                SandboxPermission::NetworkFullAccess,
            ],
        }
    }

    pub fn has_full_disk_read_access(&self) -> bool {
        self.permissions
            .iter()
            .any(|p| matches!(p, SandboxPermission::DiskFullReadAccess))
    }

    pub fn has_full_disk_write_access(&self) -> bool {
        self.permissions
            .iter()
            .any(|p| matches!(p, SandboxPermission::DiskFullWriteAccess))
    }

    pub fn has_full_network_access(&self) -> bool {
        self.permissions
            .iter()
            .any(|p| matches!(p, SandboxPermission::NetworkFullAccess))
    }

    pub fn get_writable_roots_with_cwd(&self, cwd: &Path) -> Vec<PathBuf> {
        let mut writable_roots = Vec::new();
        for perm in &self.permissions {
            use SandboxPermission::*;
            match perm {
                DiskWritePlatformGlobalTempFolder => {
                    if cfg!(unix) {
                        writable_roots.push(PathBuf::from("/tmp"));
                    }
                }
                DiskWritePlatformUserTempFolder => {
                    if let Some(tmpdir) = std::env::var_os("TMPDIR") {
                        writable_roots.push(PathBuf::from(tmpdir));
                    }
                }
                DiskWriteCwd => writable_roots.push(cwd.to_path_buf()),
                DiskWriteFolder { folder } => writable_roots.push(folder.clone()),
                DiskFullReadAccess | NetworkFullAccess | DiskFullWriteAccess => {}
            }
        }
        writable_roots
    }

    pub fn is_unrestricted(&self) -> bool {
        self.has_full_disk_read_access()
            && self.has_full_disk_write_access()
            && self.has_full_network_access()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn read_only_policy_has_no_write_access() {
        let policy = SandboxPolicy::new_read_only_policy();
        assert!(policy.has_full_disk_read_access());
        assert!(!policy.has_full_disk_write_access());
        assert!(!policy.is_unrestricted());
    }

    #[test]
    fn writable_roots_include_cwd_override_and_explicit_folders() {
        let policy = SandboxPolicy::new_read_only_policy_with_writable_roots(&[PathBuf::from(
            "/workspace",
        )]);
        let roots = policy.get_writable_roots_with_cwd(Path::new("/ignored"));
        assert_eq!(roots, vec![PathBuf::from("/workspace")]);
    }

    #[test]
    fn full_access_policy_is_unrestricted() {
        assert!(SandboxPolicy::new_full_access_policy().is_unrestricted());
    }
}

//! Configuration and persisted authorization state (§1.1 ambient stack,
//! §3.1). `$STEC_HOME/config.toml` holds operator-set `AuthorizationOptions`
//! seed values plus two tables — `[authorized_domains]` and
//! `[authorized_commands]` — that record approvals for the lifetime of the
//! installation. Rewrites go through a `toml_edit::DocumentMut`
//! read-modify-write so untouched keys and comments survive, exactly as the
//! teacher's `set_project_trusted` does for its `[projects."..."]` tables.

use crate::error::CoreError;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use stec_protocol::AuthorizationOptions;

pub fn default_stec_home() -> PathBuf {
    std::env::var_os("STEC_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".stec"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub dangerously_allow_all: bool,
    #[serde(default)]
    pub allow_all_network: bool,
    #[serde(default)]
    pub require_sandbox_auth: bool,
    /// Path to the `rustc --target wasm32-wasip1` (or equivalent) binary
    /// the sandbox compiles guest code with. Defaults to `rustc` on `PATH`.
    #[serde(default)]
    pub wasm_compiler_path: Option<PathBuf>,
    #[serde(default)]
    pub authorized_domains: std::collections::BTreeMap<String, bool>,
    #[serde(default)]
    pub authorized_commands: std::collections::BTreeMap<String, bool>,
}

impl ConfigFile {
    pub fn into_authorization_options(self) -> AuthorizationOptions {
        let allowed_domains: HashSet<String> = self
            .authorized_domains
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(domain, _)| domain)
            .collect();
        let allowed_commands: Vec<String> = self
            .authorized_commands
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(command, _)| command)
            .collect();
        AuthorizationOptions {
            dangerously_allow_all: self.dangerously_allow_all,
            allow_all_network: self.allow_all_network,
            allowed_files: HashSet::new(),
            allowed_dirs: Vec::new(),
            allowed_domains,
            allowed_commands,
            require_sandbox_auth: self.require_sandbox_auth,
        }
    }
}

pub async fn load_config(stec_home: &Path) -> Result<ConfigFile, CoreError> {
    let config_path = stec_home.join("config.toml");
    match tokio::fs::read_to_string(&config_path).await {
        Ok(raw) => Ok(toml::from_str(&raw)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(err) => Err(CoreError::Io(err)),
    }
}

/// Persists `domain` as authorized, merging into the existing
/// `[authorized_domains]` table without disturbing the rest of the file.
pub async fn persist_authorized_domain(stec_home: &Path, domain: &str) -> Result<(), CoreError> {
    persist_table_entry(stec_home, "authorized_domains", domain).await
}

/// Persists `command_prefix` as authorized, merging into the existing
/// `[authorized_commands]` table.
pub async fn persist_authorized_command(stec_home: &Path, command_prefix: &str) -> Result<(), CoreError> {
    persist_table_entry(stec_home, "authorized_commands", command_prefix).await
}

async fn persist_table_entry(stec_home: &Path, table_name: &str, key: &str) -> Result<(), CoreError> {
    let stec_home = stec_home.to_path_buf();
    let table_name = table_name.to_string();
    let key = key.to_string();

    tokio::task::spawn_blocking(move || write_table_entry_blocking(&stec_home, &table_name, &key))
        .await
        .map_err(CoreError::JoinError)??;
    Ok(())
}

fn write_table_entry_blocking(stec_home: &Path, table_name: &str, key: &str) -> Result<(), CoreError> {
    std::fs::create_dir_all(stec_home)?;
    let config_path = stec_home.join("config.toml");

    let mut document = match std::fs::read_to_string(&config_path) {
        Ok(raw) => raw.parse::<toml_edit::DocumentMut>().map_err(CoreError::TomlSer)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => toml_edit::DocumentMut::new(),
        Err(err) => return Err(CoreError::Io(err)),
    };

    let mut created_table = false;
    if document.get(table_name).is_none() {
        document[table_name] = toml_edit::Item::Table(toml_edit::Table::new());
        created_table = true;
    }

    let table = document[table_name]
        .as_table_mut()
        .expect("just ensured this is a table");
    if created_table {
        table.set_implicit(false);
    }
    table.insert(key, toml_edit::value(true));

    let tmp_file = tempfile::NamedTempFile::new_in(stec_home)?;
    std::fs::write(tmp_file.path(), document.to_string())?;
    tmp_file.persist(&config_path).map_err(|err| CoreError::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn persisting_a_domain_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        persist_authorized_domain(dir.path(), "example.com").await.unwrap();

        let config = load_config(dir.path()).await.unwrap();
        assert_eq!(config.authorized_domains.get("example.com"), Some(&true));
    }

    #[tokio::test]
    async fn persisting_twice_keeps_both_entries() {
        let dir = tempfile::tempdir().unwrap();
        persist_authorized_command(dir.path(), "git status").await.unwrap();
        persist_authorized_command(dir.path(), "cargo check").await.unwrap();

        let config = load_config(dir.path()).await.unwrap();
        assert_eq!(config.authorized_commands.len(), 2);
    }

    #[tokio::test]
    async fn missing_config_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).await.unwrap();
        assert!(!config.dangerously_allow_all);
    }
}

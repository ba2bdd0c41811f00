use crate::params::Params;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// A single agent-issued tool invocation. `id` is opaque and only used to
/// correlate the eventual `ToolResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub parameters: Params,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: Params) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
        }
    }
}

/// Exactly one of `result`/`error` is ever populated; callers should match
/// on this enum instead of relying on two optional fields staying in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Result(serde_json::Value),
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub ok: ToolOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<String>,
    pub requires_user_input: bool,
    #[serde(default)]
    pub auth_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_metadata: Option<ExecutionMetadata>,
}

impl ToolResult {
    pub fn success(id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            ok: ToolOutcome::Result(value),
            ui: None,
            requires_user_input: false,
            auth_reason: String::new(),
            execution_metadata: None,
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: ToolOutcome::Error(message.into()),
            ui: None,
            requires_user_input: false,
            auth_reason: String::new(),
            execution_metadata: None,
        }
    }

    pub fn requires_user_input(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: ToolOutcome::Error(reason.clone().into()),
            ui: None,
            requires_user_input: true,
            auth_reason: reason.into(),
            execution_metadata: None,
        }
    }

    pub fn with_ui(mut self, ui: impl Into<String>) -> Self {
        self.ui = Some(ui.into());
        self
    }

    pub fn with_metadata(mut self, metadata: ExecutionMetadata) -> Self {
        self.execution_metadata = Some(metadata);
        self
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.ok, ToolOutcome::Result(_))
    }
}

/// Decision returned by the authorization core for a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: String,
    pub requires_user_input: bool,
    /// Canonical key ("domain.example.com" or "git status") that may be
    /// persisted if the user approves.
    pub suggested_prefix: String,
}

impl AuthorizationDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
            requires_user_input: false,
            suggested_prefix: String::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            requires_user_input: false,
            suggested_prefix: String::new(),
        }
    }

    pub fn ask_user(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            requires_user_input: true,
            suggested_prefix: String::new(),
        }
    }
}

/// Process-wide, immutable-after-construction authorization configuration.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationOptions {
    pub dangerously_allow_all: bool,
    pub allow_all_network: bool,
    pub allowed_files: HashSet<PathBuf>,
    pub allowed_dirs: Vec<PathBuf>,
    pub allowed_domains: HashSet<String>,
    pub allowed_commands: Vec<String>,
    pub require_sandbox_auth: bool,
}

impl AuthorizationOptions {
    pub fn is_path_preauthorized(&self, path: &std::path::Path) -> bool {
        if self.allowed_files.contains(path) {
            return true;
        }
        self.allowed_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_result_success_round_trips_through_json() {
        let result = ToolResult::success("id-1", json!({"x": 1}));
        let encoded = serde_json::to_string(&result).expect("serialize");
        let decoded: ToolResult = serde_json::from_str(&encoded).expect("deserialize");
        assert!(decoded.is_ok());
        assert_eq!(decoded.id, "id-1");
    }

    #[test]
    fn is_path_preauthorized_checks_files_then_dirs() {
        let mut opts = AuthorizationOptions::default();
        opts.allowed_files.insert(PathBuf::from("/a/one.txt"));
        opts.allowed_dirs.push(PathBuf::from("/a/safe"));

        assert!(opts.is_path_preauthorized(&PathBuf::from("/a/one.txt")));
        assert!(opts.is_path_preauthorized(&PathBuf::from("/a/safe/two.txt")));
        assert!(!opts.is_path_preauthorized(&PathBuf::from("/a/other.txt")));
    }
}

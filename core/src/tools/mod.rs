//! Tool registry and executor actor (§4.F).

pub mod builtin;
pub mod executor_actor;
pub mod parallel;
pub mod shell_tool;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use stec_protocol::ToolCall;
use stec_protocol::ToolResult;

/// Lifecycle/progress notification emitted around a single call. Most
/// tools only ever produce `Started`/`Ended`; long-running ones (the
/// sandbox, the shell executor) may interleave `Progress` between them.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Started { tool_name: String },
    Progress { tool_name: String, message: String },
    Ended { tool_name: String },
}

pub type ToolEventCallback = Arc<dyn Fn(ToolEvent) + Send + Sync>;

/// Implemented by every dispatch target the registry can hold: direct
/// tools (`read_file`), the shell executor, the WASM sandbox, and the
/// parallel composite.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> ToolResult;

    /// Callback-aware form: notifies `on_event` of tool start/end around
    /// the call. Tools that can report intermediate progress override this
    /// to emit `ToolEvent::Progress` while `execute` would otherwise run
    /// silently; the default just brackets `execute` with start/end.
    async fn execute_with_callbacks(&self, call: &ToolCall, on_event: &ToolEventCallback) -> ToolResult {
        on_event(ToolEvent::Started { tool_name: call.name.clone() });
        let result = self.execute(call).await;
        on_event(ToolEvent::Ended { tool_name: call.name.clone() });
        result
    }

    /// Tools declaring exclusive execution never overlap with each other;
    /// the executor actor serializes them globally.
    fn requires_exclusive_execution(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.executors.insert(name.into(), executor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.get(name).cloned()
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolResult {
        match self.get(&call.name) {
            Some(executor) => executor.execute(&call).await,
            None => ToolResult::error(call.id, format!("no tool registered under `{}`", call.name)),
        }
    }

    pub async fn dispatch_with_callbacks(&self, call: ToolCall, on_event: &ToolEventCallback) -> ToolResult {
        match self.get(&call.name) {
            Some(executor) => executor.execute_with_callbacks(&call, on_event).await,
            None => ToolResult::error(call.id, format!("no tool registered under `{}`", call.name)),
        }
    }
}

/// Per-call observability state, distinct from the final `ToolResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Queued,
    Running,
    CompletedOk,
    CompletedErr,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CallHealth {
    pub state: CallState,
    pub last_heartbeat: std::time::Instant,
}

/// Tracks `{queued, running, completed-ok, completed-err, cancelled}` and
/// heartbeat timestamps for observability across in-flight tool calls.
#[derive(Default)]
pub struct HealthMonitor {
    calls: tokio::sync::Mutex<HashMap<String, CallHealth>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, call_id: &str, state: CallState) {
        let mut calls = self.calls.lock().await;
        calls.insert(
            call_id.to_string(),
            CallHealth {
                state,
                last_heartbeat: std::time::Instant::now(),
            },
        );
    }

    pub async fn heartbeat(&self, call_id: &str) {
        let mut calls = self.calls.lock().await;
        if let Some(health) = calls.get_mut(call_id) {
            health.last_heartbeat = std::time::Instant::now();
        }
    }

    pub async fn get(&self, call_id: &str) -> Option<CallHealth> {
        self.calls.lock().await.get(call_id).cloned()
    }
}

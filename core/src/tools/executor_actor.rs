//! The executor actor: receives `tool_execution` messages, spawns a worker
//! for the call, ticks a heartbeat while it runs, and delivers the result.
//! Tools declaring exclusive execution are globally serialized through a
//! single mutex so no parallel execution shares a file edit.

use super::CallState;
use super::HealthMonitor;
use super::ToolEvent;
use super::ToolEventCallback;
use super::ToolRegistry;
use crate::actor::Actor;
use async_trait::async_trait;
use std::sync::Arc;
use stec_protocol::ToolCall;
use stec_protocol::ToolResult;
use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// A no-op callback used when a caller has no interest in lifecycle events.
fn noop_event_callback() -> ToolEventCallback {
    Arc::new(|_event: ToolEvent| {})
}

pub struct ToolExecution {
    pub call: ToolCall,
    /// Duplicated from `call.name` so the actor can report it in health/log
    /// output without re-reading `call` after it moves into the worker.
    pub tool_name: String,
    /// Whether this call already cleared authorization before being queued;
    /// carried through so the callback-aware executor form can surface it
    /// to `ToolEvent::Started` observers without re-deriving it.
    pub approved: bool,
    pub on_event: ToolEventCallback,
    pub response_chan: oneshot::Sender<ToolResult>,
}

impl ToolExecution {
    pub fn new(call: ToolCall, response_chan: oneshot::Sender<ToolResult>) -> Self {
        Self {
            tool_name: call.name.clone(),
            approved: true,
            on_event: noop_event_callback(),
            call,
            response_chan,
        }
    }
}

pub struct ExecutorActor {
    registry: Arc<ToolRegistry>,
    health: Arc<HealthMonitor>,
    exclusive_lock: Arc<Mutex<()>>,
    heartbeat_interval: std::time::Duration,
}

impl ExecutorActor {
    pub fn new(registry: Arc<ToolRegistry>, health: Arc<HealthMonitor>) -> Self {
        Self {
            registry,
            health,
            exclusive_lock: Arc::new(Mutex::new(())),
            heartbeat_interval: std::time::Duration::from_millis(500),
        }
    }
}

#[async_trait]
impl Actor for ExecutorActor {
    type Message = ToolExecution;

    async fn receive(&mut self, message: ToolExecution) {
        let call_id = message.call.id.clone();
        self.health.set(&call_id, CallState::Queued).await;

        let registry = Arc::clone(&self.registry);
        let health = Arc::clone(&self.health);
        let exclusive_lock = Arc::clone(&self.exclusive_lock);
        let heartbeat_interval = self.heartbeat_interval;

        tokio::spawn(async move {
            let exclusive = registry
                .get(&message.tool_name)
                .map(|executor| executor.requires_exclusive_execution())
                .unwrap_or(false);

            let _guard = if exclusive {
                Some(exclusive_lock.lock().await)
            } else {
                None
            };

            health.set(&call_id, CallState::Running).await;

            let execution = registry.dispatch_with_callbacks(message.call, &message.on_event);
            tokio::pin!(execution);
            let mut ticker = tokio::time::interval(heartbeat_interval);
            ticker.tick().await; // first tick fires immediately; discard

            let result = loop {
                tokio::select! {
                    result = &mut execution => break result,
                    _ = ticker.tick() => {
                        health.heartbeat(&call_id).await;
                        debug!(call_id = %call_id, "tool execution heartbeat");
                    }
                }
            };

            health
                .set(&call_id, if result.is_ok() { CallState::CompletedOk } else { CallState::CompletedErr })
                .await;

            let _ = message.response_chan.send(result);
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::actor::spawn;
    use crate::tools::ToolRegistry;
    use std::sync::Mutex as StdMutex;
    use stec_protocol::Params;

    struct EchoTool;

    #[async_trait]
    impl crate::tools::ToolExecutor for EchoTool {
        async fn execute(&self, call: &ToolCall) -> ToolResult {
            ToolResult::success(&call.id, serde_json::json!({"echoed": call.name}))
        }
    }

    #[tokio::test]
    async fn callback_aware_dispatch_reports_started_then_ended() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", Arc::new(EchoTool));
        let registry = Arc::new(registry);
        let health = Arc::new(HealthMonitor::new());
        let actor_ref = spawn("executor-test", 8, ExecutorActor::new(registry, health));

        let events: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let events_for_cb = events.clone();
        let on_event: ToolEventCallback = Arc::new(move |event| {
            let label = match event {
                ToolEvent::Started { tool_name } => format!("started:{tool_name}"),
                ToolEvent::Progress { tool_name, .. } => format!("progress:{tool_name}"),
                ToolEvent::Ended { tool_name } => format!("ended:{tool_name}"),
            };
            events_for_cb.lock().expect("events mutex poisoned").push(label);
        });

        let (tx, rx) = oneshot::channel();
        let call = ToolCall::new("call-1", "echo", Params::new(serde_json::Map::new()));
        let execution = ToolExecution {
            call,
            tool_name: "echo".to_string(),
            approved: true,
            on_event,
            response_chan: tx,
        };
        actor_ref.send(execution).unwrap();

        let result = rx.await.unwrap();
        assert!(result.is_ok());
        let seen = events.lock().expect("events mutex poisoned").clone();
        assert_eq!(seen, vec!["started:echo".to_string(), "ended:echo".to_string()]);
    }

    #[test]
    fn new_defaults_to_approved_with_a_noop_callback() {
        let (tx, _rx) = oneshot::channel();
        let call = ToolCall::new("call-1", "echo", Params::new(serde_json::Map::new()));
        let execution = ToolExecution::new(call, tx);
        assert!(execution.approved);
        assert_eq!(execution.tool_name, "echo");
    }
}

//! Parallel composite tool: executes an array of `{name, parameters}`
//! entries concurrently through the registry, preserving input order in
//! the output.

use super::ToolExecutor;
use super::ToolRegistry;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use stec_protocol::Params;
use stec_protocol::ToolCall;
use stec_protocol::ToolResult;

pub struct ParallelTool {
    registry: Arc<ToolRegistry>,
}

impl ParallelTool {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolExecutor for ParallelTool {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(entries) = call.parameters.get("tool_calls").and_then(|v| v.as_array()) else {
            return ToolResult::error(&call.id, "missing required parameter `tool_calls`");
        };

        let started = std::time::Instant::now();
        let mut futures = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let name = entry.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let parameters = entry
                .get("parameters")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();
            let registry = Arc::clone(&self.registry);
            let sub_call = ToolCall::new(format!("{}:{index}", call.id), name.clone(), Params::new(parameters));
            futures.push(async move {
                let result = registry.dispatch(sub_call).await;
                (index, name, result)
            });
        }

        let completed = futures::future::join_all(futures).await;
        let mut ordered: Vec<Option<(String, ToolResult)>> = (0..entries.len()).map(|_| None).collect();
        for (index, name, result) in completed {
            ordered[index] = Some((name, result));
        }

        let results: Vec<serde_json::Value> = ordered
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let (name, result) = entry.expect("every index was populated by join_all");
                json!({
                    "index": index,
                    "tool": name,
                    "ok": result.is_ok(),
                    "result": result,
                })
            })
            .collect();

        ToolResult::success(
            &call.id,
            json!({
                "results": results,
                "duration_ms": started.elapsed().as_millis() as u64,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::tools::builtin::ReadLastSandboxOutputTool;
    use crate::session::LastSandboxOutput;
    use crate::session::Session;
    use std::path::PathBuf;

    #[tokio::test]
    async fn results_preserve_input_index_order() {
        let session = Arc::new(Session::new(PathBuf::from("/tmp")));
        session
            .set_last_sandbox_output(LastSandboxOutput { exit_code: 0, stdout: "ok".into(), stderr: String::new() })
            .await;

        let mut registry = ToolRegistry::new();
        registry.register(
            "read_last_sandbox_output",
            Arc::new(ReadLastSandboxOutputTool::new(session)),
        );
        let registry = Arc::new(registry);
        let tool = ParallelTool::new(Arc::clone(&registry));

        let call = ToolCall::new(
            "p1",
            "parallel",
            Params::new(
                json!({
                    "tool_calls": [
                        {"name": "read_last_sandbox_output", "parameters": {}},
                        {"name": "read_last_sandbox_output", "parameters": {}},
                    ]
                })
                .as_object()
                .unwrap()
                .clone(),
            ),
        );

        let result = tool.execute(&call).await;
        assert!(result.is_ok());
        let stec_protocol::tool_call::ToolOutcome::Result(value) = result.ok else {
            panic!("expected success");
        };
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["index"], 0);
        assert_eq!(results[1]["index"], 1);
    }
}

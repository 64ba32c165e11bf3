//! Tool runner - registry and invoker
//!
//! The registry is filled once at startup and only read afterwards, so a
//! single runner is shared behind an `Arc` by every conversation.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::agent::{ToolInvocationRequest, ToolResult};
use crate::config::Config;
use super::{Tool, ToolDefinition, ToolError, ToolErrorKind};
use super::time::TimeTool;
use super::weather::WeatherTool;

/// Tool runner manages registered tools and executes them
pub struct ToolRunner {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, so descriptors are advertised deterministically
    order: Vec<String>,
}

impl ToolRunner {
    /// Create an empty tool runner
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create a tool runner with the weather and time tools
    pub fn new_with_defaults(config: &Config) -> crate::Result<Self> {
        let mut runner = Self::new();
        runner.register(WeatherTool::from_config(config)?);
        runner.register(TimeTool::new(&config.default_timezone));
        Ok(runner)
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    /// Get tool definitions for the decision source
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Invoke one request. Never fails: unknown tools, tool errors and
    /// panics all come back as error payloads keyed by the request's id.
    pub async fn invoke(&self, request: &ToolInvocationRequest) -> ToolResult {
        let Some(tool) = self.tools.get(&request.name) else {
            warn!("Unknown tool requested: {}", request.name);
            return ToolResult::error(&request.id, ToolError::tool_not_found(&request.name));
        };

        debug!("Executing tool: {} with input: {}", request.name, request.input);

        let outcome = AssertUnwindSafe(tool.execute(request.input.clone()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(payload)) => {
                debug!("Tool {} succeeded", request.name);
                ToolResult::success(&request.id, payload)
            }
            Ok(Err(err)) => {
                debug!("Tool {} failed: {}", request.name, err);
                ToolResult::error(&request.id, err)
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!("Tool {} panicked: {}", request.name, detail);
                let message = format!("Tool {} failed: {detail}", request.name);
                ToolResult::error(&request.id, ToolError::new(ToolErrorKind::InternalError, message))
            }
        }
    }

    /// Invoke every request of one round concurrently; results come back in
    /// request order.
    pub async fn invoke_all(&self, requests: &[ToolInvocationRequest]) -> Vec<ToolResult> {
        join_all(requests.iter().map(|request| self.invoke(request))).await
    }

    /// List registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolContent;
    use crate::tools::testing::{EchoTool, FailingTool, PanickingTool};
    use serde_json::json;

    #[tokio::test]
    async fn test_tool_runner_register_and_invoke() {
        let mut runner = ToolRunner::new();
        runner.register(EchoTool);
        assert_eq!(runner.tool_names(), vec!["Echo_Tool"]);

        let request = ToolInvocationRequest::new("Echo_Tool", json!({"x": 1}));
        let result = runner.invoke(&request).await;

        assert_eq!(result.tool_use_id, request.id);
        assert_eq!(result.payload(), json!({"echo": {"x": 1}}));
    }

    #[tokio::test]
    async fn test_tool_runner_unknown_tool() {
        let runner = ToolRunner::new();
        let request = ToolInvocationRequest::new("Nope_Tool", json!({}));
        let result = runner.invoke(&request).await;

        assert_eq!(result.tool_use_id, request.id);
        match result.content {
            ToolContent::Error(err) => {
                assert_eq!(err.kind, ToolErrorKind::ToolNotFound);
                assert!(err.message.contains("Nope_Tool"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tool_errors_become_payloads() {
        let mut runner = ToolRunner::new();
        runner.register(FailingTool(ToolErrorKind::InvalidInput));
        runner.register(PanickingTool);

        let failing = runner.invoke(&ToolInvocationRequest::new("Failing_Tool", json!({}))).await;
        assert_eq!(failing.payload()["error"], "invalid_input");

        let panicking = runner.invoke(&ToolInvocationRequest::new("Panicking_Tool", json!({}))).await;
        assert_eq!(panicking.payload()["error"], "internal_error");
        assert!(panicking.payload()["message"].as_str().unwrap().contains("capability blew up"));
    }

    #[tokio::test]
    async fn test_invoke_all_preserves_order() {
        let mut runner = ToolRunner::new();
        runner.register(EchoTool);
        runner.register(FailingTool(ToolErrorKind::NotFound));

        let requests = vec![
            ToolInvocationRequest::new("Failing_Tool", json!({})),
            ToolInvocationRequest::new("Echo_Tool", json!({"n": 2})),
            ToolInvocationRequest::new("Missing_Tool", json!({})),
        ];
        let results = runner.invoke_all(&requests).await;

        assert_eq!(results.len(), 3);
        for (request, result) in requests.iter().zip(&results) {
            assert_eq!(request.id, result.tool_use_id);
        }
        assert_eq!(results[0].payload()["error"], "not_found");
        assert_eq!(results[1].payload(), json!({"echo": {"n": 2}}));
        assert_eq!(results[2].payload()["error"], "tool_not_found");
    }

    #[test]
    fn test_default_registry_descriptors() {
        let runner = ToolRunner::new_with_defaults(&Config::default()).unwrap();
        let names: Vec<String> = runner.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Weather_Tool", "Time_Tool"]);
    }
}

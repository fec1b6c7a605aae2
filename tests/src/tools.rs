use agentkit_core::error::AgentResult;
use agentkit_core::tool::{Tool, ToolParameter};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A mock tool that records every call and returns a stubbed result,
/// for asserting an agent invoked a tool the expected number of times
/// with the expected arguments.
pub struct MockTool {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
    stubbed_result: Arc<RwLock<String>>,
    call_history: Arc<RwLock<Vec<Value>>>,
}

impl MockTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Vec<ToolParameter>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            stubbed_result: Arc::new(RwLock::new("mock execution default".to_string())),
            call_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_result(&self, result: impl Into<String>) {
        *self.stubbed_result.write().await = result.into();
    }

    pub async fn history(&self) -> Vec<Value> {
        self.call_history.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.call_history.read().await.len()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    async fn execute(&self, arguments: Value) -> AgentResult<String> {
        self.call_history.write().await.push(arguments);
        Ok(self.stubbed_result.read().await.clone())
    }
}

/// Asserts `$tool` was called exactly `$expected_count` times.
#[macro_export]
macro_rules! assert_tool_called {
    ($tool:expr, $expected_count:expr) => {
        let count = $tool.call_count().await;
        assert_eq!(
            count, $expected_count,
            "expected tool '{}' to be called {} times, was called {} times",
            $tool.name(),
            $expected_count,
            count
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_call_history_and_returns_stubbed_result() {
        let tool = MockTool::new("calculator", "adds two numbers", vec![]);
        assert_eq!(tool.call_count().await, 0);

        tool.set_result("42").await;
        let output = tool.execute(json!({"a": 1, "b": 2})).await.unwrap();

        assert_eq!(output, "42");
        assert_eq!(tool.call_count().await, 1);
        assert_eq!(tool.history().await.len(), 1);
        assert_tool_called!(tool, 1);
    }
}

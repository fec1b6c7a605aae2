//! Tool definitions and the registry that catalogs them.

use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One parameter a tool accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A tool's static metadata and dynamic handler.
///
/// Implementors provide `name`/`description`/`parameters` plus an `execute`
/// handler of shape `(arguments) -> (text, error)`. The handler receives
/// already-unmarshaled JSON arguments with no guarantee on numeric precision.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> &[ToolParameter];

    /// Invoke the tool's handler with `arguments` (already validated for
    /// required-parameter presence by the registry).
    async fn execute(&self, arguments: Value) -> AgentResult<String>;

    /// The `{type:"function", function:{...}}` schema emitted to providers.
    fn to_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in self.parameters() {
            let mut prop = json!({
                "type": param.type_tag,
                "description": param.description,
            });
            if let Some(enum_values) = &param.enum_values {
                prop["enum"] = json!(enum_values);
            }
            if let Some(default) = &param.default {
                prop["default"] = default.clone();
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(param.name.clone());
            }
        }
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}

/// Capability catalog: register/upsert/get/list tools, emit their schemas,
/// and dispatch `Execute` with required-parameter validation.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool`. Fails with `AlreadyExists` if the name is taken.
    pub async fn register(&self, tool: Arc<dyn Tool>) -> AgentResult<()> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(AgentError::invalid_input("tool name must not be empty"));
        }
        let mut tools = self.tools.write().await;
        if tools.contains_key(&name) {
            return Err(AgentError::already_exists(format!("tool '{name}'")));
        }
        tools.insert(name, tool);
        Ok(())
    }

    /// Register `tool`, replacing any existing tool of the same name.
    pub async fn upsert(&self, tool: Arc<dyn Tool>) -> AgentResult<()> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(AgentError::invalid_input("tool name must not be empty"));
        }
        self.tools.write().await.insert(name, tool);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> AgentResult<Arc<dyn Tool>> {
        self.tools
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::not_found(format!("tool '{name}'")))
    }

    pub async fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.read().await.values().cloned().collect()
    }

    pub async fn to_schemas(&self) -> Vec<Value> {
        self.tools
            .read()
            .await
            .values()
            .map(|t| t.to_schema())
            .collect()
    }

    /// Get the tool, validate required parameters are present, then invoke
    /// its handler. Missing required parameters fail without invoking the
    /// handler; unknown extra parameters pass through untouched.
    pub async fn execute(&self, name: &str, arguments: Value) -> AgentResult<String> {
        let tool = self.get(name).await?;
        let obj = arguments.as_object();
        for param in tool.parameters() {
            if param.required {
                let present = obj.map(|o| o.contains_key(&param.name)).unwrap_or(false);
                if !present {
                    return Err(AgentError::invalid_input(format!(
                        "missing required parameter '{}' for tool '{}'",
                        param.name, name
                    )));
                }
            }
        }
        tool.execute(arguments).await
    }
}

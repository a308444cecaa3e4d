//! Tool abstraction
//!
//! A [`Tool`] declares its name, description and input schema up front and
//! executes asynchronously on JSON arguments. A [`ToolInstance`] is a tool
//! bound to the arguments the model selected for it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::core::{Result, ToolCallRecord, ToolOutput};

/// Static description of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name within a registry
    pub name: String,
    /// What the tool does, shown to the model
    pub description: String,
    /// JSON Schema of the tool's arguments
    pub input_schema: Value,
}

/// An executable, self-describing tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema of the arguments object
    fn input_schema(&self) -> Value;

    /// Run the tool on validated arguments
    ///
    /// Errors are reported back to the model as failed output, they never
    /// abort the agent run.
    async fn call(&self, args: &Value) -> Result<String>;

    /// Definition of this tool
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A tool bound to concrete arguments
#[derive(Clone)]
pub struct ToolInstance {
    tool: Arc<dyn Tool>,
    arguments: Value,
}

impl ToolInstance {
    /// Bind a tool to arguments
    pub fn new(tool: Arc<dyn Tool>, arguments: Value) -> Self {
        Self { tool, arguments }
    }

    /// Name of the bound tool
    pub fn name(&self) -> &str {
        self.tool.name()
    }

    /// Bound arguments
    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Descriptive record of this call
    pub fn record(&self) -> ToolCallRecord {
        ToolCallRecord {
            name: self.tool.name().to_string(),
            description: self.tool.description().to_string(),
            params: self.arguments.clone(),
        }
    }

    /// Execute the tool, turning any error into a failed output
    pub async fn execute(&self) -> ToolOutput {
        let record = self.record();
        match self.tool.call(&self.arguments).await {
            Ok(output) => ToolOutput::success(record, output),
            Err(e) => {
                warn!(tool = %record.name, "Tool failed: {}", e);
                ToolOutput::failure(record, e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInstance")
            .field("tool", &self.tool.name())
            .field("arguments", &self.arguments)
            .finish()
    }
}

//! Tool registry - the closed set of tools known to a run
//!
//! Registers tools under unique names and derives the selection schema the
//! tool selector hands to structured extraction: an object whose
//! `tool_calls` array holds zero or more `{tool, arguments}` entries, one
//! `oneOf` variant per registered tool. With no tools the array must be empty.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Result, StepwiseError};
use crate::llm::ResponseSchema;
use crate::tools::{Tool, ToolDefinition, ToolInstance};

/// Name of the selection schema
pub const SELECTION_SCHEMA: &str = "tool_selection";

/// One entry of a validated selection
#[derive(Debug, Deserialize)]
struct SelectedCall {
    tool: String,
    #[serde(default)]
    arguments: Value,
}

/// Shape of a validated selection
#[derive(Debug, Deserialize)]
struct Selection {
    tool_calls: Vec<SelectedCall>,
}

/// Ordered, name-unique set of tools
#[derive(Clone)]
pub struct ToolRegistry {
    /// Tools in registration order
    tools: Vec<Arc<dyn Tool>>,
    /// Position of each tool by name
    index: HashMap<String, usize>,
    /// Selection schema, built once
    selection: ResponseSchema,
}

impl ToolRegistry {
    /// Create a registry, failing if two tools share a name
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), i).is_some() {
                return Err(StepwiseError::RegistryConflict(tool.name().to_string()));
            }
        }

        let selection = build_selection_schema(&tools);
        Ok(Self {
            tools,
            index,
            selection,
        })
    }

    /// A registry with no tools
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            selection: build_selection_schema(&[]),
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Definitions of all tools in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Selection schema derived at construction
    pub fn selection_schema(&self) -> &ResponseSchema {
        &self.selection
    }

    /// Derive the selection schema again from the registered tools
    pub fn build_selection_schema(&self) -> ResponseSchema {
        build_selection_schema(&self.tools)
    }

    /// Bind a selection validated against [`Self::selection_schema`]
    pub fn bind_selection(&self, selection: Value) -> Result<Vec<ToolInstance>> {
        let selection: Selection = serde_json::from_value(selection)
            .map_err(|e| StepwiseError::extraction(SELECTION_SCHEMA, 1, e.to_string()))?;

        selection
            .tool_calls
            .into_iter()
            .map(|call| {
                let tool = self.get(&call.tool).ok_or_else(|| {
                    StepwiseError::extraction(
                        SELECTION_SCHEMA,
                        1,
                        format!("unknown tool `{}`", call.tool),
                    )
                })?;
                Ok(ToolInstance::new(Arc::clone(tool), call.arguments))
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

fn build_selection_schema(tools: &[Arc<dyn Tool>]) -> ResponseSchema {
    let variants: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "type": "object",
                "description": tool.description(),
                "properties": {
                    "tool": {"const": tool.name()},
                    "arguments": tool.input_schema()
                },
                "required": ["tool", "arguments"],
                "additionalProperties": false
            })
        })
        .collect();

    let mut tool_calls = json!({
        "type": "array",
        "description": "Tools to call next, in order. Leave empty when no tool is needed."
    });
    if variants.is_empty() {
        tool_calls["maxItems"] = json!(0);
    } else {
        tool_calls["items"] = json!({"oneOf": variants});
    }

    ResponseSchema::new(
        SELECTION_SCHEMA,
        "The tools (zero or more) to call next and their arguments",
        json!({
            "type": "object",
            "properties": {"tool_calls": tool_calls},
            "required": ["tool_calls"],
            "additionalProperties": false
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::{math_tools, AddTool};

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ToolRegistry::new(vec![Arc::new(AddTool), Arc::new(AddTool)]);
        assert!(matches!(result, Err(StepwiseError::RegistryConflict(name)) if name == "add"));
    }

    #[test]
    fn test_registration_order() {
        let registry = ToolRegistry::new(math_tools()).unwrap();
        assert_eq!(registry.names(), vec!["add", "multiply", "divide"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("multiply").is_some());
        assert!(registry.get("subtract").is_none());
    }

    #[test]
    fn test_selection_schema_accepts_valid_calls() {
        let registry = ToolRegistry::new(math_tools()).unwrap();
        let schema = registry.selection_schema();

        let valid = json!({"tool_calls": [
            {"tool": "add", "arguments": {"a": 2, "b": 3}},
            {"tool": "multiply", "arguments": {"a": 5, "b": 4}}
        ]});
        assert!(schema.validate(&valid).is_ok());
        assert!(schema.validate(&json!({"tool_calls": []})).is_ok());

        let unknown = json!({"tool_calls": [{"tool": "pow", "arguments": {"a": 2, "b": 3}}]});
        assert!(schema.validate(&unknown).is_err());

        let bad_args = json!({"tool_calls": [{"tool": "add", "arguments": {"a": "two", "b": 3}}]});
        assert!(schema.validate(&bad_args).is_err());
    }

    #[test]
    fn test_empty_registry_allows_no_calls() {
        let registry = ToolRegistry::empty();
        let schema = registry.selection_schema();
        assert!(schema.validate(&json!({"tool_calls": []})).is_ok());
        assert!(schema
            .validate(&json!({"tool_calls": [{"tool": "add", "arguments": {}}]}))
            .is_err());
        assert_eq!(schema.schema()["properties"]["tool_calls"]["maxItems"], json!(0));
    }

    #[test]
    fn test_rebuilt_schema_matches() {
        let registry = ToolRegistry::new(math_tools()).unwrap();
        assert_eq!(&registry.build_selection_schema(), registry.selection_schema());
    }

    #[test]
    fn test_bind_selection() {
        let registry = ToolRegistry::new(math_tools()).unwrap();
        let instances = registry
            .bind_selection(json!({"tool_calls": [
                {"tool": "multiply", "arguments": {"a": 5, "b": 4}},
                {"tool": "add", "arguments": {"a": 2, "b": 3}}
            ]}))
            .unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].name(), "multiply");
        assert_eq!(instances[1].arguments(), &json!({"a": 2, "b": 3}));
    }

    #[test]
    fn test_bind_unknown_tool_fails() {
        let registry = ToolRegistry::empty();
        let result = registry.bind_selection(json!({"tool_calls": [{"tool": "add", "arguments": {}}]}));
        assert!(matches!(result, Err(StepwiseError::Extraction { .. })));
    }
}

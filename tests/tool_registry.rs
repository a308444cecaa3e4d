//! Tool registry and executor tests
//!
//! Exercises custom tools through the public API: name uniqueness, the
//! derived selection schema and failure isolation during execution.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use stepwise::core::{Result, StepwiseError};
use stepwise::tools::builtin::{math_tools, AddTool};
use stepwise::tools::{Tool, ToolExecutor, ToolRegistry};

/// Looks up a city's country from a fixed table
struct CountryOf;

#[async_trait]
impl Tool for CountryOf {
    fn name(&self) -> &str {
        "country_of"
    }

    fn description(&self) -> &str {
        "Return the country a city is in"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: &Value) -> Result<String> {
        match args["city"].as_str() {
            Some("Paris") => Ok("France".to_string()),
            Some("Nairobi") => Ok("Kenya".to_string()),
            Some(other) => Err(StepwiseError::tool(format!("unknown city: {}", other))),
            None => Err(StepwiseError::tool("missing city")),
        }
    }
}

/// Panics on every call
struct Unstable;

#[async_trait]
impl Tool for Unstable {
    fn name(&self) -> &str {
        "unstable"
    }

    fn description(&self) -> &str {
        "Crashes"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, _args: &Value) -> Result<String> {
        panic!("index out of bounds");
    }
}

#[test]
fn test_duplicate_names_fail_before_any_run() {
    let mut tools = math_tools();
    tools.push(Arc::new(AddTool));

    match ToolRegistry::new(tools) {
        Err(StepwiseError::RegistryConflict(name)) => assert_eq!(name, "add"),
        other => panic!("expected a registry conflict, got {:?}", other.map(|r| r.names().len())),
    }
}

#[test]
fn test_selection_schema_has_one_variant_per_tool() {
    let mut tools = math_tools();
    tools.push(Arc::new(CountryOf));
    let registry = ToolRegistry::new(tools).unwrap();

    let schema = registry.selection_schema().schema();
    let variants = schema["properties"]["tool_calls"]["items"]["oneOf"]
        .as_array()
        .unwrap();
    let names: Vec<&str> = variants
        .iter()
        .map(|v| v["properties"]["tool"]["const"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["add", "multiply", "divide", "country_of"]);

    let selection = json!({"tool_calls": [
        {"tool": "country_of", "arguments": {"city": "Paris"}},
        {"tool": "add", "arguments": {"a": 1, "b": 2}}
    ]});
    assert!(registry.selection_schema().validate(&selection).is_ok());

    let wrong_args = json!({"tool_calls": [{"tool": "country_of", "arguments": {"a": 1, "b": 2}}]});
    assert!(registry.selection_schema().validate(&wrong_args).is_err());
}

#[tokio::test]
async fn test_one_failure_does_not_affect_the_others() {
    let registry = ToolRegistry::new(vec![
        Arc::new(CountryOf),
        Arc::new(Unstable),
        Arc::new(AddTool),
    ])
    .unwrap();

    let selected = registry
        .bind_selection(json!({"tool_calls": [
            {"tool": "country_of", "arguments": {"city": "Nairobi"}},
            {"tool": "unstable", "arguments": {}},
            {"tool": "country_of", "arguments": {"city": "Atlantis"}},
            {"tool": "add", "arguments": {"a": 40, "b": 2}}
        ]}))
        .unwrap();

    let outputs = ToolExecutor::new().execute_all(selected).await;

    let summary: Vec<(&str, bool)> = outputs.iter().map(|o| (o.name.as_str(), o.failed)).collect();
    assert_eq!(
        summary,
        vec![("country_of", false), ("unstable", true), ("country_of", true), ("add", false)]
    );
    assert_eq!(outputs[0].output, "Kenya");
    assert!(outputs[1].error.as_deref().unwrap().contains("index out of bounds"));
    assert!(outputs[2].error.as_deref().unwrap().contains("Atlantis"));
    assert_eq!(outputs[3].output, "42");
    assert_eq!(outputs[3].params, json!({"a": 40, "b": 2}));
}

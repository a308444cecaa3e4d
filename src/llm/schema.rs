//! Response schemas for structured extraction
//!
//! A [`ResponseSchema`] is the structural type descriptor handed to
//! [`CompletionClient::extract`](crate::llm::CompletionClient::extract).
//! It carries a JSON Schema document, compiled once with `jsonschema`, and
//! validates model output against it.

use jsonschema::Validator;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Named JSON Schema describing a structured response
#[derive(Clone)]
pub struct ResponseSchema {
    /// Short identifier, e.g. `tool_selection`
    pub name: String,
    /// What the model should produce
    pub description: String,
    /// JSON Schema document
    schema: Value,
    /// Compiled validator, or why the document did not compile
    validator: std::result::Result<Arc<Validator>, String>,
}

/// Types that can be requested from the model as structured output
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Schema the model output must satisfy
    fn response_schema() -> ResponseSchema;
}

impl ResponseSchema {
    /// Create a new schema, compiling its validator
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        let validator = Validator::new(&schema)
            .map(Arc::new)
            .map_err(|e| format!("invalid schema: {}", e));

        Self {
            name: name.into(),
            description: description.into(),
            schema,
            validator,
        }
    }

    /// The JSON Schema document
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate a value against this schema
    ///
    /// Returns a message naming the JSON path of the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let validator = self.validator.as_ref().map_err(Clone::clone)?;
        match validator.iter_errors(value).next() {
            None => Ok(()),
            Some(error) => Err(format!("{}: {}", json_path(&error.instance_path.to_string()), error)),
        }
    }

    /// Prompt asking the model to answer with a JSON block matching the schema
    pub fn instructions(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.schema)
            .unwrap_or_else(|_| self.schema.to_string());
        format!(
            "Respond with `{}`: {}\n\n\
             Answer ONLY with a JSON object inside a ```json code block. \
             The object must be valid against this JSON Schema:\n\n```json\n{}\n```",
            self.name, self.description, schema
        )
    }
}

impl PartialEq for ResponseSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.description == other.description && self.schema == other.schema
    }
}

impl std::fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSchema")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish()
    }
}

/// `/tool_calls/0/tool` -> `$.tool_calls.0.tool`
fn json_path(pointer: &str) -> String {
    format!("${}", pointer.replace('/', "."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair_schema() -> ResponseSchema {
        ResponseSchema::new(
            "pair",
            "Two integers",
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer"},
                    "b": {"type": "integer", "minimum": 0}
                },
                "required": ["a", "b"],
                "additionalProperties": false
            }),
        )
    }

    #[test]
    fn test_valid_object() {
        assert!(pair_schema().validate(&json!({"a": 1, "b": 2})).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let err = pair_schema().validate(&json!({"a": 1})).unwrap_err();
        assert!(err.starts_with("$:"));
        assert!(err.contains("\"b\" is a required property"));
    }

    #[test]
    fn test_type_mismatch_reports_path() {
        let err = pair_schema().validate(&json!({"a": "one", "b": 2})).unwrap_err();
        assert!(err.starts_with("$.a"));
    }

    #[test]
    fn test_closed_object_rejects_extra_fields() {
        let err = pair_schema()
            .validate(&json!({"a": 1, "b": 2, "c": 3}))
            .unwrap_err();
        assert!(err.contains("'c' was unexpected"));
    }

    #[test]
    fn test_minimum() {
        assert!(pair_schema().validate(&json!({"a": 1, "b": -1})).is_err());
    }

    #[test]
    fn test_one_of_selects_single_variant() {
        let schema = ResponseSchema::new(
            "choice",
            "",
            json!({
                "type": "array",
                "items": {"oneOf": [
                    {"type": "object", "properties": {"tool": {"const": "add"}}, "required": ["tool"]},
                    {"type": "object", "properties": {"tool": {"const": "multiply"}}, "required": ["tool"]}
                ]}
            }),
        );
        assert!(schema.validate(&json!([{"tool": "add"}, {"tool": "multiply"}])).is_ok());
        assert!(schema.validate(&json!([{"tool": "divide"}])).is_err());
    }

    #[test]
    fn test_keywords_beyond_the_emitted_subset() {
        let schema = ResponseSchema::new(
            "city",
            "",
            json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "pattern": "^[A-Z]{3}$"},
                    "name": {"type": "string", "minLength": 1}
                },
                "anyOf": [{"required": ["code"]}, {"required": ["name"]}]
            }),
        );
        assert!(schema.validate(&json!({"code": "NBO"})).is_ok());
        assert!(schema.validate(&json!({"code": "nbo"})).unwrap_err().starts_with("$.code"));
        assert!(schema.validate(&json!({"name": ""})).is_err());
        assert!(schema.validate(&json!({})).is_err());
    }

    #[test]
    fn test_invalid_schema_rejects_every_value() {
        let schema = ResponseSchema::new("broken", "", json!({"type": 12}));
        let err = schema.validate(&json!({})).unwrap_err();
        assert!(err.starts_with("invalid schema"));
    }

    #[test]
    fn test_instructions_embed_schema() {
        let text = pair_schema().instructions();
        assert!(text.contains("```json"));
        assert!(text.contains("\"required\""));
    }
}

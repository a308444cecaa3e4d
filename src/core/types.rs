//! Shared types used across Stepwise modules
//!
//! Contains message structures, tool output records and the agent event model.

use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Descriptive record of a selected tool, as shown to callers and the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the selected tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// Bound arguments
    pub params: serde_json::Value,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.params)
    }
}

/// Result of executing one selected tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Name of the tool that was executed
    pub name: String,
    /// Description of the tool
    pub description: String,
    /// Arguments the tool was bound to
    pub params: serde_json::Value,
    /// Output from the tool (empty when it failed)
    pub output: String,
    /// Whether the execution failed
    pub failed: bool,
    /// Failure message, present when `failed` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    /// Create a successful output
    pub fn success(record: ToolCallRecord, output: impl Into<String>) -> Self {
        Self {
            name: record.name,
            description: record.description,
            params: record.params,
            output: output.into(),
            failed: false,
            error: None,
        }
    }

    /// Create a failed output
    pub fn failure(record: ToolCallRecord, error: impl Into<String>) -> Self {
        Self {
            name: record.name,
            description: record.description,
            params: record.params,
            output: String::new(),
            failed: true,
            error: Some(error.into()),
        }
    }

    /// Text this output contributes to the conversation
    pub fn context_text(&self) -> &str {
        match (&self.error, self.failed) {
            (Some(error), true) => error,
            _ => &self.output,
        }
    }
}

/// Outcome of a termination evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Whether the run should stop
    pub is_final: bool,
    /// Score given by the model, when a score policy is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

/// Kind of an agent event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ToolCall,
    ToolOutput,
    MessageStream,
    Message,
    Evaluation,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::ToolCall => write!(f, "tool_call"),
            EventKind::ToolOutput => write!(f, "tool_output"),
            EventKind::MessageStream => write!(f, "message_stream"),
            EventKind::Message => write!(f, "message"),
            EventKind::Evaluation => write!(f, "evaluation"),
        }
    }
}

/// Typed payload of an agent event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum EventPayload {
    ToolCall(ToolCallRecord),
    ToolOutput(ToolOutput),
    MessageStream(String),
    Message(String),
    Evaluation(Evaluation),
}

/// One unit of the agent loop's output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Step the event belongs to (1-based)
    pub step: usize,
    /// Stable id of the logical unit; shared by a message's stream fragments
    /// and its final message event
    pub id: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Create an event with a fresh id
    pub fn new(step: usize, payload: EventPayload) -> Self {
        Self::with_id(step, new_event_id(), payload)
    }

    /// Create an event with a given id
    pub fn with_id(step: usize, id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            step,
            id: id.into(),
            payload,
        }
    }

    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::ToolCall(_) => EventKind::ToolCall,
            EventPayload::ToolOutput(_) => EventKind::ToolOutput,
            EventPayload::MessageStream(_) => EventKind::MessageStream,
            EventPayload::Message(_) => EventKind::Message,
            EventPayload::Evaluation(_) => EventKind::Evaluation,
        }
    }

    /// Text carried by `message_stream` and `message` events
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::MessageStream(text) | EventPayload::Message(text) => Some(text),
            _ => None,
        }
    }
}

/// Generate a new event id
pub fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ToolCallRecord {
        ToolCallRecord {
            name: "add".to_string(),
            description: "Add two numbers".to_string(),
            params: serde_json::json!({"a": 2, "b": 3}),
        }
    }

    #[test]
    fn test_role_serialization() {
        let msg = Message::assistant("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_failed_output_contributes_error() {
        let failed = ToolOutput::failure(record(), "boom");
        assert!(failed.failed);
        assert_eq!(failed.context_text(), "boom");

        let ok = ToolOutput::success(record(), "5");
        assert_eq!(ok.context_text(), "5");
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::with_id(1, "abc", EventPayload::MessageStream("Hel".to_string()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["step"], 1);
        assert_eq!(json["id"], "abc");
        assert_eq!(json["type"], "message_stream");
        assert_eq!(json["content"], "Hel");
        assert_eq!(event.kind(), EventKind::MessageStream);
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::new(1, EventPayload::Message(String::new()));
        let b = Event::new(1, EventPayload::Message(String::new()));
        assert_ne!(a.id, b.id);
    }
}

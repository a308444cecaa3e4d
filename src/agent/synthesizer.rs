//! Response synthesis
//!
//! Produces the assistant response for the current step as a stream of text
//! fragments. In [`SynthesisMode::Structured`] the model answers with a
//! `{"response": ...}` object and the fragments are the newly grown suffix
//! of `response` between successive partial parses.

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::agent::Conversation;
use crate::core::{Message, Result};
use crate::llm::{CompletionClient, PartialStream, ResponseSchema, StructuredOutput, TextStream};

/// Name of the structured synthesis schema
pub const RESPONSE_SCHEMA: &str = "synthesized_response";

/// How the response text is obtained from the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// Plain streamed completion
    #[default]
    Text,
    /// Streamed structured extraction of a `response` field
    Structured,
}

/// Structured synthesis result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SynthesizedResponse {
    pub response: String,
}

impl StructuredOutput for SynthesizedResponse {
    fn response_schema() -> ResponseSchema {
        ResponseSchema::new(
            RESPONSE_SCHEMA,
            "Synthesized response",
            json!({
                "type": "object",
                "properties": {
                    "response": {
                        "type": "string",
                        "description": "Response to be sent to the user"
                    }
                },
                "required": ["response"]
            }),
        )
    }
}

/// Writes the assistant response for a step
#[derive(Clone)]
pub struct Synthesizer {
    client: Arc<dyn CompletionClient>,
    mode: SynthesisMode,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn CompletionClient>, mode: SynthesisMode) -> Self {
        Self { client, mode }
    }

    pub fn mode(&self) -> SynthesisMode {
        self.mode
    }

    /// Stream the response as non-empty text fragments
    pub async fn synthesize_stream(&self, messages: &[Message]) -> Result<TextStream> {
        match self.mode {
            SynthesisMode::Text => self.client.stream(messages).await,
            SynthesisMode::Structured => {
                let schema = SynthesizedResponse::response_schema();
                let partials = self.client.extract_stream(messages, &schema).await?;
                Ok(response_deltas(partials))
            }
        }
    }

    /// Append the drained response to the conversation
    pub fn finish(&self, conversation: &mut Conversation, text: impl Into<String>) {
        conversation.push_assistant(text);
    }

    /// Stream, drain and append in one call
    pub async fn synthesize(&self, conversation: &mut Conversation) -> Result<String> {
        let mut fragments = self.synthesize_stream(conversation.messages()).await?;
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
        }
        self.finish(conversation, text.clone());
        Ok(text)
    }
}

/// Turn partial `{"response": ...}` values into text deltas
fn response_deltas(mut partials: PartialStream) -> TextStream {
    Box::pin(stream! {
        let mut emitted = String::new();

        while let Some(partial) = partials.next().await {
            let value = match partial {
                Ok(value) => value,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let Some(text) = value.get("response").and_then(Value::as_str) else {
                continue;
            };

            match text.strip_prefix(emitted.as_str()) {
                Some("") => {}
                Some(suffix) => {
                    yield Ok(suffix.to_string());
                    emitted = text.to_string();
                }
                None => warn!("Partial response no longer extends the streamed text, ignoring it"),
            }
        }
    })
}

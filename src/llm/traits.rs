//! Completion client trait for abstracting different backends
//!
//! Everything the agent needs from a model goes through [`CompletionClient`]:
//! plain and streamed completions, plus schema-constrained extraction.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;

use crate::core::{Message, Result, StepwiseError};
use crate::llm::schema::{ResponseSchema, StructuredOutput};

/// Incremental text deltas of one completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Progressively more complete parses of one structured response
pub type PartialStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Options for a single generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// Trait for completion backends
///
/// Implementations never mutate the caller's message slice. Streams are
/// lazy and finite; dropping one early releases the underlying request.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a full response
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Generate a response as a stream of non-empty text deltas
    async fn stream(&self, messages: &[Message]) -> Result<TextStream>;

    /// Generate a response that validates against `schema`
    ///
    /// Invalid answers are retried up to the client's configured bound before
    /// an [`StepwiseError::Extraction`] is returned.
    async fn extract(&self, messages: &[Message], schema: &ResponseSchema) -> Result<Value>;

    /// Generate a structured response as a stream of partial values
    ///
    /// The last item is the complete value, validated against `schema`.
    async fn extract_stream(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<PartialStream>;

    /// Get the client name
    fn name(&self) -> &str;
}

/// Typed helpers on top of [`CompletionClient`]
#[async_trait]
pub trait CompletionClientExt: CompletionClient {
    /// Extract and deserialize a [`StructuredOutput`]
    async fn extract_as<T: StructuredOutput>(&self, messages: &[Message]) -> Result<T> {
        let schema = T::response_schema();
        let value = self.extract(messages, &schema).await?;
        serde_json::from_value(value)
            .map_err(|e| StepwiseError::extraction(&schema.name, 1, e.to_string()))
    }

    /// Drain a completion stream into the full text
    async fn stream_to_string(&self, messages: &[Message]) -> Result<String> {
        let mut stream = self.stream(messages).await?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl<C: CompletionClient + ?Sized> CompletionClientExt for C {}

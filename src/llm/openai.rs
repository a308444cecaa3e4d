//! OpenAI-compatible client implementation
//!
//! Async HTTP client for `/chat/completions` endpoints (OpenAI, Together,
//! Ollama's `/v1`, vLLM, ...) with streaming and structured extraction.

use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{Config, Message, Result, StepwiseError};
use crate::llm::partial::{extract_json_block, parse_partial};
use crate::llm::schema::ResponseSchema;
use crate::llm::traits::{CompletionClient, GenerateOptions, PartialStream, TextStream};

/// Longest request/response body echoed into debug logs
const LOG_PREVIEW_CHARS: usize = 500;

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    options: GenerateOptions,
    extraction_temperature: f32,
    max_retries: u32,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/// Chat completion response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One server-sent event of a streaming response
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl OpenAiClient {
    /// Create a client for the chat model from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.completions_url(),
            api_key: config.api.api_key.clone(),
            model: config.models.chat.clone(),
            options: GenerateOptions {
                temperature: config.models.temperature,
                max_tokens: None,
            },
            extraction_temperature: config.extraction.temperature,
            max_retries: config.extraction.max_retries.max(1),
        })
    }

    /// Same connection, different model
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    /// Model this client talks to
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a request and check the status
    async fn send(&self, messages: &[Message], temperature: Option<f32>, stream: bool) -> Result<reqwest::Response> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens: self.options.max_tokens,
            stream,
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            let request_json = serde_json::to_string(&request)?;
            debug!(model = %self.model, stream, "Request: {}", preview(&request_json));
        }

        let mut builder = self.client.post(&self.url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                StepwiseError::upstream(format!("Cannot connect to {}: {}", self.url, e))
            } else if e.is_timeout() {
                StepwiseError::upstream(format!("Request to {} timed out", self.url))
            } else {
                StepwiseError::upstream(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StepwiseError::upstream(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Non-streaming call returning the message content
    async fn chat(&self, messages: &[Message], temperature: Option<f32>) -> Result<String> {
        let response = self.send(messages, temperature, false).await?;
        let response_text = response
            .text()
            .await
            .map_err(|e| StepwiseError::upstream(format!("Failed to read response: {}", e)))?;
        debug!("Response: {}", preview(&response_text));

        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| StepwiseError::upstream(format!("Failed to parse response: {}", e)))?;

        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Streaming call yielding content deltas
    async fn open_stream(&self, messages: &[Message], temperature: Option<f32>) -> Result<TextStream> {
        let response = self.send(messages, temperature, true).await?;
        Ok(sse_text_stream(response.bytes_stream()))
    }

    /// Private copy of the history with the schema instructions appended
    fn extraction_messages(messages: &[Message], schema: &ResponseSchema) -> Vec<Message> {
        let mut request = messages.to_vec();
        request.push(Message::user(schema.instructions()));
        request
    }
}

/// What one line of an SSE body carries
#[derive(Debug, PartialEq)]
enum SseLine {
    /// Content deltas, possibly none
    Deltas(Vec<String>),
    /// `data: [DONE]`
    Done,
}

fn parse_sse_line(line: &str) -> SseLine {
    let data = match line.trim().strip_prefix("data:") {
        Some(data) => data.trim(),
        None => return SseLine::Deltas(Vec::new()),
    };
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => SseLine::Deltas(
            chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content.filter(|c| !c.is_empty()))
                .collect(),
        ),
        Err(e) => {
            debug!("Skipping unparsable stream line: {}: {}", e, preview(data));
            SseLine::Deltas(Vec::new())
        }
    }
}

/// Decode an SSE body into text deltas
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across network chunks decode intact.
fn sse_text_stream<S, B, E>(body: S) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(StepwiseError::upstream(format!("Stream error: {}", e)));
                    return;
                }
            };
            buffer.extend_from_slice(chunk.as_ref());

            // Process complete lines from buffer
            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    SseLine::Done => return,
                    SseLine::Deltas(deltas) => {
                        for delta in deltas {
                            yield Ok(delta);
                        }
                    }
                }
            }
        }

        // Body ended without a trailing newline
        if let SseLine::Deltas(deltas) = parse_sse_line(&String::from_utf8_lossy(&buffer)) {
            for delta in deltas {
                yield Ok(delta);
            }
        }
    })
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self {
            client: Client::new(),
            url: Config::default().completions_url(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            options: GenerateOptions::default(),
            extraction_temperature: 0.0,
            max_retries: 3,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.chat(messages, self.options.temperature).await
    }

    async fn stream(&self, messages: &[Message]) -> Result<TextStream> {
        self.open_stream(messages, self.options.temperature).await
    }

    async fn extract(&self, messages: &[Message], schema: &ResponseSchema) -> Result<Value> {
        let temperature = Some(self.extraction_temperature);
        extract_with_retries(messages, schema, self.max_retries, |request| async move {
            self.chat(&request, temperature).await
        })
        .await
    }

    async fn extract_stream(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<PartialStream> {
        let request = Self::extraction_messages(messages, schema);
        let text = self
            .open_stream(&request, Some(self.extraction_temperature))
            .await?;
        Ok(partial_values(text, schema.clone()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Ask for a schema-valid answer up to `max_retries` times
///
/// Each attempt sends `answer` the full request so far. A rejected answer
/// is appended to the request together with the validation message. The
/// caller's `messages` are never touched.
pub(crate) async fn extract_with_retries<F, Fut>(
    messages: &[Message],
    schema: &ResponseSchema,
    max_retries: u32,
    mut answer: F,
) -> Result<Value>
where
    F: FnMut(Vec<Message>) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let max_retries = max_retries.max(1);
    let mut request = OpenAiClient::extraction_messages(messages, schema);
    let mut reason = String::new();

    for attempt in 1..=max_retries {
        let reply = answer(request.clone()).await?;

        match parse_validated(&reply, schema) {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    schema = %schema.name,
                    attempt,
                    max = max_retries,
                    "Structured output rejected: {}",
                    e
                );
                request.push(Message::assistant(reply));
                request.push(Message::user(format!(
                    "That answer was invalid: {}. Reply again with only the corrected JSON block.",
                    e
                )));
                reason = e;
            }
        }
    }

    Err(StepwiseError::extraction(&schema.name, max_retries, reason))
}

/// Parse the JSON block of a complete answer and validate it
fn parse_validated(answer: &str, schema: &ResponseSchema) -> std::result::Result<Value, String> {
    serde_json::from_str::<Value>(extract_json_block(answer))
        .map_err(|e| format!("not valid JSON: {}", e))
        .and_then(|value| schema.validate(&value).map(|_| value))
}

/// Turn a stream of JSON text deltas into partial values
///
/// A partial is held back until a different one supersedes it, so the final
/// item is always the complete, validated value.
pub(crate) fn partial_values(mut text: TextStream, schema: ResponseSchema) -> PartialStream {
    Box::pin(stream! {
        let mut raw = String::new();
        let mut pending: Option<Value> = None;

        while let Some(delta) = text.next().await {
            match delta {
                Ok(delta) => raw.push_str(&delta),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
            if let Some(value) = parse_partial(extract_json_block(&raw)) {
                if pending.as_ref() != Some(&value) {
                    if let Some(previous) = pending.replace(value) {
                        yield Ok(previous);
                    }
                }
            }
        }

        yield parse_validated(&raw, &schema)
            .map_err(|reason| StepwiseError::extraction(&schema.name, 1, reason));
    })
}

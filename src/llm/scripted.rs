//! Scripted completion client
//!
//! A deterministic [`CompletionClient`] that replays queued answers and
//! records every call. Used by the test suites and for offline demos.

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::core::{Message, Result, StepwiseError};
use crate::llm::openai::partial_values;
use crate::llm::schema::ResponseSchema;
use crate::llm::traits::{CompletionClient, PartialStream, TextStream};

/// Size of the text deltas used to replay a structured answer
const REPLAY_CHUNK_CHARS: usize = 7;

/// Kind of a recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Complete,
    Stream,
    /// Extraction, with the schema name
    Extract(String),
    /// Streaming extraction, with the schema name
    ExtractStream(String),
}

/// A call made against the scripted client
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    /// Snapshot of the messages passed in
    pub messages: Vec<Message>,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<std::result::Result<Vec<String>, String>>,
    values: HashMap<String, VecDeque<std::result::Result<Value, String>>>,
    fallbacks: HashMap<String, Value>,
    calls: Vec<RecordedCall>,
}

/// Completion client replaying scripted answers
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
}

impl ScriptedClient {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a text answer for `complete` or `stream`
    pub fn push_reply(&self, text: impl Into<String>) -> &Self {
        self.script().replies.push_back(Ok(vec![text.into()]));
        self
    }

    /// Queue a streamed answer made of the given fragments
    pub fn push_stream<I, S>(&self, fragments: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.script().replies.push_back(Ok(fragments));
        self
    }

    /// Make the next text call fail with an upstream error
    pub fn fail_reply(&self, reason: impl Into<String>) -> &Self {
        self.script().replies.push_back(Err(reason.into()));
        self
    }

    /// Queue a structured answer for the schema named `schema`
    pub fn push_value(&self, schema: &str, value: Value) -> &Self {
        self.script()
            .values
            .entry(schema.to_string())
            .or_default()
            .push_back(Ok(value));
        self
    }

    /// Make the next extraction of `schema` fail
    pub fn fail_value(&self, schema: &str, reason: impl Into<String>) -> &Self {
        self.script()
            .values
            .entry(schema.to_string())
            .or_default()
            .push_back(Err(reason.into()));
        self
    }

    /// Answer used for `schema` once its queue is empty
    pub fn fallback_value(&self, schema: &str, value: Value) -> &Self {
        self.script().fallbacks.insert(schema.to_string(), value);
        self
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script().calls.clone()
    }

    /// Number of calls of a given kind
    pub fn count(&self, kind: &CallKind) -> usize {
        self.script().calls.iter().filter(|c| &c.kind == kind).count()
    }

    /// Number of extractions (streaming or not) of a schema
    pub fn extractions_of(&self, schema: &str) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| match &c.kind {
                CallKind::Extract(name) | CallKind::ExtractStream(name) => name == schema,
                _ => false,
            })
            .count()
    }

    fn record(&self, kind: CallKind, messages: &[Message]) {
        self.script().calls.push(RecordedCall {
            kind,
            messages: messages.to_vec(),
        });
    }

    fn next_reply(&self) -> Result<Vec<String>> {
        match self.script().replies.pop_front() {
            Some(Ok(fragments)) => Ok(fragments),
            Some(Err(reason)) => Err(StepwiseError::upstream(reason)),
            None => Err(StepwiseError::upstream("scripted client has no reply queued")),
        }
    }

    fn next_value(&self, schema: &ResponseSchema) -> Result<Value> {
        let mut script = self.script();
        let queued = script
            .values
            .get_mut(&schema.name)
            .and_then(VecDeque::pop_front);

        let value = match queued {
            Some(Ok(value)) => value,
            Some(Err(reason)) => return Err(StepwiseError::extraction(&schema.name, 1, reason)),
            None => match script.fallbacks.get(&schema.name) {
                Some(value) => value.clone(),
                None => {
                    return Err(StepwiseError::extraction(
                        &schema.name,
                        1,
                        "scripted client has no value queued",
                    ))
                }
            },
        };

        schema
            .validate(&value)
            .map_err(|e| StepwiseError::extraction(&schema.name, 1, e))?;
        Ok(value)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.record(CallKind::Complete, messages);
        Ok(self.next_reply()?.concat())
    }

    async fn stream(&self, messages: &[Message]) -> Result<TextStream> {
        self.record(CallKind::Stream, messages);
        let fragments: Vec<Result<String>> = self
            .next_reply()?
            .into_iter()
            .filter(|f| !f.is_empty())
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }

    async fn extract(&self, messages: &[Message], schema: &ResponseSchema) -> Result<Value> {
        self.record(CallKind::Extract(schema.name.clone()), messages);
        self.next_value(schema)
    }

    async fn extract_stream(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<PartialStream> {
        self.record(CallKind::ExtractStream(schema.name.clone()), messages);
        let raw = serde_json::to_string(&self.next_value(schema)?)?;

        // Replay the answer the way a model would stream it
        let chars: Vec<char> = raw.chars().collect();
        let deltas: Vec<Result<String>> = chars
            .chunks(REPLAY_CHUNK_CHARS)
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect();

        Ok(partial_values(
            Box::pin(stream::iter(deltas)),
            schema.clone(),
        ))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

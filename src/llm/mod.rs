//! LLM module - completion backends
//!
//! Provides the [`CompletionClient`] abstraction, an OpenAI-compatible HTTP
//! client and a scripted client for deterministic runs.

pub mod openai;
pub mod partial;
pub mod schema;
pub mod scripted;
pub mod traits;

pub use openai::OpenAiClient;
pub use partial::{extract_json_block, parse_partial};
pub use schema::{ResponseSchema, StructuredOutput};
pub use scripted::{CallKind, RecordedCall, ScriptedClient};
pub use traits::{CompletionClient, CompletionClientExt, GenerateOptions, PartialStream, TextStream};

//! Stepwise - a step-bounded, tool-using agent loop
//!
//! Drives an OpenAI-compatible completion API through a fixed cycle:
//! select tools with structured extraction, run them concurrently,
//! stream a response, and ask whether the answer is final. The run is
//! exposed as a lazy stream of typed events.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Completion client abstraction, OpenAI-compatible and scripted clients
//! - **Tools**: Tool trait, registry with selection schema, concurrent executor
//! - **Agent**: Selector, synthesizer, evaluator and the loop that sequences them
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use stepwise::agent::AgentLoop;
//! use stepwise::core::{Config, Message};
//! use stepwise::llm::OpenAiClient;
//! use stepwise::tools::{builtin::math_tools, ToolRegistry};
//!
//! #[tokio::main]
//! async fn main() -> stepwise::Result<()> {
//!     let client = OpenAiClient::from_config(&Config::load())?;
//!     let agent_loop = AgentLoop::builder(Arc::new(client))
//!         .registry(ToolRegistry::new(math_tools())?)
//!         .max_steps(3)
//!         .build()?;
//!
//!     let mut run = agent_loop.run(vec![Message::user("What is 2+3 then multiply by 4?")]);
//!     while let Some(event) = run.next().await {
//!         println!("{:?}", event?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use self::agent::{Agent, AgentLoop, AgentRun};
pub use self::cli::Repl;
pub use self::core::{Config, Event, Result, StepwiseError};

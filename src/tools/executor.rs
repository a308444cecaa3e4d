//! Concurrent tool execution
//!
//! Fans selected tools out over a `JoinSet` and gathers their outputs back
//! in selection order. A panicking tool is reported as a failed output.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::agent::Conversation;
use crate::core::ToolOutput;
use crate::tools::ToolInstance;

/// Runs selected tools concurrently
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolExecutor;

impl ToolExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute all tools, returning outputs in the same order as `selected`
    pub async fn execute_all(&self, selected: Vec<ToolInstance>) -> Vec<ToolOutput> {
        if selected.is_empty() {
            return Vec::new();
        }

        let records: Vec<_> = selected.iter().map(ToolInstance::record).collect();
        let mut outputs: Vec<Option<ToolOutput>> = vec![None; selected.len()];
        let mut set = JoinSet::new();

        for (index, instance) in selected.into_iter().enumerate() {
            debug!(tool = %instance.name(), index, "Starting tool");
            set.spawn(async move {
                let result = AssertUnwindSafe(async move { instance.execute().await })
                    .catch_unwind()
                    .await;
                (index, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(output))) => outputs[index] = Some(output),
                Ok((index, Err(panic))) => {
                    let message = panic_message(panic.as_ref());
                    warn!(tool = %records[index].name, "Tool panicked: {}", message);
                    outputs[index] = Some(ToolOutput::failure(
                        records[index].clone(),
                        format!("tool panicked: {}", message),
                    ));
                }
                Err(e) => warn!("Tool task did not complete: {}", e),
            }
        }

        outputs
            .into_iter()
            .zip(records)
            .map(|(output, record)| {
                output.unwrap_or_else(|| ToolOutput::failure(record, "tool task was cancelled"))
            })
            .collect()
    }

    /// Append the tool outputs to the conversation as one assistant message
    ///
    /// Nothing is appended when there are no outputs.
    pub fn append_to(&self, conversation: &mut Conversation, outputs: &[ToolOutput]) {
        if outputs.is_empty() {
            return;
        }
        let text = outputs
            .iter()
            .map(ToolOutput::context_text)
            .collect::<Vec<_>>()
            .join("\n");
        conversation.push_assistant(text);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Tool selection through structured extraction

use std::sync::Arc;
use tracing::debug;

use crate::agent::Conversation;
use crate::core::Result;
use crate::llm::CompletionClient;
use crate::tools::{ToolInstance, ToolRegistry};

/// Asks the model which tools to call next
#[derive(Clone)]
pub struct ToolSelector {
    client: Arc<dyn CompletionClient>,
}

impl ToolSelector {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Select zero or more tools for the current conversation
    ///
    /// A non-empty selection is recorded in the conversation as one
    /// assistant message. Extraction failures propagate.
    pub async fn select(
        &self,
        conversation: &mut Conversation,
        registry: &ToolRegistry,
    ) -> Result<Vec<ToolInstance>> {
        if registry.is_empty() {
            debug!("No tools registered, skipping selection");
            return Ok(Vec::new());
        }

        let selection = self
            .client
            .extract(conversation.messages(), registry.selection_schema())
            .await?;
        let selected = registry.bind_selection(selection)?;

        debug!(count = selected.len(), "Tools selected");
        if !selected.is_empty() {
            conversation.push_assistant(describe_selection(&selected));
        }
        Ok(selected)
    }
}

/// Human-readable record of a selection
pub fn describe_selection(selected: &[ToolInstance]) -> String {
    let calls: Vec<String> = selected.iter().map(|t| t.record().to_string()).collect();
    format!("I will call these tools:\n{}", calls.join("\n"))
}

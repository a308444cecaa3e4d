//! Agent orchestrator
//!
//! Multi-turn wrapper around [`AgentLoop`]: keeps the conversation across
//! user turns and rebuilds the loop when the configuration changes.

use futures::StreamExt;
use std::sync::Arc;

use crate::agent::{AgentLoop, Conversation, TerminationPolicy};
use crate::core::config::TerminationMode;
use crate::core::{Config, Event, EventPayload, Result};
use crate::llm::{CompletionClient, OpenAiClient};
use crate::tools::ToolRegistry;

/// Main agent that keeps history between turns
pub struct Agent {
    /// Configuration
    config: Config,
    /// Loop used for each turn
    agent_loop: AgentLoop,
    /// Conversation history
    conversation: Conversation,
}

impl Agent {
    /// Create an agent talking to the configured OpenAI-compatible API
    pub fn from_config(config: Config, registry: ToolRegistry) -> Result<Self> {
        let agent_loop = build_loop(&config, Arc::new(registry))?;
        Ok(Self::with_loop(config, agent_loop))
    }

    /// Create an agent around an existing loop
    pub fn with_loop(config: Config, agent_loop: AgentLoop) -> Self {
        let conversation = match &config.agent.system_prompt {
            Some(prompt) => Conversation::with_system_prompt(prompt.clone()),
            None => Conversation::new(),
        };

        Self {
            config,
            agent_loop,
            conversation,
        }
    }

    /// Run one user turn, reporting each event to `on_event`
    ///
    /// Returns the final message of the turn. The accumulated history is kept
    /// even when the run fails.
    pub async fn process<F>(&mut self, input: &str, mut on_event: F) -> Result<String>
    where
        F: FnMut(&Event),
    {
        self.conversation.push_user(input);
        let history = std::mem::take(&mut self.conversation).into_messages();
        let mut run = self.agent_loop.run(history);

        let mut final_message = String::new();
        let mut failure = None;
        while let Some(event) = run.next().await {
            match event {
                Ok(event) => {
                    if let EventPayload::Message(text) = &event.payload {
                        final_message = text.clone();
                    }
                    on_event(&event);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.conversation = Conversation::from(run.finish().await?);
        match failure {
            Some(e) => Err(e),
            None => Ok(final_message),
        }
    }

    /// Clear conversation history, keeping the system prompt
    pub fn clear_history(&mut self) {
        self.conversation.clear();
    }

    /// Get the conversation
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the loop
    pub fn agent_loop(&self) -> &AgentLoop {
        &self.agent_loop
    }

    /// Toggle verbose event output
    pub fn set_debug(&mut self, enabled: bool) {
        self.config.agent.debug = enabled;
    }

    /// Change the step ceiling for later turns
    pub fn set_max_steps(&mut self, max_steps: usize) -> Result<()> {
        self.agent_loop.set_max_steps(max_steps)?;
        self.config.agent.max_steps = max_steps;
        Ok(())
    }

    /// Use one model for every role, rebuilding the API clients
    pub fn set_model(&mut self, model: &str) -> Result<()> {
        let mut config = self.config.clone();
        config.set_model(model);
        config.agent.max_steps = self.agent_loop.max_steps();

        let registry = Arc::new(self.agent_loop.registry().clone());
        self.agent_loop = build_loop(&config, registry)?;
        self.config = config;
        Ok(())
    }
}

/// Termination policy described by the configuration
pub fn termination_policy(config: &Config) -> TerminationPolicy {
    match config.agent.termination {
        TerminationMode::Judgment => TerminationPolicy::Judgment,
        TerminationMode::Score => TerminationPolicy::ScoreThreshold {
            min_score: config.agent.min_score,
        },
    }
}

fn build_loop(config: &Config, registry: Arc<ToolRegistry>) -> Result<AgentLoop> {
    config.validate()?;
    if config.api.api_key.is_empty() {
        tracing::warn!("No API key configured, requests are sent without authorization");
    }

    let chat = OpenAiClient::from_config(config)?;
    let selector: Arc<dyn CompletionClient> = Arc::new(chat.with_model(&config.models.tool_selector));
    let evaluator: Arc<dyn CompletionClient> = Arc::new(chat.with_model(&config.models.evaluator));

    AgentLoop::builder(Arc::new(chat))
        .registry(registry)
        .max_steps(config.agent.max_steps)
        .termination(termination_policy(config))
        .synthesis(config.agent.synthesis)
        .selector_client(selector)
        .evaluator_client(evaluator)
        .build()
}

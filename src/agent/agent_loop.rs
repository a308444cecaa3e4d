//! The agent loop
//!
//! Drives `select -> execute -> synthesize -> evaluate` for at most
//! `max_steps` steps and exposes the run as a lazy stream of [`Event`]s.
//! Tool failures become data; failures talking to the model end the run
//! with a [`StepwiseError::Step`] naming the phase and step.

use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::agent::{
    Conversation, Phase, RunState, SynthesisMode, Synthesizer, TerminationEvaluator,
    TerminationPolicy, ToolSelector,
};
use crate::core::{new_event_id, Event, EventPayload, Message, Result, StepwiseError};
use crate::llm::CompletionClient;
use crate::tools::{ToolExecutor, ToolRegistry};

/// Default hard ceiling on steps
pub const DEFAULT_MAX_STEPS: usize = 3;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event>> + Send>>;

/// A configured agent loop, reusable across runs
#[derive(Clone)]
pub struct AgentLoop {
    selector: ToolSelector,
    executor: ToolExecutor,
    synthesizer: Synthesizer,
    evaluator: TerminationEvaluator,
    registry: Arc<ToolRegistry>,
    max_steps: usize,
}

/// Builder for [`AgentLoop`]
pub struct AgentLoopBuilder {
    client: Arc<dyn CompletionClient>,
    selector_client: Option<Arc<dyn CompletionClient>>,
    synthesizer_client: Option<Arc<dyn CompletionClient>>,
    evaluator_client: Option<Arc<dyn CompletionClient>>,
    registry: Option<Arc<ToolRegistry>>,
    max_steps: usize,
    termination: TerminationPolicy,
    synthesis: SynthesisMode,
}

impl AgentLoopBuilder {
    /// Create a builder using `client` for every role
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            selector_client: None,
            synthesizer_client: None,
            evaluator_client: None,
            registry: None,
            max_steps: DEFAULT_MAX_STEPS,
            termination: TerminationPolicy::default(),
            synthesis: SynthesisMode::default(),
        }
    }

    /// Set the tool registry (default: no tools)
    pub fn registry(mut self, registry: impl Into<Arc<ToolRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Set the step ceiling
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the termination policy
    pub fn termination(mut self, policy: TerminationPolicy) -> Self {
        self.termination = policy;
        self
    }

    /// Set how responses are synthesized
    pub fn synthesis(mut self, mode: SynthesisMode) -> Self {
        self.synthesis = mode;
        self
    }

    /// Use a different client for tool selection
    pub fn selector_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.selector_client = Some(client);
        self
    }

    /// Use a different client for response synthesis
    pub fn synthesizer_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.synthesizer_client = Some(client);
        self
    }

    /// Use a different client for termination evaluation
    pub fn evaluator_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.evaluator_client = Some(client);
        self
    }

    /// Build the loop
    pub fn build(self) -> Result<AgentLoop> {
        if self.max_steps == 0 {
            return Err(StepwiseError::config("max_steps must be at least 1"));
        }
        if let TerminationPolicy::ScoreThreshold { min_score } = self.termination {
            if min_score > crate::core::config::MAX_SCORE {
                return Err(StepwiseError::config(format!(
                    "min_score {} is above the maximum score",
                    min_score
                )));
            }
        }

        let pick = |role: Option<Arc<dyn CompletionClient>>| role.unwrap_or_else(|| Arc::clone(&self.client));

        Ok(AgentLoop {
            selector: ToolSelector::new(pick(self.selector_client.clone())),
            executor: ToolExecutor::new(),
            synthesizer: Synthesizer::new(pick(self.synthesizer_client.clone()), self.synthesis),
            evaluator: TerminationEvaluator::new(pick(self.evaluator_client.clone()), self.termination),
            registry: self.registry.clone().unwrap_or_default(),
            max_steps: self.max_steps,
        })
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final message history
    pub messages: Vec<Message>,
    /// All events in emission order
    pub events: Vec<Event>,
    /// Text of the last `message` event
    pub final_message: String,
    /// Number of steps taken
    pub steps: usize,
}

impl AgentLoop {
    /// Start building a loop around `client`
    pub fn builder(client: Arc<dyn CompletionClient>) -> AgentLoopBuilder {
        AgentLoopBuilder::new(client)
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Change the step ceiling for future runs
    pub fn set_max_steps(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(StepwiseError::config("max_steps must be at least 1"));
        }
        self.max_steps = max_steps;
        Ok(())
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn termination(&self) -> TerminationPolicy {
        self.evaluator.policy()
    }

    pub fn synthesis(&self) -> SynthesisMode {
        self.synthesizer.mode()
    }

    /// Start a run over the given history
    ///
    /// Nothing happens until the returned stream is polled.
    pub fn run(&self, messages: Vec<Message>) -> AgentRun {
        let this = self.clone();
        let (history_tx, history_rx) = oneshot::channel();

        let events = stream! {
            let mut conversation = Conversation::from(messages);
            let mut state = RunState::new(this.max_steps);
            let mut failure: Option<StepwiseError> = None;

            'steps: loop {
                let step = state.step;
                info!(step, max_steps = state.max_steps, "Starting step");

                // Selecting
                let selected = match this.selector.select(&mut conversation, &this.registry).await {
                    Ok(selected) => selected,
                    Err(e) => {
                        failure = Some(e.at_step(Phase::Selecting, step));
                        break 'steps;
                    }
                };
                for instance in &selected {
                    yield Ok(Event::new(step, EventPayload::ToolCall(instance.record())));
                }

                // Executing
                state.begin_executing();
                let outputs = this.executor.execute_all(selected).await;
                this.executor.append_to(&mut conversation, &outputs);
                for output in outputs {
                    if output.failed {
                        warn!(step, tool = %output.name, "Tool output marked as failed");
                    }
                    yield Ok(Event::new(step, EventPayload::ToolOutput(output)));
                }

                // Synthesizing
                state.begin_synthesizing();
                let mut fragments = match this.synthesizer.synthesize_stream(conversation.messages()).await {
                    Ok(fragments) => fragments,
                    Err(e) => {
                        failure = Some(e.at_step(Phase::Synthesizing, step));
                        break 'steps;
                    }
                };
                let id = new_event_id();
                let mut text = String::new();
                while let Some(fragment) = fragments.next().await {
                    match fragment {
                        Ok(fragment) if fragment.is_empty() => {}
                        Ok(fragment) => {
                            text.push_str(&fragment);
                            yield Ok(Event::with_id(step, id.clone(), EventPayload::MessageStream(fragment)));
                        }
                        Err(e) => {
                            failure = Some(e.at_step(Phase::Synthesizing, step));
                            break 'steps;
                        }
                    }
                }
                this.synthesizer.finish(&mut conversation, text.clone());
                yield Ok(Event::with_id(step, id, EventPayload::Message(text)));

                // Evaluating
                state.begin_evaluating();
                if state.is_last_step() {
                    debug!(step, "Step ceiling reached");
                    state.finish();
                    break 'steps;
                }
                let evaluation = match this.evaluator.evaluate(conversation.messages()).await {
                    Ok(evaluation) => evaluation,
                    Err(e) => {
                        failure = Some(e.at_step(Phase::Evaluating, step));
                        break 'steps;
                    }
                };
                yield Ok(Event::new(step, EventPayload::Evaluation(evaluation)));

                if evaluation.is_final {
                    info!(step, "Response judged final");
                    state.finish();
                    break 'steps;
                }
                state.next_step();
            }

            // Receiver may be gone if the run handle was dropped
            let _ = history_tx.send(conversation.into_messages());

            if let Some(e) = failure {
                warn!("Agent run failed: {}", e);
                yield Err(e);
            }
        };

        AgentRun {
            events: Box::pin(events),
            history: history_rx,
        }
    }

    /// Run to the end and collect everything
    pub async fn run_to_completion(&self, messages: Vec<Message>) -> Result<AgentOutcome> {
        let mut run = self.run(messages);
        let mut events = Vec::new();

        while let Some(event) = run.next().await {
            events.push(event?);
        }

        let final_message = events
            .iter()
            .rev()
            .find_map(|e| match &e.payload {
                EventPayload::Message(text) => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let steps = events.last().map_or(0, |e| e.step);

        Ok(AgentOutcome {
            messages: run.finish().await?,
            events,
            final_message,
            steps,
        })
    }
}

/// Handle to one agent run
///
/// Streams the run's events. Dropping it cancels the run, including any
/// in-flight request.
pub struct AgentRun {
    events: EventStream,
    history: oneshot::Receiver<Vec<Message>>,
}

impl AgentRun {
    /// Drain the remaining events and return the final message history
    ///
    /// The history is returned after a failed run too, so the caller can
    /// resume from it. Errors among the drained events are discarded.
    pub async fn finish(mut self) -> Result<Vec<Message>> {
        while self.events.next().await.is_some() {}
        self.history
            .await
            .map_err(|_| StepwiseError::Other("agent run ended without returning its history".to_string()))
    }
}

impl Stream for AgentRun {
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventKind;
    use crate::llm::ScriptedClient;

    #[test]
    fn test_zero_steps_rejected() {
        let client = Arc::new(ScriptedClient::new());
        assert!(AgentLoop::builder(client).max_steps(0).build().is_err());
    }

    #[test]
    fn test_score_above_maximum_rejected() {
        let client = Arc::new(ScriptedClient::new());
        let result = AgentLoop::builder(client)
            .termination(TerminationPolicy::ScoreThreshold { min_score: 6 })
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_single_step_chat() {
        let client = Arc::new(ScriptedClient::new());
        client.push_stream(["Hel", "lo!"]);
        let agent_loop = AgentLoop::builder(client.clone()).max_steps(1).build().unwrap();

        let outcome = agent_loop
            .run_to_completion(vec![Message::user("Hi")])
            .await
            .unwrap();

        let kinds: Vec<EventKind> = outcome.events.iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::MessageStream, EventKind::MessageStream, EventKind::Message]
        );
        assert_eq!(outcome.final_message, "Hello!");
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_run_is_lazy() {
        let client = Arc::new(ScriptedClient::new());
        let agent_loop = AgentLoop::builder(client.clone()).build().unwrap();

        let run = agent_loop.run(vec![Message::user("Hi")]);
        drop(run);
        assert!(client.calls().is_empty());
    }
}

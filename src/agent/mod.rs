//! Agent module - the step-bounded agent loop and its phases
//!
//! Contains tool selection, response synthesis, termination evaluation,
//! the loop that sequences them and the multi-turn agent used by the CLI.

pub mod agent_loop;
pub mod conversation;
pub mod evaluator;
pub mod loop_state;
pub mod orchestrator;
pub mod selector;
pub mod synthesizer;

pub use agent_loop::{AgentLoop, AgentLoopBuilder, AgentOutcome, AgentRun, DEFAULT_MAX_STEPS};
pub use conversation::Conversation;
pub use evaluator::{
    FinalAnswerJudgment, QaEvaluation, TerminationEvaluator, TerminationPolicy, JUDGMENT_SCHEMA,
    SCORE_SCHEMA,
};
pub use loop_state::{Phase, RunState};
pub use orchestrator::{termination_policy, Agent};
pub use selector::{describe_selection, ToolSelector};
pub use synthesizer::{SynthesisMode, SynthesizedResponse, Synthesizer, RESPONSE_SCHEMA};

//! Agent loop state management
//!
//! Tracks the step counter and phase of one run. The phase cycle is
//! `Selecting -> Executing -> Synthesizing -> Evaluating -> (Selecting | Done)`.

use serde::{Deserialize, Serialize};

/// Phase of an agent step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Selecting,
    Executing,
    Synthesizing,
    Evaluating,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Selecting => write!(f, "selecting tools"),
            Phase::Executing => write!(f, "executing tools"),
            Phase::Synthesizing => write!(f, "synthesizing"),
            Phase::Evaluating => write!(f, "evaluating"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// State of one agent run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    /// Current step (1-based)
    pub step: usize,
    /// Hard ceiling on steps
    pub max_steps: usize,
    /// Current phase
    pub phase: Phase,
}

impl RunState {
    /// Start a run at step 1, selecting
    pub fn new(max_steps: usize) -> Self {
        Self {
            step: 1,
            max_steps,
            phase: Phase::Selecting,
        }
    }

    /// Whether the current step is the last one permitted
    pub fn is_last_step(&self) -> bool {
        self.step >= self.max_steps
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Selected tools, move on to running them
    pub fn begin_executing(&mut self) {
        self.advance(Phase::Selecting, Phase::Executing);
    }

    /// Tools joined, move on to the response
    pub fn begin_synthesizing(&mut self) {
        self.advance(Phase::Executing, Phase::Synthesizing);
    }

    /// Response appended, move on to the termination check
    pub fn begin_evaluating(&mut self) {
        self.advance(Phase::Synthesizing, Phase::Evaluating);
    }

    /// Start the next step
    pub fn next_step(&mut self) {
        debug_assert!(!self.is_last_step(), "step ceiling exceeded");
        self.advance(Phase::Evaluating, Phase::Selecting);
        self.step += 1;
    }

    /// Stop the run
    pub fn finish(&mut self) {
        self.advance(Phase::Evaluating, Phase::Done);
    }

    fn advance(&mut self, from: Phase, to: Phase) {
        debug_assert_eq!(self.phase, from, "invalid transition to {:?}", to);
        self.phase = to;
    }
}

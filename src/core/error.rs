//! Custom error types for Stepwise
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

use crate::agent::Phase;

/// Main error type for Stepwise operations
#[derive(Error, Debug)]
pub enum StepwiseError {
    /// Transport or HTTP failure talking to the completion service
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Structured output never validated against its schema
    #[error("Extraction of '{schema}' failed after {attempts} attempt(s): {reason}")]
    Extraction {
        schema: String,
        attempts: u32,
        reason: String,
    },

    /// Two tools registered under the same name
    #[error("Tool '{0}' is registered more than once")]
    RegistryConflict(String),

    /// Tool execution errors (surfaced as data by the executor, never by the loop)
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// A fatal failure inside one phase of an agent run
    #[error("Step {step} failed while {phase}: {source}")]
    Step {
        phase: Phase,
        step: usize,
        #[source]
        source: Box<StepwiseError>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Stepwise operations
pub type Result<T> = std::result::Result<T, StepwiseError>;

impl StepwiseError {
    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create an extraction error
    pub fn extraction(schema: impl Into<String>, attempts: u32, reason: impl Into<String>) -> Self {
        Self::Extraction {
            schema: schema.into(),
            attempts,
            reason: reason.into(),
        }
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Attach the phase and step an agent run failed in
    pub fn at_step(self, phase: Phase, step: usize) -> Self {
        match self {
            // Already located, keep the innermost position
            located @ Self::Step { .. } => located,
            other => Self::Step {
                phase,
                step,
                source: Box::new(other),
            },
        }
    }

    /// Phase and step of a failed run, if this error carries them
    pub fn location(&self) -> Option<(Phase, usize)> {
        match self {
            Self::Step { phase, step, .. } => Some((*phase, *step)),
            _ => None,
        }
    }

    /// The underlying error with any step location stripped
    pub fn root(&self) -> &StepwiseError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

//! Termination evaluation
//!
//! The step ceiling always wins. Below it the model is asked either for a
//! yes/no "final answer" judgment or for a 0-5 score compared against a
//! threshold.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::core::config::MAX_SCORE;
use crate::core::{Evaluation, Message, Result};
use crate::llm::{CompletionClient, CompletionClientExt, ResponseSchema, StructuredOutput};

/// Name of the yes/no judgment schema
pub const JUDGMENT_SCHEMA: &str = "final_answer_judgment";

/// Name of the score schema
pub const SCORE_SCHEMA: &str = "qa_evaluation";

/// How a response is judged final
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationPolicy {
    /// Model returns `is_final`
    #[default]
    Judgment,
    /// Model returns a score; final when `score >= min_score`
    ScoreThreshold { min_score: u8 },
}

/// Yes/no judgment on the last response
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FinalAnswerJudgment {
    pub is_final: bool,
}

impl StructuredOutput for FinalAnswerJudgment {
    fn response_schema() -> ResponseSchema {
        ResponseSchema::new(
            JUDGMENT_SCHEMA,
            "Whether the last assistant message is a final, sufficient answer to the user's query",
            json!({
                "type": "object",
                "properties": {
                    "is_final": {
                        "type": "boolean",
                        "description": "true if no further tool calls or reasoning are needed"
                    }
                },
                "required": ["is_final"]
            }),
        )
    }
}

/// Quality score of the last response
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QaEvaluation {
    pub score: u8,
}

impl StructuredOutput for QaEvaluation {
    fn response_schema() -> ResponseSchema {
        ResponseSchema::new(
            SCORE_SCHEMA,
            "QA evaluation of the last assistant message against the user's original query",
            json!({
                "type": "object",
                "properties": {
                    "score": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": MAX_SCORE,
                        "description": "0 if it doesn't answer the original query, 5 if it fully answers it"
                    }
                },
                "required": ["score"]
            }),
        )
    }
}

/// Decides whether an agent run should stop
#[derive(Clone)]
pub struct TerminationEvaluator {
    client: Arc<dyn CompletionClient>,
    policy: TerminationPolicy,
}

impl TerminationEvaluator {
    pub fn new(client: Arc<dyn CompletionClient>, policy: TerminationPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> TerminationPolicy {
        self.policy
    }

    /// Ask the model whether the conversation holds a final answer
    pub async fn evaluate(&self, messages: &[Message]) -> Result<Evaluation> {
        let evaluation = match self.policy {
            TerminationPolicy::Judgment => {
                let judgment: FinalAnswerJudgment = self.client.extract_as(messages).await?;
                Evaluation {
                    is_final: judgment.is_final,
                    score: None,
                }
            }
            TerminationPolicy::ScoreThreshold { min_score } => {
                let qa: QaEvaluation = self.client.extract_as(messages).await?;
                Evaluation {
                    is_final: qa.score >= min_score,
                    score: Some(qa.score),
                }
            }
        };
        debug!(?evaluation, "Evaluated response");
        Ok(evaluation)
    }

    /// Whether the run is done after `step`
    ///
    /// No upstream call is made once the step ceiling is reached.
    pub async fn is_done(&self, messages: &[Message], step: usize, max_steps: usize) -> Result<bool> {
        if step >= max_steps {
            return Ok(true);
        }
        Ok(self.evaluate(messages).await?.is_final)
    }
}

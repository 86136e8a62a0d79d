// SPDX-License-Identifier: MIT

//! The invocation result handed to presentation

use serde::Serialize;

use crate::insight::workflow::error::WorkflowError;
use crate::insight::workflow::state::WorkflowState;

/// Mean score at or above which an essay is approved.
///
/// The branch rule in the pipeline definition and every display surface are
/// built from this constant, so routing and rendering cannot disagree.
pub const APPROVAL_THRESHOLD: f64 = 7.0;

/// Number of category evaluations that must contribute before aggregation.
pub const EXPECTED_SCORES: usize = 3;

/// Outcome labels of the approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    NeedsImprovement,
}

impl Verdict {
    /// The decision policy: inclusive threshold on the mean score.
    pub fn from_average(average: f64) -> Self {
        if average >= APPROVAL_THRESHOLD {
            Verdict::Approved
        } else {
            Verdict::NeedsImprovement
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::NeedsImprovement => "needs_improvement",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one essay evaluation produced.
#[derive(Debug, Clone, Serialize)]
pub struct EssayReport {
    pub language_feedback: String,
    pub grammar_feedback: String,
    pub structured_feedback: String,
    pub overall_feedback: String,
    pub scores: Vec<u8>,
    pub average_score: f64,
}

impl EssayReport {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_average(self.average_score)
    }

    pub fn approved(&self) -> bool {
        self.verdict() == Verdict::Approved
    }

    /// Extract the report from a finished workflow state.
    ///
    /// Every field must be present and well-typed; a state missing any of
    /// them was produced by an aborted or buggy run and is never rendered.
    pub fn from_state(state: &WorkflowState) -> Result<Self, WorkflowError> {
        let text = |key: &str| {
            state
                .get_str(key)
                .map(str::to_string)
                .ok_or_else(|| WorkflowError::MissingField(key.to_string()))
        };

        let scores = state
            .get("scores")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| WorkflowError::MissingField("scores".to_string()))?
            .iter()
            .map(|v| {
                v.as_u64()
                    .filter(|s| *s <= u8::MAX as u64)
                    .map(|s| s as u8)
                    .ok_or_else(|| WorkflowError::MissingField("scores".to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        let average_score = state
            .get_f64("average_score")
            .ok_or_else(|| WorkflowError::MissingField("average_score".to_string()))?;

        Ok(Self {
            language_feedback: text("language_feedback")?,
            grammar_feedback: text("grammar_feedback")?,
            structured_feedback: text("structured_feedback")?,
            overall_feedback: text("overall_feedback")?,
            scores,
            average_score,
        })
    }
}

// SPDX-License-Identifier: MIT

//! Evaluator module - the text-to-structured-feedback collaborator
//!
//! This module provides the core [Evaluator] trait and the wire contract
//! for its responses. Implementations live in their own submodules:
//! - [openai] - OpenAI chat completions API

pub mod error;
pub mod openai;

pub use error::EvaluatorError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest score an evaluator may assign.
pub const MAX_SCORE: u8 = 10;

/// One structured assessment: free-text feedback plus a score out of 10.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub feedback: String,
    pub score: u8,
}

impl Evaluation {
    /// Validate a raw wire response against the evaluator contract.
    ///
    /// The response must be a JSON object with a string `feedback` and an
    /// integer `score` in `0..=10`. Anything else is a contract violation;
    /// out-of-range scores are rejected, never clamped.
    pub fn from_value(value: &Value) -> Result<Self, EvaluatorError> {
        let obj = value
            .as_object()
            .ok_or_else(|| EvaluatorError::contract("response is not a JSON object"))?;

        let feedback = obj
            .get("feedback")
            .and_then(Value::as_str)
            .ok_or_else(|| EvaluatorError::contract("missing string field 'feedback'"))?
            .to_string();

        let score = obj
            .get("score")
            .and_then(Value::as_i64)
            .ok_or_else(|| EvaluatorError::contract("missing integer field 'score'"))?;

        if !(0..=MAX_SCORE as i64).contains(&score) {
            return Err(EvaluatorError::contract(format!(
                "score {} outside 0..={}",
                score, MAX_SCORE
            )));
        }

        Ok(Self {
            feedback,
            score: score as u8,
        })
    }

    /// Re-check the score range on an already-constructed evaluation.
    ///
    /// Callers that accept an [Evaluator] implementation they do not control
    /// run this before trusting the score.
    pub fn check_score(&self) -> Result<(), EvaluatorError> {
        if self.score > MAX_SCORE {
            return Err(EvaluatorError::contract(format!(
                "score {} outside 0..={}",
                self.score, MAX_SCORE
            )));
        }
        Ok(())
    }
}

/// Core trait for evaluator implementations.
///
/// An evaluator takes a free-form instruction and returns one structured
/// [Evaluation]. It is treated as opaque and potentially unreliable; any
/// retry policy belongs to the implementation, not to callers.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, prompt: &str) -> Result<Evaluation, EvaluatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_valid() {
        let value = json!({"feedback": "solid work", "score": 8});
        let eval = Evaluation::from_value(&value).unwrap();
        assert_eq!(eval.feedback, "solid work");
        assert_eq!(eval.score, 8);
    }

    #[test]
    fn test_from_value_boundary_scores() {
        for score in [0, 10] {
            let value = json!({"feedback": "x", "score": score});
            assert_eq!(Evaluation::from_value(&value).unwrap().score, score as u8);
        }
    }

    #[test]
    fn test_from_value_score_too_high() {
        let value = json!({"feedback": "x", "score": 15});
        let err = Evaluation::from_value(&value).unwrap_err();
        assert!(matches!(err, EvaluatorError::Contract(_)));
        assert!(err.to_string().contains("15"));
    }

    #[test]
    fn test_from_value_negative_score() {
        let value = json!({"feedback": "x", "score": -1});
        assert!(Evaluation::from_value(&value).is_err());
    }

    #[test]
    fn test_from_value_fractional_score() {
        // as_i64 refuses 7.5, so a fractional score is a missing integer
        let value = json!({"feedback": "x", "score": 7.5});
        assert!(Evaluation::from_value(&value).is_err());
    }

    #[test]
    fn test_from_value_missing_feedback() {
        let value = json!({"score": 5});
        let err = Evaluation::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("feedback"));
    }

    #[test]
    fn test_from_value_not_an_object() {
        let value = json!("just text");
        assert!(Evaluation::from_value(&value).is_err());
    }

    #[test]
    fn test_check_score_rejects_out_of_range() {
        let eval = Evaluation {
            feedback: "x".to_string(),
            score: 15,
        };
        assert!(eval.check_score().is_err());

        let eval = Evaluation {
            feedback: "x".to_string(),
            score: 10,
        };
        assert!(eval.check_score().is_ok());
    }
}

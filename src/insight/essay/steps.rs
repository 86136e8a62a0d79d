// SPDX-License-Identifier: MIT

//! The steps of the essay evaluation graph

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::report::{Verdict, EXPECTED_SCORES};
use crate::eval::Evaluator;
use crate::insight::workflow::error::WorkflowError;
use crate::insight::workflow::graph::Step;
use crate::insight::workflow::state::{NodeUpdate, WorkflowState};

fn essay_text(state: &WorkflowState) -> Result<&str, WorkflowError> {
    state
        .get_str("essay_text")
        .ok_or_else(|| WorkflowError::MissingField("essay_text".to_string()))
}

/// Entry node; the fan-out point. Contributes nothing new.
pub struct Intake;

#[async_trait]
impl Step for Intake {
    async fn run(&self, state: &WorkflowState) -> Result<NodeUpdate, WorkflowError> {
        let essay = essay_text(state)?;
        log::debug!("intake accepted {} characters of essay text", essay.len());
        Ok(Map::new())
    }
}

/// The three independent assessment dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Language,
    Grammar,
    Structure,
}

impl Category {
    /// State field this category's feedback lands in
    pub fn field(&self) -> &'static str {
        match self {
            Category::Language => "language_feedback",
            Category::Grammar => "grammar_feedback",
            Category::Structure => "structured_feedback",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Category::Language => "Evaluate the language quality of this essay and give a score:",
            Category::Grammar => "Evaluate the grammar of this essay and give a score:",
            Category::Structure => "Evaluate the structure of this essay and give a score:",
        }
    }
}

/// One quality assessment: prompts the evaluator about `essay_text`,
/// contributes its feedback field and appends its score.
///
/// The same step type backs all three checks; only the category differs.
pub struct CategoryCheck {
    category: Category,
    evaluator: Arc<dyn Evaluator>,
}

impl CategoryCheck {
    pub fn new(category: Category, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            category,
            evaluator,
        }
    }
}

#[async_trait]
impl Step for CategoryCheck {
    async fn run(&self, state: &WorkflowState) -> Result<NodeUpdate, WorkflowError> {
        let essay = essay_text(state)?;
        let prompt = format!("{}\n\n{}", self.category.instruction(), essay);

        let evaluation = self.evaluator.evaluate(&prompt).await?;
        // Never trust an injected evaluator with the range contract
        evaluation.check_score()?;

        log::info!("{:?} check scored {}", self.category, evaluation.score);

        let mut update = Map::new();
        update.insert(
            self.category.field().to_string(),
            json!(evaluation.feedback),
        );
        update.insert("scores".to_string(), json!([evaluation.score]));
        Ok(update)
    }
}

/// The join node: summarizes the three feedback texts through the evaluator
/// and computes the mean score.
pub struct OverallCheck {
    evaluator: Arc<dyn Evaluator>,
}

impl OverallCheck {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl Step for OverallCheck {
    async fn run(&self, state: &WorkflowState) -> Result<NodeUpdate, WorkflowError> {
        let feedback = |key: &str| {
            state
                .get_str(key)
                .ok_or_else(|| WorkflowError::MissingField(key.to_string()))
        };
        let language = feedback("language_feedback")?;
        let grammar = feedback("grammar_feedback")?;
        let structure = feedback("structured_feedback")?;

        let scores: Vec<f64> = state
            .get("scores")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default();
        // Fewer (or more) contributions than contributors means the join
        // fired early; refuse to average over it
        if scores.len() != EXPECTED_SCORES {
            return Err(WorkflowError::IncompleteAggregation {
                expected: EXPECTED_SCORES,
                actual: scores.len(),
            });
        }

        let prompt = format!(
            "Give short overall feedback based on:\nLanguage: {}\nGrammar: {}\nStructure: {}",
            language, grammar, structure
        );
        let evaluation = self.evaluator.evaluate(&prompt).await?;

        let average = scores.iter().sum::<f64>() / scores.len() as f64;
        log::info!("aggregated average score {:.2}", average);

        let mut update = Map::new();
        update.insert("overall_feedback".to_string(), json!(evaluation.feedback));
        update.insert("average_score".to_string(), json!(average));
        Ok(update)
    }
}

/// Terminal node both branch outcomes converge to; logs the verdict.
pub struct DisplayResults;

#[async_trait]
impl Step for DisplayResults {
    async fn run(&self, state: &WorkflowState) -> Result<NodeUpdate, WorkflowError> {
        let average = state
            .get_f64("average_score")
            .ok_or_else(|| WorkflowError::MissingField("average_score".to_string()))?;
        match Verdict::from_average(average) {
            Verdict::Approved => log::info!("essay approved with average {:.2}", average),
            Verdict::NeedsImprovement => {
                log::warn!("essay needs improvement with average {:.2}", average)
            }
        }
        Ok(Map::new())
    }
}

// SPDX-License-Identifier: MIT

//! The essay evaluation pipeline
//!
//! Wires the workflow graph: one intake node fanning out to three
//! independent category checks, converging on an aggregation node whose
//! branch decision routes (both outcomes, for now) to a terminal display
//! node. The evaluator collaborator is injected, never a process-wide
//! singleton, so tests substitute stubs freely.

pub mod report;
pub mod steps;

pub use report::{EssayReport, Verdict, APPROVAL_THRESHOLD, EXPECTED_SCORES};

use serde_json::{json, Map};
use std::sync::Arc;

use crate::eval::Evaluator;
use crate::insight::workflow::error::{GraphValidationError, WorkflowError};
use crate::insight::workflow::graph::{
    compile, edge, BranchDef, BranchRule, GraphDef, NodeDef, Workflow, END, START,
};
use crate::insight::workflow::state::{Reducer, StateSchema};
use steps::{Category, CategoryCheck, DisplayResults, Intake, OverallCheck};

pub const INPUT_ESSAY: &str = "input_essay";
pub const LANGUAGE_CHECK: &str = "language_check";
pub const GRAMMAR_CHECK: &str = "grammar_check";
pub const STRUCTURE_CHECK: &str = "structure_check";
pub const OVERALL_CHECK: &str = "overall_check";
pub const DISPLAY: &str = "display";

/// A compiled essay evaluation workflow, ready to run per submission.
pub struct EssayPipeline {
    workflow: Workflow,
}

impl EssayPipeline {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Result<Self, GraphValidationError> {
        let workflow = compile(&Self::definition(evaluator))?;
        Ok(Self { workflow })
    }

    /// The graph as plain data. Public so callers (and tests) can inspect
    /// or rearrange it before compiling.
    pub fn definition(evaluator: Arc<dyn Evaluator>) -> GraphDef {
        GraphDef {
            name: "essay-insight".to_string(),
            nodes: vec![
                NodeDef::new(INPUT_ESSAY, Arc::new(Intake)),
                NodeDef::new(
                    LANGUAGE_CHECK,
                    Arc::new(CategoryCheck::new(Category::Language, evaluator.clone())),
                ),
                NodeDef::new(
                    GRAMMAR_CHECK,
                    Arc::new(CategoryCheck::new(Category::Grammar, evaluator.clone())),
                ),
                NodeDef::new(
                    STRUCTURE_CHECK,
                    Arc::new(CategoryCheck::new(Category::Structure, evaluator.clone())),
                ),
                NodeDef::new(OVERALL_CHECK, Arc::new(OverallCheck::new(evaluator))),
                NodeDef::new(DISPLAY, Arc::new(DisplayResults)),
            ],
            edges: vec![
                edge(START, INPUT_ESSAY),
                edge(INPUT_ESSAY, LANGUAGE_CHECK),
                edge(INPUT_ESSAY, GRAMMAR_CHECK),
                edge(INPUT_ESSAY, STRUCTURE_CHECK),
                edge(LANGUAGE_CHECK, OVERALL_CHECK),
                edge(GRAMMAR_CHECK, OVERALL_CHECK),
                edge(STRUCTURE_CHECK, OVERALL_CHECK),
                edge(DISPLAY, END),
            ],
            branches: vec![BranchDef {
                source: OVERALL_CHECK.to_string(),
                rules: vec![BranchRule::new(
                    &format!("average_score >= {}", APPROVAL_THRESHOLD),
                    "approved",
                )],
                default: "needs_improvement".to_string(),
                // Single-pass design: both outcomes converge on display
                targets: [
                    ("approved".to_string(), DISPLAY.to_string()),
                    ("needs_improvement".to_string(), DISPLAY.to_string()),
                ]
                .into(),
            }],
            state: StateSchema::new().field("scores", Reducer::Append),
        }
    }

    /// Evaluate one essay and return the merged report.
    ///
    /// Blank input is rejected here, before the graph runs and before any
    /// evaluator call is made.
    pub async fn evaluate(&self, essay_text: &str) -> Result<EssayReport, WorkflowError> {
        if essay_text.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "essay text is empty or blank".to_string(),
            ));
        }

        let mut initial = Map::new();
        initial.insert("essay_text".to_string(), json!(essay_text));

        let state = self.workflow.invoke(initial).await?;
        EssayReport::from_state(&state)
    }
}

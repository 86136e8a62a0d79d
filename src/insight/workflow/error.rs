// SPDX-License-Identifier: MIT

//! Typed errors for workflow compilation and execution

use crate::eval::EvaluatorError;
use thiserror::Error;

/// Structural defects in a workflow definition.
///
/// Raised by `compile` only; a definition that fails validation can never
/// be invoked.
#[derive(Debug, Error)]
pub enum GraphValidationError {
    /// Two nodes declared with the same id
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    /// An edge or branch references a node that was never declared
    #[error("'{referenced}' referenced by {context} is not a declared node")]
    UnknownNode {
        referenced: String,
        context: String,
    },

    /// No edge leaves the start marker
    #[error("graph has no entry edge from start")]
    NoEntry,

    /// Circular dependency detected in the graph
    #[error("circular dependency detected: {0:?}")]
    CircularDependency(Vec<String>),

    /// A declared node can never run
    #[error("node '{0}' is unreachable from start")]
    Unreachable(String),

    /// A branch rule or default names an outcome with no mapped target
    #[error("branch on '{node}' has outcome '{label}' with no mapped target node")]
    UnmappedOutcome { node: String, label: String },

    /// A branch rule expression failed to parse
    #[error("branch rule on '{node}' failed to parse: {reason}")]
    InvalidRule { node: String, reason: String },
}

/// Failures during a single workflow invocation.
///
/// Any of these aborts the invocation wholesale; a partially-filled state
/// is never returned as success.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input rejected at the boundary, before the graph runs
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The evaluator collaborator failed or broke its contract
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// A join ran before all of its contributors
    #[error("aggregation ran with {actual} of {expected} expected scores")]
    IncompleteAggregation { expected: usize, actual: usize },

    /// A state field a step or the report depends on is absent
    #[error("state field '{0}' is missing or has the wrong type")]
    MissingField(String),

    /// No runnable node remains but the graph has not finished
    #[error("workflow stalled; nodes never became runnable: {0:?}")]
    Stalled(Vec<String>),
}

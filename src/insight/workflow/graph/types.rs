// SPDX-License-Identifier: MIT

//! Graph workflow type definitions
//!
//! A [GraphDef] is a plain description of a workflow: the named steps, the
//! directed edges between them (including the synthetic [START] and [END]
//! markers), the state merge-rule table, and any branch decisions. Nothing
//! here executes; validation and execution live in `compile` and `executor`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::insight::workflow::error::WorkflowError;
use crate::insight::workflow::state::{NodeUpdate, StateSchema, WorkflowState};

/// Synthetic entry marker; edges from here declare the graph's entry nodes.
pub const START: &str = "__start__";
/// Synthetic exit marker; edges to here declare the terminal nodes.
pub const END: &str = "__end__";

/// One unit of work in the graph.
///
/// A step reads the accumulated state and returns a partial update; it never
/// mutates state directly, so the engine alone decides how concurrent
/// contributions merge.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, state: &WorkflowState) -> Result<NodeUpdate, WorkflowError>;
}

/// A named step in the graph
#[derive(Clone)]
pub struct NodeDef {
    pub id: String,
    pub step: Arc<dyn Step>,
}

impl NodeDef {
    pub fn new(id: &str, step: Arc<dyn Step>) -> Self {
        Self {
            id: id.to_string(),
            step,
        }
    }
}

impl std::fmt::Debug for NodeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDef").field("id", &self.id).finish()
    }
}

/// A directed dependency edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Shorthand edge constructor so definitions read as a table.
pub fn edge(from: &str, to: &str) -> Edge {
    Edge {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// A single-shot decision attached to a node.
///
/// After `source` completes, the ordered `rules` are evaluated against the
/// state; the first match (or `default`) names an outcome label, and the
/// node mapped to that label in `targets` becomes runnable. The other
/// mapped nodes never execute for that invocation.
#[derive(Debug, Clone)]
pub struct BranchDef {
    pub source: String,
    pub rules: Vec<BranchRule>,
    pub default: String,
    pub targets: HashMap<String, String>,
}

/// `when` is a predicate expression; `then` is the outcome label it selects.
#[derive(Debug, Clone)]
pub struct BranchRule {
    pub when: String,
    pub then: String,
}

impl BranchRule {
    pub fn new(when: &str, then: &str) -> Self {
        Self {
            when: when.to_string(),
            then: then.to_string(),
        }
    }
}

/// A complete workflow definition
#[derive(Debug, Clone, Default)]
pub struct GraphDef {
    pub name: String,
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<Edge>,
    pub branches: Vec<BranchDef>,
    pub state: StateSchema,
}

// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Runs a compiled workflow in waves. A node is runnable when every
//! predecessor has completed (and, for branch targets, the branch has
//! selected it); all runnable nodes of a wave execute concurrently and
//! their partial updates are merged sequentially afterwards, so writes to
//! accumulating fields are serialized and never lost.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::types::Step;
use crate::insight::workflow::error::WorkflowError;
use crate::insight::workflow::predicate::{self, Expr};
use crate::insight::workflow::state::{NodeUpdate, StateSchema, WorkflowState};

/// A branch with its rules parsed, ready for routing decisions.
pub struct CompiledBranch {
    pub(super) source: String,
    pub(super) rules: Vec<(Expr, String)>,
    pub(super) default: String,
    pub(super) targets: HashMap<String, String>,
}

impl CompiledBranch {
    /// First matching rule wins; the default label covers the rest.
    fn decide(&self, state: &WorkflowState) -> &str {
        for (expr, label) in &self.rules {
            if predicate::eval(expr, state) {
                return label;
            }
        }
        &self.default
    }
}

/// A validated, executable workflow. Produced by `compile`, never built
/// directly.
pub struct Workflow {
    name: String,
    steps: HashMap<String, Arc<dyn Step>>,
    order: Vec<String>,
    predecessors: HashMap<String, Vec<String>>,
    branches: Vec<CompiledBranch>,
    gated: HashSet<String>,
    schema: StateSchema,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("order", &self.order)
            .finish()
    }
}

impl Workflow {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        name: String,
        steps: HashMap<String, Arc<dyn Step>>,
        order: Vec<String>,
        predecessors: HashMap<String, Vec<String>>,
        branches: Vec<CompiledBranch>,
        gated: HashSet<String>,
        schema: StateSchema,
    ) -> Self {
        Self {
            name,
            steps,
            order,
            predecessors,
            branches,
            gated,
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the workflow over a fresh state seeded with `initial`.
    ///
    /// The first step failure aborts the whole invocation; a partially
    /// filled state is never returned as success.
    pub async fn invoke(&self, initial: NodeUpdate) -> Result<WorkflowState, WorkflowError> {
        let mut state = WorkflowState::new(self.schema.clone());
        state.apply(initial);

        let mut completed: HashSet<String> = HashSet::new();
        let mut selected: HashSet<String> = HashSet::new();
        let mut suppressed: HashSet<String> = HashSet::new();

        loop {
            let wave: Vec<&str> = self
                .order
                .iter()
                .map(String::as_str)
                .filter(|id| !completed.contains(*id) && !suppressed.contains(*id))
                .filter(|id| self.runnable(id, &completed, &selected))
                .collect();
            if wave.is_empty() {
                break;
            }

            log::debug!("workflow '{}' wave: {:?}", self.name, wave);

            let results = join_all(wave.iter().map(|id| self.steps[*id].run(&state))).await;
            for (id, result) in wave.iter().zip(results) {
                let update = result?;
                state.apply(update);
                completed.insert(id.to_string());
                log::debug!("node '{}' completed", id);
            }

            // Single-shot routing for branches whose source just finished
            for branch in &self.branches {
                if !wave.contains(&branch.source.as_str()) {
                    continue;
                }
                let label = branch.decide(&state);
                let target = branch.targets[label].clone();
                log::info!(
                    "branch on '{}' decided '{}' -> '{}'",
                    branch.source,
                    label,
                    target
                );
                selected.insert(target.clone());
                for other in branch.targets.values() {
                    if *other != target && !selected.contains(other) {
                        suppressed.insert(other.clone());
                    }
                }
            }

            self.propagate_suppression(&mut suppressed, &selected);
        }

        // Everything not routed away must have run
        let stalled: Vec<String> = self
            .order
            .iter()
            .filter(|id| !completed.contains(*id) && !suppressed.contains(*id))
            .cloned()
            .collect();
        if !stalled.is_empty() {
            return Err(WorkflowError::Stalled(stalled));
        }

        Ok(state)
    }

    fn runnable(&self, id: &str, completed: &HashSet<String>, selected: &HashSet<String>) -> bool {
        if self.gated.contains(id) && !selected.contains(id) {
            return false;
        }
        match self.predecessors.get(id) {
            Some(preds) => preds.iter().all(|p| completed.contains(p)),
            None => true,
        }
    }

    /// A join whose predecessor was routed away can never fire; mark it (and
    /// anything downstream of it alone) as suppressed too, so the run ends
    /// cleanly instead of reporting a stall. The same goes for targets whose
    /// every possible selecting branch has a suppressed source.
    fn propagate_suppression(&self, suppressed: &mut HashSet<String>, selected: &HashSet<String>) {
        loop {
            let mut grew = false;
            for id in &self.order {
                if suppressed.contains(id) || selected.contains(id) {
                    continue;
                }
                if let Some(preds) = self.predecessors.get(id) {
                    if preds.iter().any(|p| suppressed.contains(p)) {
                        suppressed.insert(id.clone());
                        grew = true;
                    }
                }
            }
            for id in &self.order {
                if !self.gated.contains(id) || suppressed.contains(id) || selected.contains(id) {
                    continue;
                }
                let selectable = self.branches.iter().any(|b| {
                    !suppressed.contains(&b.source) && b.targets.values().any(|t| t == id)
                });
                if !selectable {
                    suppressed.insert(id.clone());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::workflow::graph::compile::compile;
    use crate::insight::workflow::graph::types::{
        edge, BranchDef, BranchRule, GraphDef, NodeDef, END, START,
    };
    use crate::insight::workflow::state::Reducer;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Appends a marker to the accumulating `trail` field
    struct TrailStep {
        marker: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl TrailStep {
        fn node(id: &str, marker: &'static str) -> (NodeDef, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let step = Self {
                marker,
                calls: calls.clone(),
            };
            (NodeDef::new(id, Arc::new(step)), calls)
        }
    }

    #[async_trait]
    impl Step for TrailStep {
        async fn run(&self, _state: &WorkflowState) -> Result<NodeUpdate, WorkflowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut update = Map::new();
            update.insert("trail".to_string(), json!(self.marker));
            Ok(update)
        }
    }

    /// Copies the current trail length into its own field, to observe joins
    struct JoinObserver;

    #[async_trait]
    impl Step for JoinObserver {
        async fn run(&self, state: &WorkflowState) -> Result<NodeUpdate, WorkflowError> {
            let seen = state
                .get("trail")
                .and_then(Value::as_array)
                .map(|a| a.len())
                .unwrap_or(0);
            let mut update = Map::new();
            update.insert("seen_at_join".to_string(), json!(seen));
            Ok(update)
        }
    }

    struct FailingStep;

    #[async_trait]
    impl Step for FailingStep {
        async fn run(&self, _state: &WorkflowState) -> Result<NodeUpdate, WorkflowError> {
            Err(WorkflowError::InvalidInput("boom".to_string()))
        }
    }

    fn trail_schema() -> StateSchema {
        StateSchema::new().field("trail", Reducer::Append)
    }

    #[tokio::test]
    async fn test_fan_out_fan_in_waits_for_all() {
        let (a, _) = TrailStep::node("a", "a");
        let (b, _) = TrailStep::node("b", "b");
        let (c, _) = TrailStep::node("c", "c");
        let def = GraphDef {
            name: "join".to_string(),
            nodes: vec![a, b, c, NodeDef::new("join", Arc::new(JoinObserver))],
            edges: vec![
                edge(START, "a"),
                edge(START, "b"),
                edge(START, "c"),
                edge("a", "join"),
                edge("b", "join"),
                edge("c", "join"),
                edge("join", END),
            ],
            branches: vec![],
            state: trail_schema(),
        };

        let state = compile(&def).unwrap().invoke(Map::new()).await.unwrap();

        // The join observed every contribution, none was lost
        assert_eq!(state.get("seen_at_join"), Some(&json!(3)));
        assert_eq!(
            state.get("trail").and_then(Value::as_array).unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn test_sequential_chain_runs_in_order() {
        let (a, _) = TrailStep::node("a", "a");
        let (b, _) = TrailStep::node("b", "b");
        let def = GraphDef {
            name: "chain".to_string(),
            nodes: vec![b, a],
            edges: vec![edge(START, "a"), edge("a", "b"), edge("b", END)],
            branches: vec![],
            state: trail_schema(),
        };

        let state = compile(&def).unwrap().invoke(Map::new()).await.unwrap();
        assert_eq!(state.get("trail"), Some(&json!(["a", "b"])));
    }

    #[tokio::test]
    async fn test_branch_routes_one_target_and_suppresses_other() {
        let (src, _) = TrailStep::node("src", "src");
        let (yes, yes_calls) = TrailStep::node("yes", "yes");
        let (no, no_calls) = TrailStep::node("no", "no");
        let def = GraphDef {
            name: "routed".to_string(),
            nodes: vec![src, yes, no],
            edges: vec![edge(START, "src"), edge("yes", END), edge("no", END)],
            branches: vec![BranchDef {
                source: "src".to_string(),
                rules: vec![BranchRule::new("trail != null", "hit")],
                default: "miss".to_string(),
                targets: [
                    ("hit".to_string(), "yes".to_string()),
                    ("miss".to_string(), "no".to_string()),
                ]
                .into(),
            }],
            state: trail_schema(),
        };

        compile(&def).unwrap().invoke(Map::new()).await.unwrap();

        assert_eq!(yes_calls.load(Ordering::SeqCst), 1);
        assert_eq!(no_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_branch_default_when_no_rule_matches() {
        let (src, _) = TrailStep::node("src", "src");
        let (yes, yes_calls) = TrailStep::node("yes", "yes");
        let (no, no_calls) = TrailStep::node("no", "no");
        let def = GraphDef {
            name: "defaulted".to_string(),
            nodes: vec![src, yes, no],
            edges: vec![edge(START, "src"), edge("yes", END), edge("no", END)],
            branches: vec![BranchDef {
                source: "src".to_string(),
                rules: vec![BranchRule::new("trail == null", "hit")],
                default: "miss".to_string(),
                targets: [
                    ("hit".to_string(), "yes".to_string()),
                    ("miss".to_string(), "no".to_string()),
                ]
                .into(),
            }],
            state: trail_schema(),
        };

        // src appended to trail before the decision, so the rule misses
        compile(&def).unwrap().invoke(Map::new()).await.unwrap();

        assert_eq!(yes_calls.load(Ordering::SeqCst), 0);
        assert_eq!(no_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_suppression_propagates_past_dead_joins() {
        // src -> (branch) -> dead -> tail; tail must not stall the run
        let (src, _) = TrailStep::node("src", "src");
        let (live, live_calls) = TrailStep::node("live", "live");
        let (dead, dead_calls) = TrailStep::node("dead", "dead");
        let (tail, tail_calls) = TrailStep::node("tail", "tail");
        let def = GraphDef {
            name: "dead-route".to_string(),
            nodes: vec![src, live, dead, tail],
            edges: vec![
                edge(START, "src"),
                edge("dead", "tail"),
                edge("live", END),
                edge("tail", END),
            ],
            branches: vec![BranchDef {
                source: "src".to_string(),
                rules: vec![],
                default: "ok".to_string(),
                targets: [
                    ("ok".to_string(), "live".to_string()),
                    ("bad".to_string(), "dead".to_string()),
                ]
                .into(),
            }],
            state: trail_schema(),
        };

        compile(&def).unwrap().invoke(Map::new()).await.unwrap();

        assert_eq!(live_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dead_calls.load(Ordering::SeqCst), 0);
        assert_eq!(tail_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_step_failure_aborts_invocation() {
        let (before, before_calls) = TrailStep::node("before", "before");
        let (after, after_calls) = TrailStep::node("after", "after");
        let def = GraphDef {
            name: "fails".to_string(),
            nodes: vec![before, NodeDef::new("bad", Arc::new(FailingStep)), after],
            edges: vec![
                edge(START, "before"),
                edge("before", "bad"),
                edge("bad", "after"),
                edge("after", END),
            ],
            branches: vec![],
            state: trail_schema(),
        };

        let result = compile(&def).unwrap().invoke(Map::new()).await;
        assert!(result.is_err());
        assert_eq!(before_calls.load(Ordering::SeqCst), 1);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invocations_do_not_share_state() {
        let (a, calls) = TrailStep::node("a", "a");
        let def = GraphDef {
            name: "isolated".to_string(),
            nodes: vec![a],
            edges: vec![edge(START, "a"), edge("a", END)],
            branches: vec![],
            state: trail_schema(),
        };
        let workflow = compile(&def).unwrap();

        let first = workflow.invoke(Map::new()).await.unwrap();
        let second = workflow.invoke(Map::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.get("trail"), Some(&json!(["a"])));
        assert_eq!(second.get("trail"), Some(&json!(["a"])));
    }

    #[tokio::test]
    async fn test_initial_fields_visible_to_first_wave() {
        let def = GraphDef {
            name: "seeded".to_string(),
            nodes: vec![NodeDef::new("join", Arc::new(JoinObserver))],
            edges: vec![edge(START, "join"), edge("join", END)],
            branches: vec![],
            state: trail_schema(),
        };
        let mut initial = Map::new();
        initial.insert("trail".to_string(), json!(["seeded"]));

        let state = compile(&def).unwrap().invoke(initial).await.unwrap();
        assert_eq!(state.get("seen_at_join"), Some(&json!(1)));
    }
}

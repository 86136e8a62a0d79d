// SPDX-License-Identifier: MIT

//! Graph validation
//!
//! [compile] is a pure function over a [GraphDef]: it either proves the
//! definition structurally sound and hands back an executable [Workflow],
//! or rejects it with a [GraphValidationError]. Nothing invalid reaches
//! the executor.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::executor::{CompiledBranch, Workflow};
use super::types::{GraphDef, Step, END, START};
use crate::insight::workflow::error::GraphValidationError;
use crate::insight::workflow::predicate;

pub fn compile(def: &GraphDef) -> Result<Workflow, GraphValidationError> {
    let declared: Vec<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();

    // Duplicate ids
    let mut seen = HashSet::new();
    for id in &declared {
        if !seen.insert(*id) {
            return Err(GraphValidationError::DuplicateNode(id.to_string()));
        }
    }

    // Edges must reference declared nodes, START only as a source, END only
    // as a sink
    for edge in &def.edges {
        let context = format!("edge '{}' -> '{}'", edge.from, edge.to);
        if edge.from != START && !seen.contains(edge.from.as_str()) {
            return Err(GraphValidationError::UnknownNode {
                referenced: edge.from.clone(),
                context,
            });
        }
        if edge.to != END && !seen.contains(edge.to.as_str()) {
            return Err(GraphValidationError::UnknownNode {
                referenced: edge.to.clone(),
                context,
            });
        }
    }

    if !def.edges.iter().any(|e| e.from == START) {
        return Err(GraphValidationError::NoEntry);
    }

    // Branches: source and targets declared, every outcome label mapped,
    // every rule parseable
    let mut branches = Vec::new();
    for branch in &def.branches {
        if !seen.contains(branch.source.as_str()) {
            return Err(GraphValidationError::UnknownNode {
                referenced: branch.source.clone(),
                context: "branch source".to_string(),
            });
        }
        for (label, target) in &branch.targets {
            if !seen.contains(target.as_str()) {
                return Err(GraphValidationError::UnknownNode {
                    referenced: target.clone(),
                    context: format!("branch target for outcome '{}'", label),
                });
            }
        }
        let mut rules = Vec::new();
        for rule in &branch.rules {
            if !branch.targets.contains_key(&rule.then) {
                return Err(GraphValidationError::UnmappedOutcome {
                    node: branch.source.clone(),
                    label: rule.then.clone(),
                });
            }
            let expr = predicate::parse(&rule.when).map_err(|reason| {
                GraphValidationError::InvalidRule {
                    node: branch.source.clone(),
                    reason,
                }
            })?;
            rules.push((expr, rule.then.clone()));
        }
        if !branch.targets.contains_key(&branch.default) {
            return Err(GraphValidationError::UnmappedOutcome {
                node: branch.source.clone(),
                label: branch.default.clone(),
            });
        }
        branches.push(CompiledBranch {
            source: branch.source.clone(),
            rules,
            default: branch.default.clone(),
            targets: branch.targets.clone(),
        });
    }

    // Dependency edges between real nodes: declared edges plus one edge per
    // branch routing
    let mut successors: HashMap<String, Vec<String>> = HashMap::new();
    let mut push_edge = |from: &str, to: &str| {
        let entry = successors.entry(from.to_string()).or_default();
        if !entry.iter().any(|t| t == to) {
            entry.push(to.to_string());
        }
    };
    for edge in &def.edges {
        if edge.to != END {
            push_edge(&edge.from, &edge.to);
        }
    }
    for branch in &def.branches {
        for target in branch.targets.values() {
            push_edge(&branch.source, target);
        }
    }

    // Every node must be reachable from START; this also guarantees every
    // non-start node has an incoming edge or branch route
    let mut reached: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([START.to_string()]);
    while let Some(current) = queue.pop_front() {
        if let Some(next) = successors.get(&current) {
            for n in next {
                if reached.insert(n.clone()) {
                    queue.push_back(n.clone());
                }
            }
        }
    }
    for id in &declared {
        if !reached.contains(*id) {
            return Err(GraphValidationError::Unreachable(id.to_string()));
        }
    }

    // Kahn's algorithm over real-node edges; seeded and processed in
    // declaration order so execution order is deterministic
    let mut indegree: HashMap<String, usize> =
        declared.iter().map(|id| (id.to_string(), 0)).collect();
    for (from, next) in &successors {
        if from == START {
            continue;
        }
        for to in next {
            *indegree.get_mut(to).expect("validated above") += 1;
        }
    }
    let mut ready: VecDeque<String> = declared
        .iter()
        .filter(|id| indegree[**id] == 0)
        .map(|id| id.to_string())
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(declared.len());
    while let Some(current) = ready.pop_front() {
        if let Some(next) = successors.get(&current) {
            for to in next {
                let d = indegree.get_mut(to).expect("validated above");
                *d -= 1;
                if *d == 0 {
                    ready.push_back(to.clone());
                }
            }
        }
        order.push(current);
    }
    if order.len() < declared.len() {
        let cycle: Vec<String> = declared
            .iter()
            .filter(|id| !order.iter().any(|o| o == **id))
            .map(|id| id.to_string())
            .collect();
        return Err(GraphValidationError::CircularDependency(cycle));
    }

    // Join bookkeeping: predecessors over regular edges, plus the set of
    // nodes that only run once a branch selects them
    let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();
    for edge in &def.edges {
        if edge.from == START || edge.to == END {
            continue;
        }
        predecessors
            .entry(edge.to.clone())
            .or_default()
            .push(edge.from.clone());
    }
    let gated: HashSet<String> = def
        .branches
        .iter()
        .flat_map(|b| b.targets.values().cloned())
        .collect();

    let steps: HashMap<String, Arc<dyn Step>> = def
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.step.clone()))
        .collect();

    Ok(Workflow::new(
        def.name.clone(),
        steps,
        order,
        predecessors,
        branches,
        gated,
        def.state.clone(),
    ))
}

// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::schema::{Reducer, StateSchema};

/// A step's partial contribution to the state: field name to new value.
pub type NodeUpdate = Map<String, Value>;

/// The single mutable record threaded through one workflow invocation.
///
/// Steps never touch it directly; they return a [NodeUpdate] which the
/// engine merges in through the schema's reducer table.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    fields: HashMap<String, Value>,
    schema: StateSchema,
}

impl WorkflowState {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            fields: HashMap::new(),
            schema,
        }
    }

    /// Merge one partial update into the state.
    pub fn apply(&mut self, update: NodeUpdate) {
        for (key, value) in update {
            match self.schema.reducer(&key) {
                Reducer::Overwrite => {
                    self.fields.insert(key, value);
                }
                Reducer::Append => {
                    let slot = self.fields.entry(key).or_insert_with(|| Value::Array(vec![]));
                    if let Value::Array(items) = slot {
                        match value {
                            Value::Array(new_items) => items.extend(new_items),
                            other => items.push(other),
                        }
                    }
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Resolve a dot-notation path into nested values (e.g. `result.score`)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

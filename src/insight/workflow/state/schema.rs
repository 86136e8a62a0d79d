// SPDX-License-Identifier: MIT

//! The merge-rule table for workflow state fields

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a step's write to a field combines with the value already there.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Append to an array; concurrent contributors never clobber each other
    Append,
}

/// Declares which fields deviate from plain overwrite semantics.
///
/// Fields absent from the table use [Reducer::Overwrite]. The table is part
/// of the workflow definition, not per-invocation state.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    reducers: HashMap<String, Reducer>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a merge rule for a field, consuming and returning the schema
    /// so definitions read as a literal table.
    pub fn field(mut self, name: &str, reducer: Reducer) -> Self {
        self.reducers.insert(name.to_string(), reducer);
        self
    }

    pub fn reducer(&self, name: &str) -> Reducer {
        self.reducers.get(name).copied().unwrap_or_default()
    }

    /// Names of all accumulating fields, for diagnostics
    pub fn accumulating(&self) -> impl Iterator<Item = &str> {
        self.reducers
            .iter()
            .filter(|(_, r)| **r == Reducer::Append)
            .map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reducer_is_overwrite() {
        let schema = StateSchema::new();
        assert_eq!(schema.reducer("anything"), Reducer::Overwrite);
    }

    #[test]
    fn test_declared_field() {
        let schema = StateSchema::new().field("scores", Reducer::Append);
        assert_eq!(schema.reducer("scores"), Reducer::Append);
        assert_eq!(schema.reducer("other"), Reducer::Overwrite);
    }

    #[test]
    fn test_accumulating_lists_append_fields() {
        let schema = StateSchema::new()
            .field("scores", Reducer::Append)
            .field("title", Reducer::Overwrite);
        let acc: Vec<&str> = schema.accumulating().collect();
        assert_eq!(acc, vec!["scores"]);
    }
}

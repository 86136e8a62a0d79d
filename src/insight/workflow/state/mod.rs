// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - the per-field merge-rule table
//! - `WorkflowState` - runtime state storage that merges partial updates

mod schema;
mod store;

pub use schema::{Reducer, StateSchema};
pub use store::{NodeUpdate, WorkflowState};

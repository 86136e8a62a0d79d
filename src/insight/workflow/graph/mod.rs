// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! A workflow is declared as plain data ([GraphDef]), validated once by
//! [compile], and the resulting [Workflow] is invoked per input.

mod compile;
mod executor;
mod types;

pub use compile::compile;
pub use executor::Workflow;
pub use types::{edge, BranchDef, BranchRule, Edge, GraphDef, NodeDef, Step, END, START};

// SPDX-License-Identifier: MIT

//! insight-rs - essay evaluation over a fan-out/fan-in workflow graph
//!
//! The crate is split in two:
//! - [eval] - the evaluator collaborator boundary (trait, wire contract,
//!   OpenAI-backed implementation)
//! - [insight] - the workflow engine, the essay pipeline built on it, and
//!   the HTTP presentation boundary

pub mod eval;
pub mod insight;

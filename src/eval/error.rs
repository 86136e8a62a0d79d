// SPDX-License-Identifier: MIT

//! Typed errors for the evaluator boundary

use thiserror::Error;

/// Failures calling or interpreting the evaluator collaborator.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// Response failed schema or range constraints
    #[error("evaluator response violates contract: {0}")]
    Contract(String),

    /// Network or timeout failure reaching the evaluator
    #[error("evaluator transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Evaluator answered with a non-success status
    #[error("evaluator API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Missing or invalid evaluator configuration
    #[error("evaluator configuration error: {0}")]
    Config(String),
}

impl EvaluatorError {
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

// src/error.rs
use thiserror::Error;

use crate::models::ActionType;

/// Errors surfaced at the call boundary of the decision and learning engines.
///
/// Numeric degeneracies and missing history are handled inside the engines with
/// fallback values; only contract violations and infrastructure failures end up here.
#[derive(Debug, Error)]
pub enum AgenticError {
    #[error("No actions available to select from")]
    EmptyActionSet,

    #[error("Invalid parameters for action {action_type}: expected {expected}")]
    InvalidParameters {
        action_type: ActionType,
        expected: &'static str,
    },

    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(&'static str),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type AgenticResult<T> = Result<T, AgenticError>;

//! Error types for asynchronous state access.

use crate::request::{PayloadShape, RequestType};
use crate::types::StateKind;
use thiserror::Error;

/// Main error type for state operations.
///
/// Errors are `Clone` because a single failed request may be observed by
/// several continuations registered on the same future.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StateError {
    // --- Programming errors (raised synchronously at submission) ---
    #[error("Request {request_type:?} is not valid for {kind:?} state '{state}'")]
    KindMismatch {
        state: String,
        kind: StateKind,
        request_type: RequestType,
    },

    #[error("Request {request_type:?} expects a {expected:?} payload, got {got:?}")]
    PayloadMismatch {
        request_type: RequestType,
        expected: PayloadShape,
        got: PayloadShape,
    },

    #[error("No current key set for state request")]
    NoCurrentKey,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // --- Store operation failures (delivered through the future) ---
    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Unexpected response for {request_type:?}: {got}")]
    UnexpectedResponse {
        request_type: RequestType,
        got: String,
    },

    // --- Lifecycle ---
    #[error("Execution controller is closed")]
    Closed,

    #[error("Failed to start state executor: {0}")]
    Executor(String),

    #[error("Request was abandoned before completion")]
    Abandoned,
}

impl StateError {
    /// Whether this error is a programming error rather than a runtime failure.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            StateError::KindMismatch { .. }
                | StateError::PayloadMismatch { .. }
                | StateError::NoCurrentKey
                | StateError::InvalidConfig(_)
        )
    }
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StateError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StateError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StateError::Deserialization(e.to_string())
    }
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

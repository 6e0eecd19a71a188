//! The seam between keyed state handles and request execution.
//!
//! A handle never talks to a store directly. It hands each operation to a
//! [`StateRequestHandler`], either through the non-blocking
//! [`handle_request`](StateRequestHandler::handle_request) or the blocking
//! [`handle_request_sync`](StateRequestHandler::handle_request_sync). Both
//! entry points give the same per-key ordering guarantee; the blocking one
//! is the non-blocking one followed by an immediate wait.
//!
//! Implementations:
//! - [`AsyncExecutionController`](crate::controller::AsyncExecutionController)
//!   queues requests per key and executes them on a worker pool.
//! - [`DirectRequestHandler`] executes every request immediately on the
//!   calling thread.

mod direct;

pub use direct::DirectRequestHandler;

use crate::error::Result;
use crate::future::StateFuture;
use crate::request::{RequestPayload, RequestType, StateResponse};
use crate::types::StateInfo;

/// Accepts state requests for the current key.
///
/// The current key is a property of the handler, set by the surrounding
/// runtime before each record is processed. `namespace` arrives already
/// encoded: it is captured at submission time.
pub trait StateRequestHandler<K>: Send + Sync {
    /// Submit a request and return its future without blocking.
    ///
    /// Programming errors (kind or payload mismatch, no current key) are
    /// returned here and never through the future.
    fn handle_request(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<StateFuture<StateResponse>>;

    /// Submit a request and block until it is resolved.
    fn handle_request_sync(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<StateResponse>;
}

/// Reject requests that do not fit the state they target.
pub(crate) fn validate_request(
    state: &StateInfo,
    request_type: RequestType,
    payload: &RequestPayload,
) -> Result<()> {
    request_type.validate(state.id.as_str(), state.kind, payload)
}

//! The backing store consumed by the dispatcher.
//!
//! Stores execute point operations addressed by (state, key, namespace) and
//! report success or failure per request. They must be safe for concurrent
//! use: the dispatcher's executor threads call into one shared store.

mod memory;

pub use memory::MemoryStateStore;

use crate::error::Result;
use crate::request::{RequestEnvelope, StateResponse};

/// A backing store for keyed state.
pub trait StateStore<K>: Send + Sync {
    /// Execute a single request.
    fn execute(&self, request: &RequestEnvelope<K>) -> Result<StateResponse>;

    /// Execute several requests, returning one result per request in order.
    ///
    /// Requests in one batch never share a (key, state) pair. Stores with a
    /// native multi-operation call should override this.
    fn execute_batch(&self, requests: &[RequestEnvelope<K>]) -> Vec<Result<StateResponse>> {
        requests.iter().map(|request| self.execute(request)).collect()
    }
}

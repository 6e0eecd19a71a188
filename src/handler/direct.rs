//! Handler executing requests immediately on the calling thread.

use super::{validate_request, StateRequestHandler};
use crate::error::{Result, StateError};
use crate::future::StateFuture;
use crate::request::{RequestEnvelope, RequestPayload, RequestType, StateResponse};
use crate::store::StateStore;
use crate::types::{Key, RequestId, Sequence, StateInfo};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A [`StateRequestHandler`] without a dispatcher.
///
/// Every request runs against the store before the call returns, so the
/// asynchronous entry point hands back an already-resolved future. Ordering
/// is trivially submission order.
pub struct DirectRequestHandler<K> {
    store: Arc<dyn StateStore<K>>,
    current_key: Mutex<Option<K>>,
    next_id: AtomicU64,
}

impl<K: Key> DirectRequestHandler<K> {
    pub fn new(store: Arc<dyn StateStore<K>>) -> Self {
        Self {
            store,
            current_key: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Set the key subsequent requests are scoped to.
    pub fn set_current_key(&self, key: K) {
        *self.current_key.lock() = Some(key);
    }

    pub fn current_key(&self) -> Option<K> {
        self.current_key.lock().clone()
    }

    fn execute(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<Result<StateResponse>> {
        validate_request(state, request_type, &payload)?;
        let key = self.current_key().ok_or(StateError::NoCurrentKey)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = RequestEnvelope {
            id: RequestId(id),
            key,
            state: state.id.clone(),
            kind: state.kind,
            namespace,
            request_type,
            payload,
            sequence: Sequence(id),
        };

        let result = self.store.execute(&envelope);
        if let Err(e) = &result {
            tracing::warn!(state = %envelope.state, key = ?envelope.key, "state request failed: {e}");
        }
        Ok(result)
    }
}

impl<K: Key> StateRequestHandler<K> for DirectRequestHandler<K> {
    fn handle_request(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<StateFuture<StateResponse>> {
        let result = self.execute(state, request_type, namespace, payload)?;
        Ok(StateFuture::from_result(result))
    }

    fn handle_request_sync(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<StateResponse> {
        self.execute(state, request_type, namespace, payload)?
    }
}

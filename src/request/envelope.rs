//! The unit of work submitted to the dispatcher.

use super::{RequestPayload, RequestType};
use crate::types::{Key, RequestId, Sequence, StateId, StateKind};

/// One state request, bound to its key and namespace at submission time.
///
/// Envelopes are immutable once built. The namespace is stored already
/// encoded, so later namespace switches on the submitting handle cannot
/// affect it.
#[derive(Clone, Debug)]
pub struct RequestEnvelope<K> {
    pub id: RequestId,
    pub key: K,
    pub state: StateId,
    pub kind: StateKind,
    pub namespace: Vec<u8>,
    pub request_type: RequestType,
    pub payload: RequestPayload,
    /// Position within the (key, state) queue. Strictly increasing per pair.
    pub sequence: Sequence,
}

impl<K: Key> RequestEnvelope<K> {
    /// The (key, state) pair whose queue this request belongs to.
    pub fn queue_key(&self) -> (K, StateId) {
        (self.key.clone(), self.state.clone())
    }
}

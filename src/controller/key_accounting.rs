//! Per (key, state) request queues.

use crate::request::RequestEnvelope;
use crate::types::{Key, Sequence, StateId};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

/// Queue of one (key, state) pair.
struct PairQueue<K> {
    /// Sequence of the request currently issued for this pair.
    issued: Sequence,
    /// Requests submitted after the issued one, in sequence order.
    waiting: VecDeque<RequestEnvelope<K>>,
}

/// Tracks which (key, state) pairs have a request issued and holds the
/// requests waiting behind it.
///
/// At most one request per pair is issued at any time. A pair with nothing
/// issued has no entry.
pub(crate) struct KeyAccounting<K> {
    queues: HashMap<(K, StateId), PairQueue<K>>,
}

impl<K: Key> KeyAccounting<K> {
    pub fn new() -> Self {
        Self {
            queues: HashMap::new(),
        }
    }

    /// Admit a newly submitted request.
    ///
    /// Returns the request if it may be issued right away; otherwise it is
    /// queued behind the pair's issued request.
    pub fn admit(&mut self, envelope: RequestEnvelope<K>) -> Option<RequestEnvelope<K>> {
        match self.queues.entry(envelope.queue_key()) {
            Entry::Vacant(vacant) => {
                vacant.insert(PairQueue {
                    issued: envelope.sequence,
                    waiting: VecDeque::new(),
                });
                Some(envelope)
            }
            Entry::Occupied(mut occupied) => {
                let queue = occupied.get_mut();
                let last = queue.waiting.back().map_or(queue.issued, |e| e.sequence);
                assert!(
                    envelope.sequence > last,
                    "ordering violation: {:?} submitted after {:?} for key {:?} state {}",
                    envelope.sequence,
                    last,
                    envelope.key,
                    envelope.state
                );
                queue.waiting.push_back(envelope);
                None
            }
        }
    }

    /// Record completion of the issued request of a pair.
    ///
    /// Returns the next request of the pair, now issued, if one is waiting.
    ///
    /// # Panics
    ///
    /// If `sequence` is not the pair's issued request. That would mean a
    /// request completed out of order, which the dispatcher must never allow.
    pub fn release(
        &mut self,
        key: &K,
        state: &StateId,
        sequence: Sequence,
    ) -> Option<RequestEnvelope<K>> {
        let pair = (key.clone(), state.clone());
        let Some(queue) = self.queues.get_mut(&pair) else {
            panic!("ordering violation: {sequence:?} completed for key {key:?} state {state} with nothing issued");
        };
        assert_eq!(
            queue.issued, sequence,
            "ordering violation: completion out of order for key {key:?} state {state}"
        );

        match queue.waiting.pop_front() {
            Some(next) => {
                queue.issued = next.sequence;
                Some(next)
            }
            None => {
                self.queues.remove(&pair);
                None
            }
        }
    }

    /// Number of pairs with a request issued.
    pub fn active_pairs(&self) -> usize {
        self.queues.len()
    }

    /// Number of requests waiting behind an issued one.
    pub fn waiting_count(&self) -> usize {
        self.queues.values().map(|q| q.waiting.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RequestPayload, RequestType};
    use crate::types::{RequestId, StateKind};

    fn envelope(key: u32, state: &str, seq: u64) -> RequestEnvelope<u32> {
        RequestEnvelope {
            id: RequestId(seq),
            key,
            state: StateId::new(state),
            kind: StateKind::Value,
            namespace: Vec::new(),
            request_type: RequestType::ValueGet,
            payload: RequestPayload::Empty,
            sequence: Sequence(seq),
        }
    }

    #[test]
    fn test_first_request_issues_immediately() {
        let mut accounting = KeyAccounting::new();
        assert!(accounting.admit(envelope(1, "s", 0)).is_some());
        assert_eq!(accounting.active_pairs(), 1);
    }

    #[test]
    fn test_same_pair_waits() {
        let mut accounting = KeyAccounting::new();
        assert!(accounting.admit(envelope(1, "s", 0)).is_some());
        assert!(accounting.admit(envelope(1, "s", 1)).is_none());
        assert!(accounting.admit(envelope(1, "s", 2)).is_none());
        assert_eq!(accounting.waiting_count(), 2);

        let next = accounting.release(&1, &StateId::new("s"), Sequence(0)).unwrap();
        assert_eq!(next.sequence, Sequence(1));
        let next = accounting.release(&1, &StateId::new("s"), Sequence(1)).unwrap();
        assert_eq!(next.sequence, Sequence(2));
        assert!(accounting.release(&1, &StateId::new("s"), Sequence(2)).is_none());
        assert_eq!(accounting.active_pairs(), 0);
    }

    #[test]
    fn test_other_keys_and_states_independent() {
        let mut accounting = KeyAccounting::new();
        assert!(accounting.admit(envelope(1, "a", 0)).is_some());
        assert!(accounting.admit(envelope(2, "a", 1)).is_some());
        assert!(accounting.admit(envelope(1, "b", 2)).is_some());
        assert_eq!(accounting.active_pairs(), 3);
        assert_eq!(accounting.waiting_count(), 0);
    }

    #[test]
    #[should_panic(expected = "ordering violation")]
    fn test_out_of_order_completion_is_fatal() {
        let mut accounting = KeyAccounting::new();
        accounting.admit(envelope(1, "s", 0));
        accounting.admit(envelope(1, "s", 1));
        accounting.release(&1, &StateId::new("s"), Sequence(1));
    }

    #[test]
    #[should_panic(expected = "ordering violation")]
    fn test_completion_without_issue_is_fatal() {
        let mut accounting = KeyAccounting::<u32>::new();
        accounting.release(&1, &StateId::new("s"), Sequence(0));
    }
}

//! Per-key ownership by records.

use crate::request::RequestEnvelope;
use crate::types::Key;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

/// Identity of one record's processing, from `set_current_key` until its
/// last request, including follow-ups issued by continuations, completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RecordId(pub u64);

/// The record the processing thread is working on.
#[derive(Clone, Debug)]
pub(crate) struct RecordContext<K> {
    pub id: RecordId,
    pub key: K,
}

struct Record<K> {
    key: K,
    /// Submitted requests of this record that have not completed.
    pending: usize,
}

struct KeyOwner<K> {
    record: RecordId,
    /// Requests of later records on this key, in submission order.
    parked: VecDeque<(RecordId, RequestEnvelope<K>)>,
}

/// Lets one record at a time work on a key.
///
/// The first record to submit a request for a key owns it until its last
/// pending request completes. Requests of later records on that key are
/// parked and released, record by record, as owners finish. Follow-ups
/// issued from a continuation belong to the record of the request that
/// completed, so a read-modify-write chain never interleaves with a later
/// record's requests on the same key.
pub(crate) struct RecordAccounting<K> {
    records: HashMap<RecordId, Record<K>>,
    owners: HashMap<K, KeyOwner<K>>,
}

impl<K: Key> RecordAccounting<K> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Count a new request of `record`.
    ///
    /// Returns the request if its record owns the key; otherwise it is
    /// parked until the record before it finishes.
    pub fn admit(
        &mut self,
        record: RecordId,
        envelope: RequestEnvelope<K>,
    ) -> Option<RequestEnvelope<K>> {
        self.records
            .entry(record)
            .or_insert_with(|| Record {
                key: envelope.key.clone(),
                pending: 0,
            })
            .pending += 1;

        match self.owners.entry(envelope.key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(KeyOwner {
                    record,
                    parked: VecDeque::new(),
                });
                Some(envelope)
            }
            Entry::Occupied(occupied) if occupied.get().record == record => Some(envelope),
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().parked.push_back((record, envelope));
                None
            }
        }
    }

    /// Record completion of one request of `record`.
    ///
    /// When that was the record's last pending request, the key passes to
    /// the next parked record and its requests are returned, in order.
    ///
    /// # Panics
    ///
    /// If `record` has nothing pending, or finishes while not owning its key.
    pub fn complete(&mut self, record: RecordId) -> Vec<RequestEnvelope<K>> {
        let Some(entry) = self.records.get_mut(&record) else {
            panic!("ordering violation: completion for {record:?} with nothing pending");
        };
        entry.pending -= 1;
        if entry.pending > 0 {
            return Vec::new();
        }
        let Some(Record { key, .. }) = self.records.remove(&record) else {
            return Vec::new();
        };

        let Entry::Occupied(mut owner) = self.owners.entry(key) else {
            panic!("ordering violation: {record:?} finished without owning its key");
        };
        assert_eq!(
            owner.get().record,
            record,
            "ordering violation: {record:?} finished while another record owns its key"
        );

        let Some(next) = owner.get().parked.front().map(|(id, _)| *id) else {
            owner.remove();
            return Vec::new();
        };
        let owner = owner.get_mut();
        owner.record = next;
        let mut released = Vec::new();
        while owner.parked.front().map_or(false, |(id, _)| *id == next) {
            if let Some((_, envelope)) = owner.parked.pop_front() {
                released.push(envelope);
            }
        }
        released
    }

    /// Keys owned by a record with requests pending.
    pub fn busy_keys(&self) -> usize {
        self.owners.len()
    }

    /// Requests waiting for an earlier record on their key to finish.
    pub fn parked_count(&self) -> usize {
        self.owners.values().map(|o| o.parked.len()).sum()
    }
}

//! In-memory state store.

use super::StateStore;
use crate::error::{Result, StateError};
use crate::request::{RequestEnvelope, RequestPayload, RequestType, StateResponse};
use crate::types::{Key, StateId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Address of one stored entry.
type EntryKey<K> = (StateId, K, Vec<u8>);

/// Per-request artificial latency.
type LatencyFn<K> = dyn Fn(&RequestEnvelope<K>) -> Duration + Send + Sync;

/// Stored contents of one (state, key, namespace).
#[derive(Clone, Debug)]
enum Stored {
    Value(Vec<u8>),
    List(Vec<Vec<u8>>),
    Map(BTreeMap<Vec<u8>, Vec<u8>>),
}

impl Stored {
    fn describe(&self) -> &'static str {
        match self {
            Stored::Value(_) => "value",
            Stored::List(_) => "list",
            Stored::Map(_) => "map",
        }
    }
}

/// Concurrent in-memory store.
///
/// Entries are kept per (state, key, namespace). Latency can be injected per
/// request to simulate a remote backend.
pub struct MemoryStateStore<K> {
    entries: RwLock<HashMap<EntryKey<K>, Stored>>,
    latency: Option<Box<LatencyFn<K>>>,
    executed: AtomicU64,
}

impl<K: Key> MemoryStateStore<K> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            latency: None,
            executed: AtomicU64::new(0),
        }
    }

    /// Create an empty store that sleeps for `latency(request)` before
    /// executing each request.
    pub fn with_latency<F>(latency: F) -> Self
    where
        F: Fn(&RequestEnvelope<K>) -> Duration + Send + Sync + 'static,
    {
        Self {
            latency: Some(Box::new(latency)),
            ..Self::new()
        }
    }

    /// Number of non-empty stored entries.
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Number of requests executed so far.
    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    fn apply(&self, request: &RequestEnvelope<K>) -> Result<StateResponse> {
        let entry_key: EntryKey<K> = (
            request.state.clone(),
            request.key.clone(),
            request.namespace.clone(),
        );

        match request.request_type {
            RequestType::Clear => {
                self.entries.write().remove(&entry_key);
                Ok(StateResponse::Done)
            }

            RequestType::ValueGet => match self.entries.read().get(&entry_key) {
                None => Ok(StateResponse::Value(None)),
                Some(Stored::Value(value)) => Ok(StateResponse::Value(Some(value.clone()))),
                Some(other) => Err(wrong_contents(request, "value", other)),
            },

            RequestType::ValueUpdate => {
                let value = single_value(request)?;
                let mut entries = self.entries.write();
                match entries.get(&entry_key) {
                    None | Some(Stored::Value(_)) => {
                        entries.insert(entry_key, Stored::Value(value));
                        Ok(StateResponse::Done)
                    }
                    Some(other) => Err(wrong_contents(request, "value", other)),
                }
            }

            RequestType::ListGet => match self.entries.read().get(&entry_key) {
                None => Ok(StateResponse::Values(Vec::new())),
                Some(Stored::List(items)) => Ok(StateResponse::Values(items.clone())),
                Some(other) => Err(wrong_contents(request, "list", other)),
            },

            RequestType::ListAdd | RequestType::ListAddAll => {
                let items = match &request.payload {
                    RequestPayload::Value(value) => vec![value.clone()],
                    RequestPayload::Values(values) => values.clone(),
                    _ => return Err(malformed(request)),
                };
                if items.is_empty() {
                    return Ok(StateResponse::Done);
                }
                let mut entries = self.entries.write();
                match entries
                    .entry(entry_key)
                    .or_insert_with(|| Stored::List(Vec::new()))
                {
                    Stored::List(list) => {
                        list.extend(items);
                        Ok(StateResponse::Done)
                    }
                    other => Err(wrong_contents(request, "list", other)),
                }
            }

            RequestType::ListUpdate => {
                let RequestPayload::Values(items) = &request.payload else {
                    return Err(malformed(request));
                };
                let mut entries = self.entries.write();
                if let Some(other @ (Stored::Value(_) | Stored::Map(_))) = entries.get(&entry_key) {
                    return Err(wrong_contents(request, "list", other));
                }
                if items.is_empty() {
                    entries.remove(&entry_key);
                } else {
                    entries.insert(entry_key, Stored::List(items.clone()));
                }
                Ok(StateResponse::Done)
            }

            RequestType::MapGet | RequestType::MapContains => {
                let RequestPayload::UserKey(user_key) = &request.payload else {
                    return Err(malformed(request));
                };
                let entries = self.entries.read();
                let value = match entries.get(&entry_key) {
                    None => None,
                    Some(Stored::Map(map)) => map.get(user_key),
                    Some(other) => return Err(wrong_contents(request, "map", other)),
                };
                if request.request_type == RequestType::MapGet {
                    Ok(StateResponse::Value(value.cloned()))
                } else {
                    Ok(StateResponse::Bool(value.is_some()))
                }
            }

            RequestType::MapPut | RequestType::MapPutAll => {
                let new_entries = match &request.payload {
                    RequestPayload::Entry { key, value } => vec![(key.clone(), value.clone())],
                    RequestPayload::Entries(entries) => entries.clone(),
                    _ => return Err(malformed(request)),
                };
                if new_entries.is_empty() {
                    return Ok(StateResponse::Done);
                }
                let mut entries = self.entries.write();
                match entries
                    .entry(entry_key)
                    .or_insert_with(|| Stored::Map(BTreeMap::new()))
                {
                    Stored::Map(map) => {
                        map.extend(new_entries);
                        Ok(StateResponse::Done)
                    }
                    other => Err(wrong_contents(request, "map", other)),
                }
            }

            RequestType::MapRemove => {
                let RequestPayload::UserKey(user_key) = &request.payload else {
                    return Err(malformed(request));
                };
                let mut entries = self.entries.write();
                let now_empty = match entries.get_mut(&entry_key) {
                    None => false,
                    Some(Stored::Map(map)) => {
                        map.remove(user_key);
                        map.is_empty()
                    }
                    Some(other) => return Err(wrong_contents(request, "map", other)),
                };
                if now_empty {
                    entries.remove(&entry_key);
                }
                Ok(StateResponse::Done)
            }

            RequestType::MapIter => match self.entries.read().get(&entry_key) {
                None => Ok(StateResponse::Entries(Vec::new())),
                Some(Stored::Map(map)) => Ok(StateResponse::Entries(
                    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                )),
                Some(other) => Err(wrong_contents(request, "map", other)),
            },

            RequestType::MapIsEmpty => match self.entries.read().get(&entry_key) {
                None => Ok(StateResponse::Bool(true)),
                Some(Stored::Map(map)) => Ok(StateResponse::Bool(map.is_empty())),
                Some(other) => Err(wrong_contents(request, "map", other)),
            },
        }
    }
}

impl<K: Key> Default for MemoryStateStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> StateStore<K> for MemoryStateStore<K> {
    fn execute(&self, request: &RequestEnvelope<K>) -> Result<StateResponse> {
        if let Some(latency) = &self.latency {
            let delay = latency(request);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.apply(request)
    }
}

fn single_value<K>(request: &RequestEnvelope<K>) -> Result<Vec<u8>> {
    match &request.payload {
        RequestPayload::Value(value) => Ok(value.clone()),
        _ => Err(malformed(request)),
    }
}

fn malformed<K>(request: &RequestEnvelope<K>) -> StateError {
    StateError::Store(format!(
        "malformed {:?} payload for {:?} on state '{}'",
        request.payload.shape(),
        request.request_type,
        request.state
    ))
}

fn wrong_contents<K>(request: &RequestEnvelope<K>, expected: &str, found: &Stored) -> StateError {
    StateError::Store(format!(
        "state '{}' holds a {} where a {} was expected",
        request.state,
        found.describe(),
        expected
    ))
}

//! Core types for keyed state access.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Identity that scopes state and ordering guarantees.
///
/// Any cloneable, hashable, thread-safe value can serve as a key.
pub trait Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Key for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Identity of a declared state instance.
///
/// Derived from the state's logical name, so two handles declared with the
/// same name address the same stored state and share one ordering queue.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(Arc<str>);

impl StateId {
    pub fn new(name: &str) -> Self {
        StateId(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateId({})", self.0)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of a declared state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    Value,
    List,
    Map,
}

/// The identity and kind of a state, as seen by request handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateInfo {
    pub id: StateId,
    pub kind: StateKind,
}

/// Position of a request within its (key, state) queue.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }
}

/// Unique identifier of a submitted request within one controller.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

/// Namespace for states that are not scoped below the key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoidNamespace;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_id_equality_follows_name() {
        let a = StateId::new("counter");
        let b = StateId::new("counter");
        assert_eq!(a, b);
        assert_ne!(a, StateId::new("other"));
        assert_eq!(a.to_string(), "counter");
    }

    #[test]
    fn test_sequence_next() {
        assert_eq!(Sequence(0).next(), Sequence(1));
        assert!(Sequence(1) > Sequence(0));
    }
}

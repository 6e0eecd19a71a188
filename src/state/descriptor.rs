//! Immutable metadata of declared states.

use crate::serializer::SerializerFactory;
use crate::types::{StateId, StateInfo, StateKind};
use std::fmt;
use std::sync::Arc;

struct DescriptorInner<V> {
    id: StateId,
    kind: StateKind,
    serializer: SerializerFactory<V>,
}

/// Name, kind and value serializer of a declared state.
///
/// Created once when the state is declared and shared by every handle for
/// it. Cloning is cheap and never copies the metadata.
pub struct StateDescriptor<V> {
    inner: Arc<DescriptorInner<V>>,
}

impl<V: 'static> StateDescriptor<V> {
    fn new(name: &str, kind: StateKind, serializer: SerializerFactory<V>) -> Self {
        Self {
            inner: Arc::new(DescriptorInner {
                id: StateId::new(name),
                kind,
                serializer,
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.id.as_str()
    }

    pub fn id(&self) -> &StateId {
        &self.inner.id
    }

    pub fn kind(&self) -> StateKind {
        self.inner.kind
    }

    /// Serializer of stored values. For map states, of the map values.
    pub fn serializer(&self) -> &SerializerFactory<V> {
        &self.inner.serializer
    }

    pub fn info(&self) -> StateInfo {
        StateInfo {
            id: self.inner.id.clone(),
            kind: self.inner.kind,
        }
    }
}

impl<V> Clone for StateDescriptor<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for StateDescriptor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDescriptor")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

/// Descriptor of a single-value state.
#[derive(Clone, Debug)]
pub struct ValueStateDescriptor<V>(StateDescriptor<V>);

impl<V: 'static> ValueStateDescriptor<V> {
    pub fn new(name: &str, serializer: SerializerFactory<V>) -> Self {
        Self(StateDescriptor::new(name, StateKind::Value, serializer))
    }

    pub fn descriptor(&self) -> &StateDescriptor<V> {
        &self.0
    }
}

/// Descriptor of a list state.
#[derive(Clone, Debug)]
pub struct ListStateDescriptor<V>(StateDescriptor<V>);

impl<V: 'static> ListStateDescriptor<V> {
    pub fn new(name: &str, serializer: SerializerFactory<V>) -> Self {
        Self(StateDescriptor::new(name, StateKind::List, serializer))
    }

    pub fn descriptor(&self) -> &StateDescriptor<V> {
        &self.0
    }
}

/// Descriptor of a map state: user-key serializer plus value descriptor.
#[derive(Clone, Debug)]
pub struct MapStateDescriptor<UK, UV> {
    values: StateDescriptor<UV>,
    key_serializer: SerializerFactory<UK>,
}

impl<UK: 'static, UV: 'static> MapStateDescriptor<UK, UV> {
    pub fn new(
        name: &str,
        key_serializer: SerializerFactory<UK>,
        value_serializer: SerializerFactory<UV>,
    ) -> Self {
        Self {
            values: StateDescriptor::new(name, StateKind::Map, value_serializer),
            key_serializer,
        }
    }

    pub fn descriptor(&self) -> &StateDescriptor<UV> {
        &self.values
    }

    pub fn key_serializer(&self) -> &SerializerFactory<UK> {
        &self.key_serializer
    }
}

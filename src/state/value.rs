use super::descriptor::ValueStateDescriptor;
use super::keyed::{KeyedState, StateHandle};
use crate::error::Result;
use crate::future::StateFuture;
use crate::handler::StateRequestHandler;
use crate::request::{RequestPayload, RequestType, StateResponse};
use crate::serializer::SerializerFactory;
use crate::types::{Key, VoidNamespace};
use std::sync::Arc;

/// A single value per key and namespace.
#[derive(Clone, Debug)]
pub struct ValueState<K, N, V> {
    base: KeyedState<K, N, V>,
}

impl<K: Key, V: Clone + Send + 'static> ValueState<K, VoidNamespace, V> {
    pub fn new(handler: Arc<dyn StateRequestHandler<K>>, descriptor: ValueStateDescriptor<V>) -> Self {
        Self {
            base: KeyedState::new(handler, descriptor.descriptor().clone()),
        }
    }
}

impl<K: Key, N: 'static, V: Clone + Send + 'static> ValueState<K, N, V> {
    pub fn with_namespace(
        handler: Arc<dyn StateRequestHandler<K>>,
        descriptor: ValueStateDescriptor<V>,
        namespace_serializer: SerializerFactory<N>,
        namespace: N,
    ) -> Self {
        Self {
            base: KeyedState::with_namespace(
                handler,
                descriptor.descriptor().clone(),
                namespace_serializer,
                namespace,
            ),
        }
    }

    /// Read the value; `None` when nothing is stored.
    pub fn async_value(&self) -> Result<StateFuture<Option<V>>> {
        self.base
            .request(RequestType::ValueGet, RequestPayload::Empty, self.decoder())
    }

    pub fn value(&self) -> Result<Option<V>> {
        self.base
            .request_sync(RequestType::ValueGet, RequestPayload::Empty, self.decoder())
    }

    /// Replace the value. The value is encoded before this returns.
    pub fn async_update(&self, value: &V) -> Result<StateFuture<()>> {
        let payload = RequestPayload::Value(self.base.encode_value(value)?);
        self.base.request(RequestType::ValueUpdate, payload, |response| {
            response.into_done(RequestType::ValueUpdate)
        })
    }

    pub fn update(&self, value: &V) -> Result<()> {
        let payload = RequestPayload::Value(self.base.encode_value(value)?);
        self.base.request_sync(RequestType::ValueUpdate, payload, |response| {
            response.into_done(RequestType::ValueUpdate)
        })
    }

    fn decoder(&self) -> impl FnOnce(StateResponse) -> Result<Option<V>> + Send + 'static {
        let serializer = self.base.descriptor().serializer().clone();
        move |response| {
            response
                .into_value(RequestType::ValueGet)?
                .map(|bytes| serializer.deserialize(&bytes))
                .transpose()
        }
    }
}

impl<K: Key, N: 'static, V: 'static> StateHandle<K, N, V> for ValueState<K, N, V> {
    fn keyed_state(&self) -> &KeyedState<K, N, V> {
        &self.base
    }

    fn keyed_state_mut(&mut self) -> &mut KeyedState<K, N, V> {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use crate::handler::DirectRequestHandler;
    use crate::serializer::Serializer;
    use crate::store::{MemoryStateStore, StateStore};

    fn handler() -> Arc<DirectRequestHandler<u64>> {
        let store: Arc<dyn StateStore<u64>> = Arc::new(MemoryStateStore::<u64>::new());
        let handler = Arc::new(DirectRequestHandler::<u64>::new(store));
        handler.set_current_key(7);
        handler
    }

    #[test]
    fn test_update_then_read() {
        let state = ValueState::new(
            handler(),
            ValueStateDescriptor::<String>::new("name", SerializerFactory::json()),
        );

        assert_eq!(state.value().unwrap(), None);
        state.update(&"alice".to_string()).unwrap();
        assert_eq!(state.value().unwrap(), Some("alice".to_string()));

        let read = state.async_value().unwrap();
        assert_eq!(read.try_get(), Some(Ok(Some("alice".to_string()))));
    }

    #[test]
    fn test_values_are_per_key() {
        let handler = handler();
        let state = ValueState::new(
            handler.clone(),
            ValueStateDescriptor::<i64>::new("count", SerializerFactory::msgpack()),
        );

        state.update(&1).unwrap();
        handler.set_current_key(9);
        assert_eq!(state.value().unwrap(), None);
        state.update(&2).unwrap();

        handler.set_current_key(7);
        assert_eq!(state.value().unwrap(), Some(1));
    }

    #[test]
    fn test_clear_through_handle_trait() {
        let mut state = ValueState::with_namespace(
            handler(),
            ValueStateDescriptor::<i64>::new("count", SerializerFactory::json()),
            SerializerFactory::<u32>::json(),
            1,
        );

        state.update(&10).unwrap();
        state.set_current_namespace(2);
        state.update(&20).unwrap();
        state.clear().unwrap();

        assert_eq!(state.value().unwrap(), None);
        state.set_current_namespace(1);
        assert_eq!(state.value().unwrap(), Some(10));
    }

    struct BrokenSerializer;

    impl Serializer<i64> for BrokenSerializer {
        fn serialize(&self, _value: &i64) -> Result<Vec<u8>> {
            Err(StateError::Serialization("unsupported".into()))
        }

        fn deserialize(&self, _bytes: &[u8]) -> Result<i64> {
            Err(StateError::Deserialization("unsupported".into()))
        }
    }

    #[test]
    fn test_encoding_failure_is_synchronous() {
        let state = ValueState::new(
            handler(),
            ValueStateDescriptor::<i64>::new("broken", SerializerFactory::new(|| BrokenSerializer)),
        );

        assert!(matches!(
            state.async_update(&1),
            Err(StateError::Serialization(_))
        ));
    }
}

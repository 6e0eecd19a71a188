use super::descriptor::ListStateDescriptor;
use super::keyed::{decode_all, KeyedState, StateHandle};
use crate::error::Result;
use crate::future::StateFuture;
use crate::handler::StateRequestHandler;
use crate::request::{RequestPayload, RequestType, StateResponse};
use crate::serializer::SerializerFactory;
use crate::types::{Key, VoidNamespace};
use std::sync::Arc;

/// An ordered list of values per key and namespace.
///
/// An absent list reads as empty.
#[derive(Clone, Debug)]
pub struct ListState<K, N, V> {
    base: KeyedState<K, N, V>,
}

impl<K: Key, V: Clone + Send + 'static> ListState<K, VoidNamespace, V> {
    pub fn new(handler: Arc<dyn StateRequestHandler<K>>, descriptor: ListStateDescriptor<V>) -> Self {
        Self {
            base: KeyedState::new(handler, descriptor.descriptor().clone()),
        }
    }
}

impl<K: Key, N: 'static, V: Clone + Send + 'static> ListState<K, N, V> {
    pub fn with_namespace(
        handler: Arc<dyn StateRequestHandler<K>>,
        descriptor: ListStateDescriptor<V>,
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

    pub fn async_get(&self) -> Result<StateFuture<Vec<V>>> {
        self.base
            .request(RequestType::ListGet, RequestPayload::Empty, self.decoder())
    }

    pub fn get(&self) -> Result<Vec<V>> {
        self.base
            .request_sync(RequestType::ListGet, RequestPayload::Empty, self.decoder())
    }

    /// Append one value.
    pub fn async_add(&self, value: &V) -> Result<StateFuture<()>> {
        let payload = RequestPayload::Value(self.base.encode_value(value)?);
        self.base.request(RequestType::ListAdd, payload, done(RequestType::ListAdd))
    }

    pub fn add(&self, value: &V) -> Result<()> {
        let payload = RequestPayload::Value(self.base.encode_value(value)?);
        self.base
            .request_sync(RequestType::ListAdd, payload, done(RequestType::ListAdd))
    }

    /// Append all values in order.
    pub fn async_add_all(&self, values: &[V]) -> Result<StateFuture<()>> {
        let payload = RequestPayload::Values(self.base.encode_values(values)?);
        self.base
            .request(RequestType::ListAddAll, payload, done(RequestType::ListAddAll))
    }

    pub fn add_all(&self, values: &[V]) -> Result<()> {
        let payload = RequestPayload::Values(self.base.encode_values(values)?);
        self.base
            .request_sync(RequestType::ListAddAll, payload, done(RequestType::ListAddAll))
    }

    /// Replace the whole list. An empty slice removes it.
    pub fn async_update(&self, values: &[V]) -> Result<StateFuture<()>> {
        let payload = RequestPayload::Values(self.base.encode_values(values)?);
        self.base
            .request(RequestType::ListUpdate, payload, done(RequestType::ListUpdate))
    }

    pub fn update(&self, values: &[V]) -> Result<()> {
        let payload = RequestPayload::Values(self.base.encode_values(values)?);
        self.base
            .request_sync(RequestType::ListUpdate, payload, done(RequestType::ListUpdate))
    }

    fn decoder(&self) -> impl FnOnce(StateResponse) -> Result<Vec<V>> + Send + 'static {
        let serializer = self.base.descriptor().serializer().clone();
        move |response| decode_all(&serializer, response.into_values(RequestType::ListGet)?)
    }
}

fn done(request_type: RequestType) -> impl FnOnce(StateResponse) -> Result<()> + Send + 'static {
    move |response| response.into_done(request_type)
}

impl<K: Key, N: 'static, V: 'static> StateHandle<K, N, V> for ListState<K, N, V> {
    fn keyed_state(&self) -> &KeyedState<K, N, V> {
        &self.base
    }

    fn keyed_state_mut(&mut self) -> &mut KeyedState<K, N, V> {
        &mut self.base
    }
}

//! Base handle shared by all keyed state kinds.

use super::descriptor::StateDescriptor;
use crate::error::Result;
use crate::future::StateFuture;
use crate::handler::StateRequestHandler;
use crate::request::{RequestPayload, RequestType, StateResponse};
use crate::serializer::{Serializer, SerializerFactory};
use crate::types::{Key, VoidNamespace};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Typed front-end over a [`StateRequestHandler`] for one declared state.
///
/// The handle carries no key: requests always apply to the handler's
/// current key. The namespace is a plain field of the handle and is encoded
/// when a request is submitted, so changing it afterwards never affects
/// requests already in flight.
pub struct KeyedState<K, N, V> {
    handler: Arc<dyn StateRequestHandler<K>>,
    descriptor: StateDescriptor<V>,
    namespace_serializer: SerializerFactory<N>,
    current_namespace: N,
}

impl<K: Key, V: 'static> KeyedState<K, VoidNamespace, V> {
    /// Handle for a state that does not use namespaces.
    pub fn new(handler: Arc<dyn StateRequestHandler<K>>, descriptor: StateDescriptor<V>) -> Self {
        Self::with_namespace(
            handler,
            descriptor,
            SerializerFactory::void_namespace(),
            VoidNamespace,
        )
    }
}

impl<K: Key, N: 'static, V: 'static> KeyedState<K, N, V> {
    pub fn with_namespace(
        handler: Arc<dyn StateRequestHandler<K>>,
        descriptor: StateDescriptor<V>,
        namespace_serializer: SerializerFactory<N>,
        namespace: N,
    ) -> Self {
        Self {
            handler,
            descriptor,
            namespace_serializer,
            current_namespace: namespace,
        }
    }

    pub fn descriptor(&self) -> &StateDescriptor<V> {
        &self.descriptor
    }

    pub fn request_handler(&self) -> &Arc<dyn StateRequestHandler<K>> {
        &self.handler
    }

    /// Namespace applied to subsequent requests.
    pub fn set_current_namespace(&mut self, namespace: N) {
        self.current_namespace = namespace;
    }

    pub fn current_namespace(&self) -> &N {
        &self.current_namespace
    }

    /// The calling thread's value serializer instance.
    pub fn value_serializer(&self) -> Rc<dyn Serializer<V>> {
        self.descriptor.serializer().get()
    }

    /// Submit a raw request under the current namespace.
    pub fn handle_request(
        &self,
        request_type: RequestType,
        payload: RequestPayload,
    ) -> Result<StateFuture<StateResponse>> {
        let namespace = self.encode_namespace()?;
        self.handler
            .handle_request(&self.descriptor.info(), request_type, namespace, payload)
    }

    /// Submit a raw request and block until it resolves.
    pub fn handle_request_sync(
        &self,
        request_type: RequestType,
        payload: RequestPayload,
    ) -> Result<StateResponse> {
        let namespace = self.encode_namespace()?;
        self.handler
            .handle_request_sync(&self.descriptor.info(), request_type, namespace, payload)
    }

    /// Submit a request whose response is converted by `decode` once it
    /// arrives.
    ///
    /// `decode` runs wherever the future resolves; for the execution
    /// controller that is the processing thread.
    pub fn request<T, F>(
        &self,
        request_type: RequestType,
        payload: RequestPayload,
        decode: F,
    ) -> Result<StateFuture<T>>
    where
        T: Clone + Send + 'static,
        F: FnOnce(StateResponse) -> Result<T> + Send + 'static,
    {
        Ok(self.handle_request(request_type, payload)?.then_try_apply(decode))
    }

    /// Blocking form of [`KeyedState::request`], with the same conversion.
    pub fn request_sync<T, F>(
        &self,
        request_type: RequestType,
        payload: RequestPayload,
        decode: F,
    ) -> Result<T>
    where
        F: FnOnce(StateResponse) -> Result<T>,
    {
        decode(self.handle_request_sync(request_type, payload)?)
    }

    /// Remove the value under the current key and namespace.
    pub fn async_clear(&self) -> Result<StateFuture<()>> {
        self.request(RequestType::Clear, RequestPayload::Empty, |response| {
            response.into_done(RequestType::Clear)
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.request_sync(RequestType::Clear, RequestPayload::Empty, |response| {
            response.into_done(RequestType::Clear)
        })
    }

    pub(crate) fn encode_value(&self, value: &V) -> Result<Vec<u8>> {
        self.descriptor.serializer().serialize(value)
    }

    pub(crate) fn encode_values(&self, values: &[V]) -> Result<Vec<Vec<u8>>> {
        let serializer = self.value_serializer();
        values.iter().map(|value| serializer.serialize(value)).collect()
    }

    fn encode_namespace(&self) -> Result<Vec<u8>> {
        self.namespace_serializer.serialize(&self.current_namespace)
    }
}

impl<K, N: Clone, V> Clone for KeyedState<K, N, V> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            descriptor: self.descriptor.clone(),
            namespace_serializer: self.namespace_serializer.clone(),
            current_namespace: self.current_namespace.clone(),
        }
    }
}

impl<K, N: fmt::Debug, V> fmt::Debug for KeyedState<K, N, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedState")
            .field("descriptor", &self.descriptor)
            .field("namespace", &self.current_namespace)
            .finish()
    }
}

/// Operations common to every typed state handle.
pub trait StateHandle<K: Key, N: 'static, V: 'static> {
    fn keyed_state(&self) -> &KeyedState<K, N, V>;

    fn keyed_state_mut(&mut self) -> &mut KeyedState<K, N, V>;

    fn set_current_namespace(&mut self, namespace: N) {
        self.keyed_state_mut().set_current_namespace(namespace);
    }

    fn async_clear(&self) -> Result<StateFuture<()>> {
        self.keyed_state().async_clear()
    }

    fn clear(&self) -> Result<()> {
        self.keyed_state().clear()
    }
}

/// Decode a list of stored values with the calling thread's serializer.
pub(crate) fn decode_all<V: 'static>(
    serializer: &SerializerFactory<V>,
    items: Vec<Vec<u8>>,
) -> Result<Vec<V>> {
    let instance = serializer.get();
    items.iter().map(|bytes| instance.deserialize(bytes)).collect()
}

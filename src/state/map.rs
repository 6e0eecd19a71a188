use super::descriptor::MapStateDescriptor;
use super::keyed::{decode_all, KeyedState, StateHandle};
use crate::error::Result;
use crate::future::StateFuture;
use crate::handler::StateRequestHandler;
use crate::request::{RequestPayload, RequestType, StateResponse};
use crate::serializer::SerializerFactory;
use crate::types::{Key, VoidNamespace};
use std::sync::Arc;

/// A map from user keys to values, per key and namespace.
///
/// Entries are addressed by the encoded user key, so iteration follows the
/// store's ordering of encoded keys rather than any order of `UK` itself.
#[derive(Clone, Debug)]
pub struct MapState<K, N, UK, UV> {
    base: KeyedState<K, N, UV>,
    key_serializer: SerializerFactory<UK>,
}

impl<K, UK, UV> MapState<K, VoidNamespace, UK, UV>
where
    K: Key,
    UK: Clone + Send + 'static,
    UV: Clone + Send + 'static,
{
    pub fn new(
        handler: Arc<dyn StateRequestHandler<K>>,
        descriptor: MapStateDescriptor<UK, UV>,
    ) -> Self {
        Self {
            base: KeyedState::new(handler, descriptor.descriptor().clone()),
            key_serializer: descriptor.key_serializer().clone(),
        }
    }
}

impl<K, N, UK, UV> MapState<K, N, UK, UV>
where
    K: Key,
    N: 'static,
    UK: Clone + Send + 'static,
    UV: Clone + Send + 'static,
{
    pub fn with_namespace(
        handler: Arc<dyn StateRequestHandler<K>>,
        descriptor: MapStateDescriptor<UK, UV>,
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
            key_serializer: descriptor.key_serializer().clone(),
        }
    }

    pub fn async_get(&self, user_key: &UK) -> Result<StateFuture<Option<UV>>> {
        let payload = self.user_key(user_key)?;
        self.base.request(RequestType::MapGet, payload, self.value_decoder())
    }

    pub fn get(&self, user_key: &UK) -> Result<Option<UV>> {
        let payload = self.user_key(user_key)?;
        self.base
            .request_sync(RequestType::MapGet, payload, self.value_decoder())
    }

    pub fn async_contains(&self, user_key: &UK) -> Result<StateFuture<bool>> {
        let payload = self.user_key(user_key)?;
        self.base.request(RequestType::MapContains, payload, |response| {
            response.into_bool(RequestType::MapContains)
        })
    }

    pub fn contains(&self, user_key: &UK) -> Result<bool> {
        let payload = self.user_key(user_key)?;
        self.base.request_sync(RequestType::MapContains, payload, |response| {
            response.into_bool(RequestType::MapContains)
        })
    }

    pub fn async_put(&self, user_key: &UK, value: &UV) -> Result<StateFuture<()>> {
        let payload = self.entry(user_key, value)?;
        self.base.request(RequestType::MapPut, payload, |response| {
            response.into_done(RequestType::MapPut)
        })
    }

    pub fn put(&self, user_key: &UK, value: &UV) -> Result<()> {
        let payload = self.entry(user_key, value)?;
        self.base.request_sync(RequestType::MapPut, payload, |response| {
            response.into_done(RequestType::MapPut)
        })
    }

    pub fn async_put_all(&self, entries: &[(UK, UV)]) -> Result<StateFuture<()>> {
        let payload = self.encode_entries(entries)?;
        self.base.request(RequestType::MapPutAll, payload, |response| {
            response.into_done(RequestType::MapPutAll)
        })
    }

    pub fn put_all(&self, entries: &[(UK, UV)]) -> Result<()> {
        let payload = self.encode_entries(entries)?;
        self.base.request_sync(RequestType::MapPutAll, payload, |response| {
            response.into_done(RequestType::MapPutAll)
        })
    }

    pub fn async_remove(&self, user_key: &UK) -> Result<StateFuture<()>> {
        let payload = self.user_key(user_key)?;
        self.base.request(RequestType::MapRemove, payload, |response| {
            response.into_done(RequestType::MapRemove)
        })
    }

    pub fn remove(&self, user_key: &UK) -> Result<()> {
        let payload = self.user_key(user_key)?;
        self.base.request_sync(RequestType::MapRemove, payload, |response| {
            response.into_done(RequestType::MapRemove)
        })
    }

    /// All entries of the map.
    pub fn async_entries(&self) -> Result<StateFuture<Vec<(UK, UV)>>> {
        self.base
            .request(RequestType::MapIter, RequestPayload::Empty, self.entries_decoder())
    }

    pub fn entries(&self) -> Result<Vec<(UK, UV)>> {
        self.base
            .request_sync(RequestType::MapIter, RequestPayload::Empty, self.entries_decoder())
    }

    pub fn async_keys(&self) -> Result<StateFuture<Vec<UK>>> {
        self.base
            .request(RequestType::MapIter, RequestPayload::Empty, self.keys_decoder())
    }

    pub fn keys(&self) -> Result<Vec<UK>> {
        self.base
            .request_sync(RequestType::MapIter, RequestPayload::Empty, self.keys_decoder())
    }

    pub fn async_values(&self) -> Result<StateFuture<Vec<UV>>> {
        self.base
            .request(RequestType::MapIter, RequestPayload::Empty, self.values_decoder())
    }

    pub fn values(&self) -> Result<Vec<UV>> {
        self.base
            .request_sync(RequestType::MapIter, RequestPayload::Empty, self.values_decoder())
    }

    pub fn async_is_empty(&self) -> Result<StateFuture<bool>> {
        self.base
            .request(RequestType::MapIsEmpty, RequestPayload::Empty, |response| {
                response.into_bool(RequestType::MapIsEmpty)
            })
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.base
            .request_sync(RequestType::MapIsEmpty, RequestPayload::Empty, |response| {
                response.into_bool(RequestType::MapIsEmpty)
            })
    }

    fn user_key(&self, user_key: &UK) -> Result<RequestPayload> {
        Ok(RequestPayload::UserKey(self.key_serializer.serialize(user_key)?))
    }

    fn entry(&self, user_key: &UK, value: &UV) -> Result<RequestPayload> {
        Ok(RequestPayload::Entry {
            key: self.key_serializer.serialize(user_key)?,
            value: self.base.encode_value(value)?,
        })
    }

    fn encode_entries(&self, entries: &[(UK, UV)]) -> Result<RequestPayload> {
        let keys = self.key_serializer.get();
        let values = self.base.value_serializer();
        let encoded = entries
            .iter()
            .map(|(k, v)| Ok((keys.serialize(k)?, values.serialize(v)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(RequestPayload::Entries(encoded))
    }

    fn value_decoder(&self) -> impl FnOnce(StateResponse) -> Result<Option<UV>> + Send + 'static {
        let values = self.base.descriptor().serializer().clone();
        move |response| {
            response
                .into_value(RequestType::MapGet)?
                .map(|bytes| values.deserialize(&bytes))
                .transpose()
        }
    }

    fn keys_decoder(&self) -> impl FnOnce(StateResponse) -> Result<Vec<UK>> + Send + 'static {
        let keys = self.key_serializer.clone();
        move |response| {
            let (encoded, _): (Vec<_>, Vec<_>) = response
                .into_entries(RequestType::MapIter)?
                .into_iter()
                .unzip();
            decode_all(&keys, encoded)
        }
    }

    fn values_decoder(&self) -> impl FnOnce(StateResponse) -> Result<Vec<UV>> + Send + 'static {
        let values = self.base.descriptor().serializer().clone();
        move |response| {
            let (_, encoded): (Vec<_>, Vec<_>) = response
                .into_entries(RequestType::MapIter)?
                .into_iter()
                .unzip();
            decode_all(&values, encoded)
        }
    }

    fn entries_decoder(
        &self,
    ) -> impl FnOnce(StateResponse) -> Result<Vec<(UK, UV)>> + Send + 'static {
        let keys = self.key_serializer.clone();
        let values = self.base.descriptor().serializer().clone();
        move |response| {
            let keys = keys.get();
            let values = values.get();
            response
                .into_entries(RequestType::MapIter)?
                .iter()
                .map(|(k, v)| Ok((keys.deserialize(k)?, values.deserialize(v)?)))
                .collect()
        }
    }
}

impl<K, N, UK, UV> StateHandle<K, N, UV> for MapState<K, N, UK, UV>
where
    K: Key,
    N: 'static,
    UV: 'static,
{
    fn keyed_state(&self) -> &KeyedState<K, N, UV> {
        &self.base
    }

    fn keyed_state_mut(&mut self) -> &mut KeyedState<K, N, UV> {
        &mut self.base
    }
}

//! Value serializers and their per-thread instances.
//!
//! Serializers are not required to be thread-safe. A [`SerializerFactory`]
//! is shared freely, but every thread that encodes or decodes state obtains
//! its own instance through [`SerializerFactory::get`], built lazily on
//! first use and cached for the lifetime of that thread.

mod json;
mod msgpack;

pub use json::JsonSerializer;
pub use msgpack::MsgPackSerializer;

use crate::error::Result;
use crate::types::VoidNamespace;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Encodes and decodes values of one type.
pub trait Serializer<T> {
    fn serialize(&self, value: &T) -> Result<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> Result<T>;
}

/// Counter for factory identities.
static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// This thread's serializer instances, by factory id.
    static INSTANCES: RefCell<HashMap<u64, CachedInstance>> = RefCell::new(HashMap::new());
}

/// A per-thread instance and a check for whether its factory still exists.
struct CachedInstance {
    instance: Box<dyn Any>,
    factory_alive: Box<dyn Fn() -> bool>,
}

type Constructor<T> = dyn Fn() -> Box<dyn Serializer<T>> + Send + Sync;

/// Shared recipe for building serializer instances.
pub struct SerializerFactory<T> {
    id: u64,
    constructor: Arc<Constructor<T>>,
}

impl<T: 'static> SerializerFactory<T> {
    /// Create a factory from a constructor.
    pub fn new<F, S>(constructor: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Serializer<T> + 'static,
    {
        Self {
            id: NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed),
            constructor: Arc::new(move || Box::new(constructor()) as Box<dyn Serializer<T>>),
        }
    }

    /// Get the calling thread's instance, constructing it on first use.
    pub fn get(&self) -> Rc<dyn Serializer<T>> {
        INSTANCES.with(|instances| {
            let mut instances = instances.borrow_mut();
            if let Some(cached) = instances
                .get(&self.id)
                .and_then(|cached| cached.instance.downcast_ref::<Rc<dyn Serializer<T>>>())
            {
                return Rc::clone(cached);
            }

            // Instances of dropped factories can never be requested again.
            instances.retain(|_, cached| (cached.factory_alive)());

            let instance: Rc<dyn Serializer<T>> = Rc::from((self.constructor)());
            let factory = Arc::downgrade(&self.constructor);
            instances.insert(
                self.id,
                CachedInstance {
                    instance: Box::new(Rc::clone(&instance)),
                    factory_alive: Box::new(move || factory.strong_count() > 0),
                },
            );
            instance
        })
    }

    /// Encode with the calling thread's instance.
    pub fn serialize(&self, value: &T) -> Result<Vec<u8>> {
        self.get().serialize(value)
    }

    /// Decode with the calling thread's instance.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<T> {
        self.get().deserialize(bytes)
    }
}

impl<T> SerializerFactory<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + 'static,
{
    /// Factory for [`JsonSerializer`].
    pub fn json() -> Self {
        Self::new(JsonSerializer::<T>::new)
    }

    /// Factory for [`MsgPackSerializer`].
    pub fn msgpack() -> Self {
        Self::new(MsgPackSerializer::<T>::new)
    }
}

impl SerializerFactory<VoidNamespace> {
    /// Factory for the empty namespace encoding.
    pub fn void_namespace() -> Self {
        Self::new(|| VoidNamespaceSerializer)
    }
}

impl<T> Clone for SerializerFactory<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            constructor: Arc::clone(&self.constructor),
        }
    }
}

impl<T> fmt::Debug for SerializerFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializerFactory({})", self.id)
    }
}

/// Encodes [`VoidNamespace`] as no bytes.
pub struct VoidNamespaceSerializer;

impl Serializer<VoidNamespace> for VoidNamespaceSerializer {
    fn serialize(&self, _value: &VoidNamespace) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn deserialize(&self, _bytes: &[u8]) -> Result<VoidNamespace> {
        Ok(VoidNamespace)
    }
}

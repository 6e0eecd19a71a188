//! MessagePack value serializer.

use super::Serializer;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::marker::PhantomData;

/// Initial capacity of the scratch buffer.
const SCRATCH_CAPACITY: usize = 256;

/// Serializer storing values as MessagePack.
///
/// Encodes into a reused scratch buffer, so an instance must stay on one
/// thread (it is neither `Sync` nor shared by [`super::SerializerFactory`]).
pub struct MsgPackSerializer<T> {
    scratch: RefCell<Vec<u8>>,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T> MsgPackSerializer<T> {
    pub fn new() -> Self {
        Self {
            scratch: RefCell::new(Vec::with_capacity(SCRATCH_CAPACITY)),
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for MsgPackSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Serializer<T> for MsgPackSerializer<T> {
    fn serialize(&self, value: &T) -> Result<Vec<u8>> {
        let mut scratch = self.scratch.borrow_mut();
        scratch.clear();
        rmp_serde::encode::write(&mut *scratch, value)?;
        Ok(scratch.clone())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;

    #[test]
    fn test_scratch_reuse_does_not_leak_between_values() {
        let serializer = MsgPackSerializer::<String>::new();
        let long = serializer.serialize(&"a much longer string".to_string()).unwrap();
        let short = serializer.serialize(&"x".to_string()).unwrap();

        assert!(short.len() < long.len());
        assert_eq!(serializer.deserialize(&short).unwrap(), "x");
        assert_eq!(serializer.deserialize(&long).unwrap(), "a much longer string");
    }

    #[test]
    fn test_truncated_input() {
        let serializer = MsgPackSerializer::<Vec<u32>>::new();
        let bytes = serializer.serialize(&vec![1, 2, 3]).unwrap();
        let err = serializer.deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, StateError::Deserialization(_)));
    }
}

//! Operation kinds, payloads and responses.

use crate::error::{Result, StateError};
use crate::types::StateKind;
use serde::{Deserialize, Serialize};

/// What the store must do with a request's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RequestType {
    /// Remove everything stored for the key and namespace. Valid on any state.
    Clear,
    /// Read a value state.
    ValueGet,
    /// Overwrite a value state.
    ValueUpdate,
    /// Read every element of a list state.
    ListGet,
    /// Append one element.
    ListAdd,
    /// Append several elements.
    ListAddAll,
    /// Replace the whole list.
    ListUpdate,
    /// Read the value under one user key.
    MapGet,
    /// Check whether a user key is present.
    MapContains,
    /// Insert or overwrite one entry.
    MapPut,
    /// Insert or overwrite several entries.
    MapPutAll,
    /// Remove one user key.
    MapRemove,
    /// Read every entry, ordered by encoded user key.
    MapIter,
    /// Check whether the map has no entries.
    MapIsEmpty,
}

/// Payload variants, without their contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadShape {
    Empty,
    Value,
    Values,
    UserKey,
    Entry,
    Entries,
}

impl RequestType {
    /// The state kind this request applies to, or `None` if it applies to all.
    pub fn state_kind(&self) -> Option<StateKind> {
        match self {
            RequestType::Clear => None,
            RequestType::ValueGet | RequestType::ValueUpdate => Some(StateKind::Value),
            RequestType::ListGet
            | RequestType::ListAdd
            | RequestType::ListAddAll
            | RequestType::ListUpdate => Some(StateKind::List),
            RequestType::MapGet
            | RequestType::MapContains
            | RequestType::MapPut
            | RequestType::MapPutAll
            | RequestType::MapRemove
            | RequestType::MapIter
            | RequestType::MapIsEmpty => Some(StateKind::Map),
        }
    }

    /// Whether the request leaves stored state untouched.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            RequestType::ValueGet
                | RequestType::ListGet
                | RequestType::MapGet
                | RequestType::MapContains
                | RequestType::MapIter
                | RequestType::MapIsEmpty
        )
    }

    /// The payload shape the request must carry.
    pub fn payload_shape(&self) -> PayloadShape {
        match self {
            RequestType::Clear
            | RequestType::ValueGet
            | RequestType::ListGet
            | RequestType::MapIter
            | RequestType::MapIsEmpty => PayloadShape::Empty,
            RequestType::ValueUpdate | RequestType::ListAdd => PayloadShape::Value,
            RequestType::ListAddAll | RequestType::ListUpdate => PayloadShape::Values,
            RequestType::MapGet | RequestType::MapContains | RequestType::MapRemove => {
                PayloadShape::UserKey
            }
            RequestType::MapPut => PayloadShape::Entry,
            RequestType::MapPutAll => PayloadShape::Entries,
        }
    }

    /// Check that this request may be issued against a state of `kind`
    /// carrying `payload`.
    pub fn validate(&self, state: &str, kind: StateKind, payload: &RequestPayload) -> Result<()> {
        if let Some(expected) = self.state_kind() {
            if expected != kind {
                return Err(StateError::KindMismatch {
                    state: state.to_string(),
                    kind,
                    request_type: *self,
                });
            }
        }

        let expected = self.payload_shape();
        let got = payload.shape();
        if expected != got {
            return Err(StateError::PayloadMismatch {
                request_type: *self,
                expected,
                got,
            });
        }
        Ok(())
    }
}

/// Encoded input of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestPayload {
    Empty,
    Value(Vec<u8>),
    Values(Vec<Vec<u8>>),
    UserKey(Vec<u8>),
    Entry { key: Vec<u8>, value: Vec<u8> },
    Entries(Vec<(Vec<u8>, Vec<u8>)>),
}

impl RequestPayload {
    pub fn shape(&self) -> PayloadShape {
        match self {
            RequestPayload::Empty => PayloadShape::Empty,
            RequestPayload::Value(_) => PayloadShape::Value,
            RequestPayload::Values(_) => PayloadShape::Values,
            RequestPayload::UserKey(_) => PayloadShape::UserKey,
            RequestPayload::Entry { .. } => PayloadShape::Entry,
            RequestPayload::Entries(_) => PayloadShape::Entries,
        }
    }
}

/// Encoded result of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateResponse {
    /// The request had no result beyond success.
    Done,
    /// A single, possibly absent, value.
    Value(Option<Vec<u8>>),
    /// An ordered sequence of values.
    Values(Vec<Vec<u8>>),
    Bool(bool),
    /// Key/value pairs ordered by encoded key.
    Entries(Vec<(Vec<u8>, Vec<u8>)>),
}

impl StateResponse {
    pub fn into_done(self, request_type: RequestType) -> Result<()> {
        match self {
            StateResponse::Done => Ok(()),
            other => Err(other.unexpected(request_type)),
        }
    }

    pub fn into_value(self, request_type: RequestType) -> Result<Option<Vec<u8>>> {
        match self {
            StateResponse::Value(value) => Ok(value),
            other => Err(other.unexpected(request_type)),
        }
    }

    pub fn into_values(self, request_type: RequestType) -> Result<Vec<Vec<u8>>> {
        match self {
            StateResponse::Values(values) => Ok(values),
            other => Err(other.unexpected(request_type)),
        }
    }

    pub fn into_bool(self, request_type: RequestType) -> Result<bool> {
        match self {
            StateResponse::Bool(b) => Ok(b),
            other => Err(other.unexpected(request_type)),
        }
    }

    pub fn into_entries(self, request_type: RequestType) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        match self {
            StateResponse::Entries(entries) => Ok(entries),
            other => Err(other.unexpected(request_type)),
        }
    }

    fn unexpected(&self, request_type: RequestType) -> StateError {
        let got = match self {
            StateResponse::Done => "done",
            StateResponse::Value(_) => "value",
            StateResponse::Values(_) => "values",
            StateResponse::Bool(_) => "bool",
            StateResponse::Entries(_) => "entries",
        };
        StateError::UnexpectedResponse {
            request_type,
            got: got.to_string(),
        }
    }
}

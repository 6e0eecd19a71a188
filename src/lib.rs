//! # Keyed State
//!
//! Asynchronous access to keyed state: typed state handles submit requests
//! for the current key, an execution controller batches them and runs them
//! against a pluggable store on a worker pool, and results come back as
//! futures whose continuations run on the processing thread.
//!
//! ## Core Concepts
//!
//! - **State handles**: `ValueState`, `ListState` and `MapState`, bound to a
//!   declared state and a current namespace
//! - **Requests**: self-contained envelopes carrying key, state, namespace,
//!   request type and encoded payload
//! - **Futures**: single-assignment results with chained continuations
//! - **Controller**: per (key, state) ordering, batching, back-pressure and
//!   key context switching for continuations
//!
//! ## Example
//!
//! ```ignore
//! use keyed_state::*;
//!
//! let store = Arc::new(MemoryStateStore::<u64>::new());
//! let controller = AsyncExecutionController::new(store, ControllerConfig::default())?;
//!
//! let visits = MapState::new(
//!     controller.clone(),
//!     MapStateDescriptor::new("visits", SerializerFactory::json(), SerializerFactory::json()),
//! );
//!
//! controller.set_current_key(7);
//! visits.async_put(&"home".to_string(), &1u32)?;
//! let count = visits.async_get(&"home".to_string())?;
//! assert_eq!(controller.wait_for(&count)?, Some(1));
//! controller.close();
//! ```

pub mod controller;
pub mod error;
pub mod future;
pub mod handler;
pub mod request;
pub mod serializer;
pub mod state;
pub mod store;
pub mod types;

// Re-exports
pub use controller::{AsyncExecutionController, ControllerConfig};
pub use error::{Result, StateError};
pub use future::{StateFuture, StatePromise};
pub use handler::{DirectRequestHandler, StateRequestHandler};
pub use request::{PayloadShape, RequestEnvelope, RequestPayload, RequestType, StateResponse};
pub use serializer::{JsonSerializer, MsgPackSerializer, Serializer, SerializerFactory};
pub use state::{
    KeyedState, ListState, ListStateDescriptor, MapState, MapStateDescriptor, StateDescriptor,
    StateHandle, ValueState, ValueStateDescriptor,
};
pub use store::{MemoryStateStore, StateStore};
pub use types::*;

//! Typed keyed state handles.
//!
//! A handle belongs to one declared state and submits requests through a
//! [`StateRequestHandler`](crate::handler::StateRequestHandler). It knows
//! nothing about keys; the handler's current key applies. Values are
//! encoded when a request is submitted and decoded in the continuation that
//! receives the response, each with the serializer instance of the thread
//! doing the work.
//!
//! Every operation comes in two forms: `async_*` returns a
//! [`StateFuture`](crate::future::StateFuture), the plain form blocks until
//! the result is available. Both observe the same results.

mod descriptor;
mod keyed;
mod list;
mod map;
mod value;

pub use descriptor::{ListStateDescriptor, MapStateDescriptor, StateDescriptor, ValueStateDescriptor};
pub use keyed::{KeyedState, StateHandle};
pub use list::ListState;
pub use map::MapState;
pub use value::ValueState;

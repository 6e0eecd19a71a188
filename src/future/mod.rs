//! Single-assignment futures with continuation support.
//!
//! A [`StateFuture`] represents the eventual result of one state operation.
//! It is resolved exactly once through its paired [`StatePromise`]; because
//! `StatePromise::complete` consumes the promise, a second resolution cannot
//! be expressed.
//!
//! Continuations registered before resolution run once, in registration
//! order, on the thread that resolves the promise. Continuations registered
//! after resolution run immediately on the registering thread.
//!
//! # Example
//!
//! ```ignore
//! let (future, promise) = StateFuture::<i64>::pending();
//! let doubled = future.then_apply(|v| v * 2);
//! promise.complete(Ok(21));
//! assert_eq!(doubled.try_get(), Some(Ok(42)));
//! ```

mod combinators;
mod state_future;

pub use state_future::{StateFuture, StatePromise};

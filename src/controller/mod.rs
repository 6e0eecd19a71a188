//! The dispatcher between keyed state handles and the store.
//!
//! Requests are queued per (key, state) pair and issued one at a time per
//! pair; ready requests from different pairs are collected into batches and
//! executed in parallel by a fixed pool of executor threads. Results flow
//! back through a mailbox that the processing thread drains, so every
//! continuation runs on the processing thread.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStateStore::new());
//! let controller = AsyncExecutionController::new(store, ControllerConfig::default())?;
//! let handler: Arc<dyn StateRequestHandler<u64>> = controller.clone();
//!
//! let counter = ValueState::new(handler, ValueStateDescriptor::new("counter", SerializerFactory::json()));
//! controller.set_current_key(7);
//! counter.async_update(&5)?;
//! let read = counter.async_value()?;
//! assert_eq!(controller.wait_for(&read)?, Some(5));
//! ```

mod config;
mod dispatch;
mod executor;
mod key_accounting;
mod record_accounting;

pub use config::ControllerConfig;
pub use dispatch::AsyncExecutionController;

//! Future and promise halves of a single state operation result.

use crate::error::{Result, StateError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A continuation waiting on a future.
type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Completion state shared by a future and its promise.
enum Slot<T> {
    /// Not yet resolved. Continuations are kept in registration order.
    Pending(Vec<Callback<T>>),
    /// Resolved with a value or an error.
    Done(Result<T>),
}

/// The eventual result of one state operation.
///
/// Cloning a `StateFuture` yields another handle to the same result.
pub struct StateFuture<T: Clone + Send + 'static> {
    slot: Arc<Mutex<Slot<T>>>,
}

/// The write half of a [`StateFuture`].
///
/// Dropping a promise without completing it resolves the future with
/// [`StateError::Abandoned`].
pub struct StatePromise<T: Clone + Send + 'static> {
    slot: Option<Arc<Mutex<Slot<T>>>>,
}

impl<T: Clone + Send + 'static> StateFuture<T> {
    /// Create an unresolved future and the promise that resolves it.
    pub fn pending() -> (Self, StatePromise<T>) {
        let slot = Arc::new(Mutex::new(Slot::Pending(Vec::new())));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            StatePromise { slot: Some(slot) },
        )
    }

    /// Create a future already resolved with `value`.
    pub fn completed(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Done(Ok(value)))),
        }
    }

    /// Create a future already resolved with `error`.
    pub fn failed(error: StateError) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Done(Err(error)))),
        }
    }

    /// Create a future resolved with `result`.
    pub fn from_result(result: Result<T>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Done(result))),
        }
    }

    /// Whether the future has been resolved.
    pub fn is_done(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Done(_))
    }

    /// Get a copy of the result, if resolved (non-blocking).
    pub fn try_get(&self) -> Option<Result<T>> {
        match &*self.slot.lock() {
            Slot::Done(result) => Some(result.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Register a continuation receiving the result.
    ///
    /// Runs immediately if the future is already resolved.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let result = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                Slot::Done(result) => result.clone(),
            }
        };
        // Lock released: the callback may register further continuations.
        callback(result);
    }
}

impl<T: Clone + Send + 'static> Clone for StateFuture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for StateFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.lock() {
            Slot::Pending(callbacks) => format!("Pending({} continuations)", callbacks.len()),
            Slot::Done(Ok(_)) => "Completed".to_string(),
            Slot::Done(Err(e)) => format!("Failed({e})"),
        };
        write!(f, "StateFuture({state})")
    }
}

impl<T: Clone + Send + 'static> StatePromise<T> {
    /// Resolve the paired future, running its waiting continuations.
    pub fn complete(mut self, result: Result<T>) {
        if let Some(slot) = self.slot.take() {
            resolve(&slot, result);
        }
    }
}

impl<T: Clone + Send + 'static> Drop for StatePromise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            resolve(&slot, Err(StateError::Abandoned));
        }
    }
}

fn resolve<T: Clone + Send + 'static>(slot: &Mutex<Slot<T>>, result: Result<T>) {
    let callbacks = {
        let mut guard = slot.lock();
        match std::mem::replace(&mut *guard, Slot::Done(result.clone())) {
            Slot::Pending(callbacks) => callbacks,
            // Only a promise resolves a pending slot, and completing consumes it.
            Slot::Done(_) => unreachable!("state future resolved twice"),
        }
    };

    let mut callbacks = callbacks.into_iter().peekable();
    let mut result = Some(result);
    while let Some(callback) = callbacks.next() {
        let value = if callbacks.peek().is_some() {
            result.clone()
        } else {
            result.take()
        };
        if let Some(value) = value {
            callback(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_completed_future() {
        let future = StateFuture::completed(5);
        assert!(future.is_done());
        assert_eq!(future.try_get(), Some(Ok(5)));
    }

    #[test]
    fn test_pending_then_complete() {
        let (future, promise) = StateFuture::<i32>::pending();
        assert!(!future.is_done());
        assert_eq!(future.try_get(), None);

        promise.complete(Ok(7));
        assert_eq!(future.try_get(), Some(Ok(7)));
    }

    #[test]
    fn test_continuations_run_in_registration_order() {
        let (future, promise) = StateFuture::<i32>::pending();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let seen = Arc::clone(&seen);
            future.on_complete(move |result| {
                seen.lock().push((tag, result.unwrap()));
            });
        }
        assert!(seen.lock().is_empty());

        promise.complete(Ok(9));
        assert_eq!(*seen.lock(), vec![(0, 9), (1, 9), (2, 9)]);
    }

    #[test]
    fn test_late_continuation_runs_once_immediately() {
        let future = StateFuture::completed("v".to_string());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        future.on_complete(move |result| {
            assert_eq!(result.unwrap(), "v");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_promise_abandons() {
        let (future, promise) = StateFuture::<i32>::pending();
        drop(promise);
        assert_eq!(future.try_get(), Some(Err(StateError::Abandoned)));
    }

    #[test]
    fn test_failure_reaches_every_continuation() {
        let (future, promise) = StateFuture::<i32>::pending();
        let failures = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let failures = Arc::clone(&failures);
            future.on_complete(move |result| {
                assert!(matches!(result, Err(StateError::Store(_))));
                failures.fetch_add(1, Ordering::SeqCst);
            });
        }

        promise.complete(Err(StateError::Store("disk".into())));
        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_continuation_may_register_on_same_future() {
        let (future, promise) = StateFuture::<i32>::pending();
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_future = future.clone();
        let counter = Arc::clone(&calls);
        future.on_complete(move |_| {
            let counter = Arc::clone(&counter);
            inner_future.on_complete(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        promise.complete(Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

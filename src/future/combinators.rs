//! Chaining and combining state futures.

use super::{StateFuture, StatePromise};
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;

impl<T: Clone + Send + 'static> StateFuture<T> {
    /// Transform the value once resolved. Errors pass through unchanged.
    pub fn then_apply<U, F>(&self, f: F) -> StateFuture<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then_try_apply(move |value| Ok(f(value)))
    }

    /// Transform the value with a fallible function.
    pub fn then_try_apply<U, F>(&self, f: F) -> StateFuture<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let (future, promise) = StateFuture::pending();
        self.on_complete(move |result| promise.complete(result.and_then(f)));
        future
    }

    /// Consume the value once resolved.
    pub fn then_accept<F>(&self, f: F) -> StateFuture<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.then_apply(f)
    }

    /// Start another asynchronous step from the value.
    ///
    /// `f` typically submits a follow-up state request; a submission error
    /// fails the returned future.
    pub fn then_compose<U, F>(&self, f: F) -> StateFuture<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<StateFuture<U>> + Send + 'static,
    {
        let (future, promise) = StateFuture::pending();
        self.on_complete(move |result| match result.and_then(f) {
            Ok(next) => next.on_complete(move |result| promise.complete(result)),
            Err(e) => promise.complete(Err(e)),
        });
        future
    }

    /// Combine with another future once both are resolved.
    pub fn then_combine<U, R, F>(&self, other: &StateFuture<U>, f: F) -> StateFuture<R>
    where
        U: Clone + Send + 'static,
        R: Clone + Send + 'static,
        F: FnOnce(T, U) -> R + Send + 'static,
    {
        let other = other.clone();
        self.then_compose(move |left| Ok(other.then_apply(move |right| f(left, right))))
    }

    /// Collect the values of `futures`, in order.
    ///
    /// Resolves once every input has resolved. Fails with the first error in
    /// list order.
    pub fn combine_all(futures: Vec<StateFuture<T>>) -> StateFuture<Vec<T>> {
        if futures.is_empty() {
            return StateFuture::completed(Vec::new());
        }

        let (combined, promise) = StateFuture::pending();
        let gather = Arc::new(Mutex::new(Gather {
            results: vec![None; futures.len()],
            remaining: futures.len(),
            promise: Some(promise),
        }));

        for (index, future) in futures.into_iter().enumerate() {
            let gather = Arc::clone(&gather);
            future.on_complete(move |result| {
                let finished = {
                    let mut gather = gather.lock();
                    gather.results[index] = Some(result);
                    gather.remaining -= 1;
                    if gather.remaining > 0 {
                        return;
                    }
                    let results = std::mem::take(&mut gather.results);
                    gather.promise.take().map(|promise| (promise, results))
                };
                if let Some((promise, results)) = finished {
                    promise.complete(results.into_iter().flatten().collect());
                }
            });
        }
        combined
    }
}

/// Shared accumulator of [`StateFuture::combine_all`].
struct Gather<T: Clone + Send + 'static> {
    results: Vec<Option<Result<T>>>,
    remaining: usize,
    promise: Option<StatePromise<Vec<T>>>,
}

//! The asynchronous execution controller.

use super::executor::{Completion, StateExecutor};
use super::key_accounting::KeyAccounting;
use super::record_accounting::{RecordAccounting, RecordContext, RecordId};
use super::ControllerConfig;
use crate::error::{Result, StateError};
use crate::future::{StateFuture, StatePromise};
use crate::handler::{validate_request, StateRequestHandler};
use crate::request::{RequestEnvelope, RequestPayload, RequestType, StateResponse};
use crate::store::StateStore;
use crate::types::{Key, RequestId, Sequence, StateId, StateInfo};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why the active buffer was flushed.
#[derive(Clone, Copy, Debug)]
enum FlushReason {
    BatchFull,
    Timeout,
    Trigger,
    Yield,
}

/// A submitted request that has not completed yet.
struct InFlight<K: Key> {
    record: RecordId,
    key: K,
    state: StateId,
    sequence: Sequence,
    promise: StatePromise<StateResponse>,
}

/// Mutable controller state, guarded by one lock.
///
/// The lock is never held while a continuation runs.
struct Inner<K: Key> {
    current: Option<RecordContext<K>>,
    next_record: u64,
    next_id: u64,
    records: RecordAccounting<K>,
    accounting: KeyAccounting<K>,
    /// Requests ready to be sent to the store, in the order they became ready.
    active: Vec<RequestEnvelope<K>>,
    /// When the oldest request in `active` arrived.
    active_since: Option<Instant>,
    /// Every submitted request that has not completed, queued or issued.
    in_flight: HashMap<RequestId, InFlight<K>>,
    /// Completions received from the executor but not yet processed.
    completed: VecDeque<Completion>,
    closed: bool,
}

impl<K: Key> Inner<K> {
    fn push_active(&mut self, envelope: RequestEnvelope<K>) {
        if self.active.is_empty() {
            self.active_since = Some(Instant::now());
        }
        self.active.push(envelope);
    }

    fn take_active(&mut self) -> Vec<RequestEnvelope<K>> {
        self.active_since = None;
        std::mem::take(&mut self.active)
    }

    fn buffer_expired(&self, timeout: Duration) -> bool {
        self.active_since
            .map_or(false, |since| since.elapsed() >= timeout)
    }

    /// Queue a request of `record` once its record owns the key and its pair
    /// has nothing issued.
    fn admit(&mut self, record: RecordId, envelope: RequestEnvelope<K>) {
        if let Some(owned) = self.records.admit(record, envelope) {
            self.issue(owned);
        }
    }

    fn issue(&mut self, envelope: RequestEnvelope<K>) {
        if let Some(ready) = self.accounting.admit(envelope) {
            self.push_active(ready);
        }
    }
}

/// Sequences state requests per key and executes them asynchronously.
///
/// The controller is driven by a single processing thread: the thread that
/// sets the current key, submits requests, and calls [`poll`](Self::poll),
/// [`yield_once`](Self::yield_once), [`wait_for`](Self::wait_for) or
/// [`drain_inflight`](Self::drain_inflight). Continuations of request futures
/// run on that thread while it processes completions, so user code touching
/// one key's state never runs concurrently with itself.
///
/// Ordering:
/// - a record, from [`set_current_key`](Self::set_current_key) until its
///   last request completes, has its key to itself: requests of later
///   records on that key wait, and follow-ups submitted by its
///   continuations count as its own;
/// - requests on one (key, state) pair are issued one at a time, in
///   submission order, reads included;
/// - requests on different pairs are batched and run in parallel on the
///   executor threads, completing in any order.
///
/// Back-pressure blocks: once `max_in_flight` requests are outstanding, a
/// submission waits, processing completions, until the count drops below the
/// bound.
pub struct AsyncExecutionController<K: Key> {
    config: ControllerConfig,
    inner: Mutex<Inner<K>>,
    executor: Mutex<StateExecutor<K>>,
    mailbox: Receiver<Vec<Completion>>,
}

impl<K: Key> AsyncExecutionController<K> {
    /// Create a controller and start its executor threads.
    pub fn new(store: Arc<dyn StateStore<K>>, config: ControllerConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let (sender, mailbox) = unbounded();
        let executor = StateExecutor::start(store, &config, sender)?;

        tracing::debug!(
            batch_size = config.batch_size,
            max_in_flight = config.max_in_flight,
            worker_threads = config.worker_threads,
            "Created async execution controller"
        );

        Ok(Arc::new(Self {
            config,
            inner: Mutex::new(Inner {
                current: None,
                next_record: 0,
                next_id: 0,
                records: RecordAccounting::new(),
                accounting: KeyAccounting::new(),
                active: Vec::new(),
                active_since: None,
                in_flight: HashMap::new(),
                completed: VecDeque::new(),
                closed: false,
            }),
            executor: Mutex::new(executor),
            mailbox,
        }))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // --- Key context ---

    /// Start a new record: subsequent requests are scoped to `key`.
    ///
    /// Called by the processing thread before it processes each record. The
    /// record's requests run after those of every earlier record on `key`.
    pub fn set_current_key(&self, key: K) {
        let mut inner = self.inner.lock();
        let id = RecordId(inner.next_record);
        inner.next_record += 1;
        inner.current = Some(RecordContext { id, key });
    }

    pub fn current_key(&self) -> Option<K> {
        self.inner.lock().current.as_ref().map(|c| c.key.clone())
    }

    // --- Introspection ---

    /// Submitted requests that have not completed, whether queued or issued.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Ready requests waiting in the buffer to be sent to the store.
    pub fn buffered_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Requests waiting behind another request on the same (key, state).
    pub fn queued_count(&self) -> usize {
        self.inner.lock().accounting.waiting_count()
    }

    /// Requests waiting for an earlier record on their key to finish.
    pub fn blocked_count(&self) -> usize {
        self.inner.lock().records.parked_count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    // --- Submission ---

    /// Submit a request for the current key.
    pub fn submit(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<StateFuture<StateResponse>> {
        validate_request(state, request_type, &payload)?;
        self.check_accepting()?;
        self.wait_for_capacity();

        let (future, flush) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(StateError::Closed);
            }
            let RecordContext { id: record, key } =
                inner.current.clone().ok_or(StateError::NoCurrentKey)?;

            // One counter serves as request id and sequence, which keeps
            // sequences strictly increasing within every (key, state) pair.
            let id = inner.next_id;
            inner.next_id += 1;
            let envelope = RequestEnvelope {
                id: RequestId(id),
                key: key.clone(),
                state: state.id.clone(),
                kind: state.kind,
                namespace,
                request_type,
                payload,
                sequence: Sequence(id),
            };

            let (future, promise) = StateFuture::pending();
            inner.in_flight.insert(
                envelope.id,
                InFlight {
                    record,
                    key,
                    state: state.id.clone(),
                    sequence: envelope.sequence,
                    promise,
                },
            );

            inner.admit(record, envelope);

            let flush = if inner.active.len() >= self.config.batch_size {
                Some((inner.take_active(), FlushReason::BatchFull))
            } else if inner.buffer_expired(self.config.buffer_timeout()) {
                Some((inner.take_active(), FlushReason::Timeout))
            } else {
                None
            };
            (future, flush)
        };

        if let Some((batch, reason)) = flush {
            self.dispatch(batch, reason);
        }
        Ok(future)
    }

    fn check_accepting(&self) -> Result<()> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(StateError::Closed);
        }
        if inner.current.is_none() {
            return Err(StateError::NoCurrentKey);
        }
        Ok(())
    }

    /// Block, processing completions, while the in-flight bound is reached.
    fn wait_for_capacity(&self) {
        let limit = self.config.max_in_flight;
        let in_flight = self.in_flight_count();
        if in_flight < limit {
            return;
        }

        tracing::debug!(in_flight, limit, "Back-pressure engaged");
        while self.in_flight_count() >= limit {
            self.yield_once(self.config.buffer_timeout());
        }
        tracing::trace!("Back-pressure released");
    }

    // --- Flushing ---

    /// Send every buffered request to the store now.
    pub fn trigger(&self) {
        self.flush(FlushReason::Trigger);
    }

    fn flush(&self, reason: FlushReason) {
        let batch = self.inner.lock().take_active();
        self.dispatch(batch, reason);
    }

    fn dispatch(&self, batch: Vec<RequestEnvelope<K>>, reason: FlushReason) {
        if batch.is_empty() {
            return;
        }
        let read_only = batch
            .iter()
            .filter(|request| request.request_type.is_read_only())
            .count();
        tracing::trace!(size = batch.len(), read_only, ?reason, "Flushing state requests");

        let submitted = self.executor.lock().submit(batch);
        if let Err(rejected) = submitted {
            // The executor is gone: fail the requests instead of losing them.
            tracing::warn!("Executor stopped; failing {} requests", rejected.len());
            let mut inner = self.inner.lock();
            inner
                .completed
                .extend(rejected.into_iter().map(|request| Completion {
                    id: request.id,
                    result: Err(StateError::Closed),
                }));
        }
    }

    // --- Completion processing ---

    /// Move completions from the mailbox into the pending queue.
    ///
    /// With `timeout`, waits up to that long for the first message.
    fn receive(&self, timeout: Option<Duration>) {
        let mut messages = Vec::new();
        if let Some(timeout) = timeout {
            match self.mailbox.recv_timeout(timeout) {
                Ok(message) => messages.push(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("State executor mailbox disconnected");
                }
            }
        }
        messages.extend(self.mailbox.try_iter());

        if !messages.is_empty() {
            self.inner.lock().completed.extend(messages.into_iter().flatten());
        }
    }

    /// Resolve received completions one at a time, running continuations
    /// under the record and key of the request that completed.
    ///
    /// The record is counted as pending until its continuations have run, so
    /// the key stays with it while they submit follow-ups.
    fn process_completed(&self) -> usize {
        let mut processed = 0;
        loop {
            let (promise, result, record, previous) = {
                let mut inner = self.inner.lock();
                let Some(completion) = inner.completed.pop_front() else {
                    break;
                };
                let Some(in_flight) = inner.in_flight.remove(&completion.id) else {
                    panic!(
                        "ordering violation: completion for unknown request {:?}",
                        completion.id
                    );
                };

                if let Some(next) =
                    inner
                        .accounting
                        .release(&in_flight.key, &in_flight.state, in_flight.sequence)
                {
                    inner.push_active(next);
                }
                let record = in_flight.record;

                if let Err(e) = &completion.result {
                    tracing::warn!(
                        state = %in_flight.state,
                        key = ?in_flight.key,
                        "State request failed: {e}"
                    );
                }

                let previous = inner.current.replace(RecordContext {
                    id: record,
                    key: in_flight.key,
                });
                (in_flight.promise, completion.result, record, previous)
            };

            promise.complete(result);

            let mut inner = self.inner.lock();
            inner.current = previous;
            let released = inner.records.complete(record);
            for envelope in released {
                inner.issue(envelope);
            }
            drop(inner);
            processed += 1;
        }
        processed
    }

    /// Make progress without blocking.
    ///
    /// Flushes the buffer if its oldest request has waited longer than the
    /// buffer timeout, then processes every completion already received.
    /// Requests released by those completions are flushed right away.
    /// Returns the number of completions processed.
    pub fn poll(&self) -> usize {
        let expired = self
            .inner
            .lock()
            .buffer_expired(self.config.buffer_timeout());
        if expired {
            self.flush(FlushReason::Timeout);
        }

        self.receive(None);
        let processed = self.process_completed();
        if processed > 0 {
            self.flush(FlushReason::Yield);
        }
        processed
    }

    /// Flush, then wait up to `timeout` for completions and process them.
    ///
    /// Returns immediately if nothing is in flight. Returns the number of
    /// completions processed.
    pub fn yield_once(&self, timeout: Duration) -> usize {
        self.flush(FlushReason::Yield);

        let wait = {
            let inner = self.inner.lock();
            inner.completed.is_empty() && !inner.in_flight.is_empty()
        };
        self.receive(wait.then_some(timeout));

        let processed = self.process_completed();
        self.flush(FlushReason::Yield);
        processed
    }

    /// Drive the controller until `future` resolves and return its result.
    ///
    /// Fails with [`StateError::Abandoned`] if the future is still pending
    /// when the controller has nothing left in flight, since nothing this
    /// controller runs could resolve it.
    pub fn wait_for<T: Clone + Send + 'static>(&self, future: &StateFuture<T>) -> Result<T> {
        loop {
            if let Some(result) = future.try_get() {
                return result;
            }
            if self.yield_once(self.config.buffer_timeout()) == 0 && self.in_flight_count() == 0 {
                return future.try_get().unwrap_or_else(|| {
                    tracing::warn!("Waited on a future no in-flight request can resolve");
                    Err(StateError::Abandoned)
                });
            }
        }
    }

    /// Like [`wait_for`](Self::wait_for), giving up after `timeout`.
    ///
    /// Returns `None` on timeout. The request stays in flight and its result
    /// is delivered to the future when it arrives.
    pub fn wait_for_timeout<T: Clone + Send + 'static>(
        &self,
        future: &StateFuture<T>,
        timeout: Duration,
    ) -> Option<Result<T>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = future.try_get() {
                return Some(result);
            }
            let now = Instant::now();
            if now >= deadline || self.in_flight_count() == 0 {
                return future.try_get();
            }
            let slice = (deadline - now).min(self.config.buffer_timeout());
            self.yield_once(slice);
        }
    }

    /// Block until every submitted request, including those submitted by
    /// continuations along the way, has completed.
    pub fn drain_inflight(&self) {
        let outstanding = self.in_flight_count();
        if outstanding == 0 {
            return;
        }
        let (busy_keys, active_pairs) = {
            let inner = self.inner.lock();
            (inner.records.busy_keys(), inner.accounting.active_pairs())
        };
        tracing::debug!(
            outstanding,
            busy_keys,
            active_pairs,
            "Draining in-flight state requests"
        );
        while self.in_flight_count() > 0 {
            self.yield_once(self.config.buffer_timeout());
        }
    }

    /// Drain outstanding requests, then stop the executor threads.
    ///
    /// Later submissions fail with [`StateError::Closed`].
    pub fn close(&self) {
        if self.is_closed() {
            return;
        }
        self.drain_inflight();
        self.inner.lock().closed = true;
        self.executor.lock().shutdown();
        tracing::debug!("Async execution controller closed");
    }
}

impl<K: Key> StateRequestHandler<K> for AsyncExecutionController<K> {
    fn handle_request(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<StateFuture<StateResponse>> {
        self.submit(state, request_type, namespace, payload)
    }

    fn handle_request_sync(
        &self,
        state: &StateInfo,
        request_type: RequestType,
        namespace: Vec<u8>,
        payload: RequestPayload,
    ) -> Result<StateResponse> {
        let future = self.submit(state, request_type, namespace, payload)?;
        self.wait_for(&future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use crate::types::StateKind;

    fn controller(config: ControllerConfig) -> Arc<AsyncExecutionController<u64>> {
        AsyncExecutionController::new(Arc::new(MemoryStateStore::<u64>::new()), config).unwrap()
    }

    fn value_state() -> StateInfo {
        StateInfo {
            id: StateId::new("v"),
            kind: StateKind::Value,
        }
    }

    fn update(value: &[u8]) -> (RequestType, RequestPayload) {
        (RequestType::ValueUpdate, RequestPayload::Value(value.to_vec()))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = AsyncExecutionController::<u64>::new(
            Arc::new(MemoryStateStore::<u64>::new()),
            ControllerConfig {
                batch_size: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StateError::InvalidConfig(_))));
    }

    #[test]
    fn test_submit_without_key() {
        let controller = controller(ControllerConfig::default());
        let err = controller
            .submit(&value_state(), RequestType::ValueGet, vec![], RequestPayload::Empty)
            .unwrap_err();
        assert_eq!(err, StateError::NoCurrentKey);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn test_requests_buffer_until_batch_full() {
        let controller = controller(ControllerConfig {
            batch_size: 3,
            buffer_timeout_ms: 60_000,
            ..Default::default()
        });

        for key in 0..2u64 {
            controller.set_current_key(key);
            controller
                .submit(&value_state(), RequestType::ValueGet, vec![], RequestPayload::Empty)
                .unwrap();
        }
        assert_eq!(controller.buffered_count(), 2);

        controller.set_current_key(2);
        controller
            .submit(&value_state(), RequestType::ValueGet, vec![], RequestPayload::Empty)
            .unwrap();
        assert_eq!(controller.buffered_count(), 0);

        controller.drain_inflight();
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn test_same_pair_queues_behind_issued() {
        let controller = controller(ControllerConfig {
            buffer_timeout_ms: 60_000,
            ..Default::default()
        });
        controller.set_current_key(7);

        let (ty, payload) = update(b"1");
        let first = controller.submit(&value_state(), ty, vec![], payload).unwrap();
        let second = controller
            .submit(&value_state(), RequestType::ValueGet, vec![], RequestPayload::Empty)
            .unwrap();

        assert_eq!(controller.buffered_count(), 1);
        assert_eq!(controller.queued_count(), 1);

        assert_eq!(controller.wait_for(&second), Ok(StateResponse::Value(Some(b"1".to_vec()))));
        assert_eq!(first.try_get(), Some(Ok(StateResponse::Done)));
    }

    #[test]
    fn test_later_record_waits_for_key() {
        let controller = controller(ControllerConfig {
            buffer_timeout_ms: 60_000,
            ..Default::default()
        });
        let other_state = StateInfo {
            id: StateId::new("w"),
            kind: StateKind::Value,
        };

        controller.set_current_key(7);
        let (ty, payload) = update(b"1");
        controller.submit(&value_state(), ty, vec![], payload).unwrap();

        // A new record on the same key waits even on another state.
        controller.set_current_key(7);
        let read = controller
            .submit(&other_state, RequestType::ValueGet, vec![], RequestPayload::Empty)
            .unwrap();
        controller.set_current_key(8);
        controller
            .submit(&other_state, RequestType::ValueGet, vec![], RequestPayload::Empty)
            .unwrap();

        assert_eq!(controller.buffered_count(), 2);
        assert_eq!(controller.blocked_count(), 1);
        assert_eq!(controller.queued_count(), 0);

        assert_eq!(controller.wait_for(&read), Ok(StateResponse::Value(None)));
        assert_eq!(controller.blocked_count(), 0);
        controller.drain_inflight();
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn test_continuation_runs_under_completed_key() {
        let controller = controller(ControllerConfig::default());
        controller.set_current_key(1);
        let future = controller
            .submit(&value_state(), RequestType::ValueGet, vec![], RequestPayload::Empty)
            .unwrap();

        let seen = Arc::new(Mutex::new(None));
        let observer = Arc::clone(&controller);
        let slot = Arc::clone(&seen);
        future.on_complete(move |_| {
            *slot.lock() = observer.current_key();
        });

        controller.set_current_key(2);
        controller.drain_inflight();

        assert_eq!(*seen.lock(), Some(1));
        assert_eq!(controller.current_key(), Some(2));
    }

    #[test]
    fn test_wait_for_foreign_future_is_abandoned() {
        let controller = controller(ControllerConfig::default());
        let (future, _promise) = StateFuture::<i32>::pending();
        assert_eq!(controller.wait_for(&future), Err(StateError::Abandoned));
    }

    #[test]
    fn test_back_pressure_blocks_without_dropping() {
        let controller = controller(ControllerConfig {
            max_in_flight: 2,
            batch_size: 100,
            buffer_timeout_ms: 60_000,
            ..Default::default()
        });

        let mut futures = Vec::new();
        for i in 0..10u8 {
            controller.set_current_key(u64::from(i % 3));
            let (ty, payload) = update(&[i]);
            futures.push(controller.submit(&value_state(), ty, vec![], payload).unwrap());
            assert!(controller.in_flight_count() <= 2);
        }

        controller.drain_inflight();
        assert!(futures
            .iter()
            .all(|f| f.try_get() == Some(Ok(StateResponse::Done))));
    }

    #[test]
    fn test_close_rejects_new_requests() {
        let controller = controller(ControllerConfig::default());
        controller.set_current_key(1);
        let (ty, payload) = update(b"x");
        let future = controller.submit(&value_state(), ty, vec![], payload).unwrap();

        controller.close();
        assert_eq!(future.try_get(), Some(Ok(StateResponse::Done)));
        assert!(controller.is_closed());

        let err = controller
            .submit(&value_state(), RequestType::ValueGet, vec![], RequestPayload::Empty)
            .unwrap_err();
        assert_eq!(err, StateError::Closed);
    }
}

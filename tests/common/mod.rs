//! Shared fixtures for integration tests.

#![allow(dead_code)]

use keyed_state::{
    AsyncExecutionController, ControllerConfig, MemoryStateStore, RequestEnvelope, RequestType,
    Result, Sequence, StateError, StateResponse, StateStore,
};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route controller logs to the test output; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One request as the store saw it.
#[derive(Clone, Debug)]
pub struct Executed {
    pub key: u64,
    pub state: String,
    pub namespace: Vec<u8>,
    pub request_type: RequestType,
    pub sequence: Sequence,
    pub failed: bool,
}

type FailWhen = Box<dyn Fn(&RequestEnvelope<u64>) -> bool + Send + Sync>;

/// In-memory store that records execution order, with optional random
/// latency and injected failures.
pub struct RecordingStore {
    inner: MemoryStateStore<u64>,
    log: Mutex<Vec<Executed>>,
    max_latency: Option<Duration>,
    fail_when: Option<FailWhen>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStateStore::new(),
            log: Mutex::new(Vec::new()),
            max_latency: None,
            fail_when: None,
        }
    }

    pub fn with_random_latency(mut self, max: Duration) -> Self {
        self.max_latency = Some(max);
        self
    }

    pub fn failing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestEnvelope<u64>) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.lock().clone()
    }

    /// Executed requests for one (key, state) pair, in execution order.
    pub fn executed_for(&self, key: u64, state: &str) -> Vec<Executed> {
        self.log
            .lock()
            .iter()
            .filter(|e| e.key == key && e.state == state)
            .cloned()
            .collect()
    }
}

impl StateStore<u64> for RecordingStore {
    fn execute(&self, request: &RequestEnvelope<u64>) -> Result<StateResponse> {
        if let Some(max) = self.max_latency {
            let micros = rand::thread_rng().gen_range(0..=max.as_micros() as u64);
            std::thread::sleep(Duration::from_micros(micros));
        }

        let fail = self.fail_when.as_ref().map_or(false, |f| f(request));
        let result = if fail {
            Err(StateError::Store("injected failure".into()))
        } else {
            self.inner.execute(request)
        };

        self.log.lock().push(Executed {
            key: request.key,
            state: request.state.as_str().to_string(),
            namespace: request.namespace.clone(),
            request_type: request.request_type,
            sequence: request.sequence,
            failed: fail,
        });
        result
    }
}

pub fn config(batch_size: usize) -> ControllerConfig {
    ControllerConfig {
        batch_size,
        buffer_timeout_ms: 5,
        worker_threads: 4,
        ..Default::default()
    }
}

pub fn controller(
    store: Arc<RecordingStore>,
    config: ControllerConfig,
) -> Arc<AsyncExecutionController<u64>> {
    init_tracing();
    AsyncExecutionController::new(store, config).unwrap()
}

//! Worker pool executing request batches against the store.

use super::ControllerConfig;
use crate::error::{Result, StateError};
use crate::request::{RequestEnvelope, StateResponse};
use crate::store::StateStore;
use crate::types::{Key, RequestId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Result of one executed request, sent back to the processing thread.
#[derive(Debug)]
pub(crate) struct Completion {
    pub id: RequestId,
    pub result: Result<StateResponse>,
}

/// Fixed pool of threads sharing one store.
///
/// Batches are picked up by whichever worker is free; each batch's results
/// go back to the processing thread as one mailbox message.
pub(crate) struct StateExecutor<K> {
    batches: Option<Sender<Vec<RequestEnvelope<K>>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<K: Key> StateExecutor<K> {
    pub fn start(
        store: Arc<dyn StateStore<K>>,
        config: &ControllerConfig,
        mailbox: Sender<Vec<Completion>>,
    ) -> Result<Self> {
        let (batches, receiver) = unbounded::<Vec<RequestEnvelope<K>>>();

        let workers = (0..config.worker_threads)
            .map(|index| {
                let store = Arc::clone(&store);
                let receiver = receiver.clone();
                let mailbox = mailbox.clone();
                let span = tracing::info_span!("state_executor", index);
                std::thread::Builder::new()
                    .name(format!("{}-{index}", config.thread_name_prefix))
                    .spawn(move || {
                        let _enter = span.enter();
                        work_loop(store.as_ref(), receiver, mailbox);
                    })
                    .map_err(|e| StateError::Executor(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Started {} state executor threads", workers.len());

        Ok(Self {
            batches: Some(batches),
            workers,
        })
    }

    /// Hand a batch to the pool.
    ///
    /// Returns the batch back if the pool has been shut down.
    pub fn submit(
        &self,
        batch: Vec<RequestEnvelope<K>>,
    ) -> std::result::Result<(), Vec<RequestEnvelope<K>>> {
        match &self.batches {
            Some(sender) => sender.send(batch).map_err(|e| e.into_inner()),
            None => Err(batch),
        }
    }

    /// Stop accepting batches and wait for the workers to finish the ones
    /// already queued.
    pub fn shutdown(&mut self) {
        if self.batches.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("State executor thread panicked");
            }
        }
        tracing::debug!("State executor stopped");
    }
}

impl<K> Drop for StateExecutor<K> {
    fn drop(&mut self) {
        // Closing the channel ends every work loop.
        self.batches.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn work_loop<K: Key>(
    store: &dyn StateStore<K>,
    batches: Receiver<Vec<RequestEnvelope<K>>>,
    mailbox: Sender<Vec<Completion>>,
) {
    for batch in batches.iter() {
        tracing::trace!("Executing batch of {} requests", batch.len());
        let completions = execute_batch(store, &batch);
        if mailbox.send(completions).is_err() {
            // The controller is gone; nobody is waiting for results.
            break;
        }
    }
}

/// Execute a batch, producing exactly one completion per request.
fn execute_batch<K: Key>(store: &dyn StateStore<K>, batch: &[RequestEnvelope<K>]) -> Vec<Completion> {
    let results = match panic::catch_unwind(AssertUnwindSafe(|| store.execute_batch(batch))) {
        Ok(results) => results,
        Err(_) => {
            tracing::error!("Store panicked while executing a batch of {}", batch.len());
            vec![Err(StateError::Store("store panicked".into())); batch.len()]
        }
    };

    if results.len() != batch.len() {
        tracing::error!(
            "Store returned {} results for a batch of {}",
            results.len(),
            batch.len()
        );
    }

    let mut results = results.into_iter();
    batch
        .iter()
        .map(|request| Completion {
            id: request.id,
            result: results.next().unwrap_or_else(|| {
                Err(StateError::Store(format!(
                    "store returned no result for request {:?}",
                    request.id
                )))
            }),
        })
        .collect()
}

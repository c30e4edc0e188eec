use std::collections::HashMap;
use std::ops::Drop;

use tokio::sync::{mpsc, oneshot};
use tracing::Level;
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    error::{LoadError, LoadResult},
    loader_worker::LoaderWorker,
    request::LoadRequest,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// Users call [`Loader::load`] and [`Loader::load_many`] to fetch values from the underlying
/// resource. Calls issued before the loader's worker gets a chance to run are coalesced into one
/// dispatch window: the worker invokes the batch function once with the distinct keys of the
/// window and fans the per-key outcomes back out to every caller. Values loaded successfully are
/// memoized for the lifetime of the loader, which is one incoming request when the loader is
/// owned by a [`RequestScope`](crate::RequestScope).
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple parallel tasks, and the loader will enqueue the requested operations on
/// the request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the Loader.
pub struct Loader<F: BatchFunction> {
    request_tx: mpsc::UnboundedSender<LoadRequest<F::Key, F::Value>>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<F: BatchFunction> Drop for Loader<F> {
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<F: BatchFunction> Loader<F> {
    /// Creates a new Loader around `F`'s batch function, spawning its worker task.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(context: F::Context) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let span = tracing::span!(Level::TRACE, "loader_worker", entity = std::any::type_name::<F>());
        Self {
            request_tx: tx,
            load_task_handle: tokio::task::spawn(
                LoaderWorker::<F, HashMap<F::Key, F::Value>>::new(HashMap::new(), rx, context)
                    .start()
                    .instrument(span),
            ),
        }
    }

    /// Loads a value from the underlying resource.
    ///
    /// If the value was already loaded during this request, it is returned as soon as the worker
    /// processes the call. Otherwise the key is enqueued for batch loading in the next loader
    /// execution frame, and the call suspends until that frame resolves it with a value or a
    /// per-key error.
    pub async fn load(&self, key: F::Key) -> LoadResult<F::Value> {
        let (response_tx, response_rx) = oneshot::channel();
        if self.request_tx.send(LoadRequest::One(key, response_tx)).is_err() {
            return Err(LoadError::Cancelled);
        }
        response_rx.await.unwrap_or(Err(LoadError::Cancelled))
    }

    /// Loads many values at once, returning one outcome per key in argument order.
    ///
    /// Keys already loaded during this request resolve from the memo; only the remainder joins
    /// the next execution frame's batch.
    pub async fn load_many(&self, keys: Vec<F::Key>) -> Vec<LoadResult<F::Value>> {
        let key_count = keys.len();
        let (response_tx, response_rx) = oneshot::channel();
        if self.request_tx.send(LoadRequest::Many(keys, response_tx)).is_err() {
            return vec![Err(LoadError::Cancelled); key_count];
        }
        response_rx.await.unwrap_or_else(|_| vec![Err(LoadError::Cancelled); key_count])
    }

    /// Tears down the worker task. In-flight batch calls are dropped at their await point and
    /// every unresolved caller observes [`LoadError::Cancelled`].
    pub(crate) fn shutdown(&self) {
        self.load_task_handle.abort();
    }
}

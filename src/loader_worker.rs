use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use futures::future::FutureExt;
use tokio::sync::mpsc;

use crate::{
    batch_function::BatchFunction,
    error::{LoadError, LoadResult},
    memo::Memo,
    request::LoadRequest,
};
#[cfg(feature = "stats")]
use crate::worker_stats::WorkerStats;

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work.
///
/// Once started, it runs in a loop until the parent Loader aborts its `JoinHandle` or drops the
/// request queue tx channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests
/// 2. Flushing the request queue and staging keys for loading.
/// 3. Dispatching its batch function and routing the results.
///
/// One cycle through this loop may be called an "execution frame"; the frame is the dispatch
/// window of the loader. Everything queued before the worker reaches state (3) joins the current
/// window; requests arriving while the batch call is in flight sit in the channel and form the
/// next window.
///
/// In state (1), the worker awaits any messages on the request queue channel, idling until work arrives.
///
/// In state (2), the worker synchronously pulls requests from the queue until it would block.
/// Requests whose keys are all present in the memo are answered immediately on their response
/// channels; the rest are parked and their missing keys staged for loading.
///
/// In state (3), the worker sorts and deduplicates the staged keys, invokes the `BatchFunction`
/// once with the distinct set, and fans the per-key outcomes back out to every parked request.
/// Successful values are memoized for the rest of the request's lifetime; error outcomes are not,
/// so a later window retries the key.
pub struct LoaderWorker<F, MemoT>
where
    F: BatchFunction,
    MemoT: Memo<K = F::Key, V = F::Value>,
{
    memo: MemoT,
    request_rx: mpsc::UnboundedReceiver<LoadRequest<F::Key, F::Value>>,
    keys_to_load: Vec<F::Key>,
    pending_requests: Vec<LoadRequest<F::Key, F::Value>>,
    context: F::Context,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
}

impl<F, MemoT> LoaderWorker<F, MemoT>
where
    F: BatchFunction,
    MemoT: Memo<K = F::Key, V = F::Value>,
{
    pub fn new(
        memo: MemoT,
        request_rx: mpsc::UnboundedReceiver<LoadRequest<F::Key, F::Value>>,
        context: F::Context,
    ) -> Self {
        Self {
            memo,
            request_rx,
            keys_to_load: Vec::new(),
            pending_requests: Vec::new(),
            context,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(std::any::type_name::<F>()),
        }
    }

    pub async fn start(mut self) {
        loop {
            // Async await until we receive the first request.
            match self.request_rx.recv().await {
                None => {
                    tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                    return;
                }
                Some(request) => self.stage_request(request),
            }
            // Flush the remainder of the queue; everything already submitted
            // joins this window.
            while let Some(Some(request)) = self.request_rx.recv().now_or_never() {
                self.stage_request(request);
            }
            if !self.pending_requests.is_empty() {
                self.dispatch_window().await;
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn stage_request(&mut self, request: LoadRequest<F::Key, F::Value>) {
        #[cfg(feature = "stats")]
        self.stats.record_load_request(request.keys().len() as u32);

        let mut memoized = Vec::with_capacity(request.keys().len());
        let mut missing = Vec::new();
        for key in request.keys() {
            match self.memo.get(key) {
                Some(value) => memoized.push(Ok(value.clone())),
                None => missing.push(key.clone()),
            }
        }
        tracing::debug!(requested_keys = ?request.keys(), staged = ?missing);
        #[cfg(feature = "stats")]
        self.stats.record_memo_hits(memoized.len() as u32);

        if missing.is_empty() {
            request.send_response(memoized);
        } else {
            self.keys_to_load.extend(missing);
            self.pending_requests.push(request);
        }
    }

    #[tracing::instrument(skip(self))]
    async fn dispatch_window(&mut self) {
        self.keys_to_load.sort();
        self.keys_to_load.dedup();
        #[cfg(feature = "stats")]
        self.stats.record_dispatch(self.keys_to_load.len() as u32);

        let outcomes = match F::load(&self.keys_to_load, &self.context).await {
            Ok(results) if results.len() == self.keys_to_load.len() => results,
            Ok(results) => {
                tracing::error!(
                    expected = self.keys_to_load.len(),
                    actual = results.len(),
                    "batch function broke the one-result-per-key contract"
                );
                let violation = LoadError::ContractViolation {
                    expected: self.keys_to_load.len(),
                    actual: results.len(),
                };
                vec![Err(violation); self.keys_to_load.len()]
            }
            Err(error) => {
                tracing::error!(%error, "batch function failed");
                vec![Err(LoadError::Batch(error.to_string())); self.keys_to_load.len()]
            }
        };
        tracing::debug!(keys = ?self.keys_to_load, ?outcomes);

        let mut window = HashMap::with_capacity(self.keys_to_load.len());
        let mut loaded = Vec::new();
        for (key, outcome) in self.keys_to_load.drain(..).zip(outcomes) {
            if let Ok(value) = &outcome {
                loaded.push((key.clone(), value.clone()));
            }
            window.insert(key, outcome);
        }
        self.memo.insert_many(loaded);

        let memo = &self.memo;
        for request in self.pending_requests.drain(..) {
            let outcomes =
                request.keys().iter().map(|key| route(memo, &window, key)).collect::<Vec<_>>();
            request.send_response(outcomes);
        }
    }
}

/// Resolves one key of a parked request: outcomes from the window just
/// dispatched win over earlier memoized values.
fn route<K, V, MemoT>(memo: &MemoT, window: &HashMap<K, LoadResult<V>>, key: &K) -> LoadResult<V>
where
    K: Eq + Hash + Debug,
    V: Clone,
    MemoT: Memo<K = K, V = V>,
{
    if let Some(outcome) = window.get(key) {
        return outcome.clone();
    }
    if let Some(value) = memo.get(key) {
        return Ok(value.clone());
    }
    tracing::error!(?key, "requested key missing from both memo and window outcomes");
    Err(LoadError::not_found(key))
}

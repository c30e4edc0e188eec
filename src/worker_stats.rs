/// Batch statistics for one loader worker, reported through `tracing` when the
/// worker is torn down.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Human readable name used to identify this worker stats when it is reported.
    tag: &'static str,
    /// Number of load requests that were received by the worker.
    load_requests: u32,
    /// The total number of keys that were requested for loading (not necessarily unique).
    keys_requested: u32,
    /// The number of keys that were immediately found in the loader memo.
    memo_hits: u32,
    /// Number of dispatch windows this worker closed.
    dispatches: u32,
    /// The average number of distinct keys sent per batch function invocation.
    average_batch_size: f32,
    /// The max number of distinct keys sent during a single invocation.
    max_batch_size: u32,
    /// The min number of distinct keys sent during a single invocation.
    min_batch_size: u32,
}

impl WorkerStats {
    pub fn new(tag: &'static str) -> Self {
        Self { tag, min_batch_size: u32::MAX, ..Default::default() }
    }

    pub fn record_load_request(&mut self, keys_requested: u32) {
        self.load_requests += 1;
        self.keys_requested += keys_requested;
    }

    pub fn record_memo_hits(&mut self, hits: u32) {
        self.memo_hits += hits;
    }

    pub fn record_dispatch(&mut self, batch_size: u32) {
        let dispatches = self.dispatches + 1;
        self.average_batch_size = (((self.average_batch_size as f64 * self.dispatches as f64)
            + batch_size as f64)
            / dispatches as f64) as f32;
        self.dispatches = dispatches;
        if batch_size > self.max_batch_size {
            self.max_batch_size = batch_size;
        }
        if batch_size < self.min_batch_size {
            self.min_batch_size = batch_size;
        }
    }
}

impl Drop for WorkerStats {
    fn drop(&mut self) {
        tracing::debug!(worker_stats = ?self);
    }
}

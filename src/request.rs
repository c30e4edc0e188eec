use std::slice;

use tokio::sync::oneshot;

use crate::error::LoadResult;

/// One caller's outstanding ask, sent to the [`LoaderWorker`] over the request
/// queue. The oneshot sender is the single-assignment result slot: it is
/// consumed by the send, so a request can never be fulfilled twice, and
/// dropping it unfulfilled surfaces as a cancellation on the caller's side.
#[derive(Debug)]
pub enum LoadRequest<K, V> {
    One(K, oneshot::Sender<LoadResult<V>>),
    Many(Vec<K>, oneshot::Sender<Vec<LoadResult<V>>>),
}

impl<K, V> LoadRequest<K, V>
where
    V: Send + Clone + std::fmt::Debug,
{
    pub fn keys(&self) -> &[K] {
        match self {
            LoadRequest::One(ref key, _) => slice::from_ref(key),
            LoadRequest::Many(ref keys, _) => keys,
        }
    }

    /// Fulfills this request with one outcome per key, in [`Self::keys`] order.
    pub fn send_response<I>(self, outcomes: I)
    where
        I: IntoIterator<Item = LoadResult<V>>,
    {
        match self {
            LoadRequest::One(_, response_tx) => {
                let Some(outcome) = outcomes.into_iter().next() else {
                    tracing::error!("no outcome produced for single-key request");
                    return;
                };
                if let Err(e) = response_tx.send(outcome) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
            LoadRequest::Many(_, response_tx) => {
                let response = outcomes.into_iter().collect::<Vec<_>>();
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
        }
    }
}

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::{BoxError, LoadError, LoadResult};

/// A `BatchFunction` defines the method through which some `Loader` may fetch
/// batched data from some resource. The `BatchFunction` receives a slice of the
/// distinct keys that were requested during the `Loader`'s most recent execution
/// frame, and some user defined context struct.
///
/// The output must contain exactly one entry per input key, where position `i`
/// of the output answers position `i` of the key slice. The key ordering is
/// chosen by the loader, not the batch function. A key with no backing entity
/// must be answered with an explicit [`LoadError::NotFound`] in its position;
/// [`resolve_found`] does that bookkeeping for implementations that fetch from
/// a store returning only the rows it found. Returning `Err` instead reports a
/// whole-batch failure (e.g. the backing store is unavailable) and fails every
/// caller waiting on the frame.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context
/// (likely through an `Arc`).
#[async_trait]
pub trait BatchFunction: 'static {
    type Key: Eq + Hash + Ord + Clone + Debug + Send + Sync + 'static;
    type Value: Clone + Debug + Send + 'static;
    type Context: Send + Sync + 'static;

    async fn load(
        keys: &[Self::Key],
        context: &Self::Context,
    ) -> Result<Vec<LoadResult<Self::Value>>, BoxError>;
}

/// Aligns an unordered set of found `(key, value)` pairs against the requested
/// key slice, producing one outcome per requested key in request order. Keys
/// the found set does not cover are answered with [`LoadError::NotFound`].
pub fn resolve_found<K, V, I>(keys: &[K], found: I) -> Vec<LoadResult<V>>
where
    K: Eq + Hash + Debug,
    I: IntoIterator<Item = (K, V)>,
{
    let mut by_key = found.into_iter().collect::<HashMap<K, V>>();
    keys.iter().map(|key| by_key.remove(key).ok_or_else(|| LoadError::not_found(key))).collect()
}

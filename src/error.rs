use std::fmt;

use thiserror::Error;

/// Error type for failures the batch function itself reports, e.g. a lost
/// database connection. Boxed so integrators can surface whatever their
/// backing-store client produces.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of one key's resolution.
pub type LoadResult<V> = Result<V, LoadError>;

/// Per-key outcome errors delivered to load callers.
///
/// Every caller of a key within one dispatch window receives the same
/// outcome, so the error carries owned, cloneable data rather than the
/// originating error value itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The batch function reported that the key has no backing entity.
    #[error("no backing entity for key {key}")]
    NotFound { key: String },
    /// The batch function failed as a whole; no per-key attribution is
    /// possible, so every caller in the window receives this.
    #[error("batch function failed: {0}")]
    Batch(String),
    /// The batch function returned a different number of results than the
    /// number of distinct keys it was given.
    #[error("batch function returned {actual} results for {expected} keys")]
    ContractViolation { expected: usize, actual: usize },
    /// The owning request ended before the load resolved.
    #[error("request scope ended before the load resolved")]
    Cancelled,
}

impl LoadError {
    /// The not-found outcome a batch function reports for `key`.
    pub fn not_found<K: fmt::Debug>(key: &K) -> Self {
        LoadError::NotFound { key: format!("{key:?}") }
    }
}

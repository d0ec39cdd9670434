use strata_store::StoreError;

use crate::cache::PayloadKind;

/// Errors from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A key known as one payload kind was accessed as the other.
    #[error("{resource} holds {actual} content, not {requested}")]
    WrongKind {
        resource: String,
        requested: PayloadKind,
        actual: PayloadKind,
    },

    /// An ignore pattern could not be compiled.
    #[error("invalid ignore pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

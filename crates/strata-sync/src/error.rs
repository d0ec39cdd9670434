use std::time::Duration;

use thiserror::Error;

/// Errors from lock acquisition and release.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A previous holder terminated without releasing the lock.
    #[error("lock {name} was abandoned by a previous holder ({previous})")]
    Abandoned { name: String, previous: String },

    /// A bounded acquisition gave up.
    #[error("timed out after {waited:?} waiting for lock {name}")]
    Timeout { name: String, waited: Duration },

    /// The lock was used in a way that breaks its ownership rules.
    #[error("lock misuse on {name}: {reason}")]
    Consistency { name: String, reason: String },

    /// I/O failure on the lock file.
    #[error("I/O error on lock {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn io(resource: &str, source: std::io::Error) -> Self {
        Self::Io {
            resource: resource.to_string(),
            source,
        }
    }
}

/// Result alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

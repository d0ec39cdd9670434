use strata_doc::DocError;
use strata_sync::SyncError;
use strata_types::NameError;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error on {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    /// The store was asked to do something that contradicts its own state.
    #[error("consistency violation on {resource}: {reason}")]
    Consistency { resource: String, reason: String },

    /// A key or name failed validation.
    #[error(transparent)]
    Name(#[from] NameError),

    /// A stored payload could not be parsed as a document.
    #[error("document error in {resource}: {source}")]
    Document {
        resource: String,
        #[source]
        source: DocError,
    },

    /// Lock failure while guarding a resource.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl StoreError {
    pub fn io(resource: impl ToString, source: std::io::Error) -> Self {
        Self::Io {
            resource: resource.to_string(),
            source,
        }
    }

    pub fn consistency(resource: impl ToString, reason: impl Into<String>) -> Self {
        Self::Consistency {
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

//! Error types for the catalog crate.

use strata_cache::CacheError;
use strata_props::PropsError;
use strata_sync::SyncError;
use strata_types::NameError;

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The id is already registered in the scope.
    #[error("{id} already exists in {scope}")]
    AlreadyExists { scope: String, id: String },

    /// The id is not registered in the scope.
    #[error("{id} not found in {scope}")]
    NotFound { scope: String, id: String },

    /// The id cannot be represented by the backing form.
    #[error("invalid id {id:?}: {reason}")]
    InvalidId { id: String, reason: &'static str },

    /// A scope or id failed name validation.
    #[error(transparent)]
    Name(#[from] NameError),

    /// Reading or writing a record failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Property access failed while filtering or removing.
    #[error(transparent)]
    Props(#[from] PropsError),

    /// The lock guarding the backing record failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = Result<T, CatalogError>;

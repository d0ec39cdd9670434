use std::fmt;

use strata_cache::CacheError;
use strata_catalog::CatalogError;
use strata_doc::DocError;
use strata_props::PropsError;
use strata_store::StoreError;
use strata_sync::SyncError;
use strata_types::NameError;
use thiserror::Error;

/// Coarse classification of every failure the SDK can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A name, key, path expression or configuration value was rejected.
    Validation,
    AlreadyExists,
    NotFound,
    /// Stored state or API usage contradicts an internal invariant.
    Consistency,
    /// A previous lock holder terminated without releasing.
    AbandonedLock,
    StorageIo,
    /// Bounded lock acquisition gave up.
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::AlreadyExists => "already exists",
            Self::NotFound => "not found",
            Self::Consistency => "consistency",
            Self::AbandonedLock => "abandoned lock",
            Self::StorageIo => "storage I/O",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum StrataError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Document(#[from] DocError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Props(#[from] PropsError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{resource} does not hold UTF-8 text")]
    NotText { resource: String },
}

impl StrataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Name(_) => ErrorKind::Validation,
            Self::Sync(e) => sync_kind(e),
            Self::Document(e) => doc_kind(e),
            Self::Store(e) => store_kind(e),
            Self::Cache(e) => cache_kind(e),
            Self::Props(e) => props_kind(e),
            Self::Catalog(e) => catalog_kind(e),
            Self::NotText { .. } => ErrorKind::Consistency,
        }
    }
}

fn sync_kind(e: &SyncError) -> ErrorKind {
    match e {
        SyncError::Abandoned { .. } => ErrorKind::AbandonedLock,
        SyncError::Timeout { .. } => ErrorKind::Timeout,
        SyncError::Consistency { .. } => ErrorKind::Consistency,
        SyncError::Io { .. } => ErrorKind::StorageIo,
    }
}

fn doc_kind(e: &DocError) -> ErrorKind {
    match e {
        DocError::Parse(_) => ErrorKind::Consistency,
        DocError::Query { .. } | DocError::Directive { .. } => ErrorKind::Validation,
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::Io { .. } => ErrorKind::StorageIo,
        StoreError::Consistency { .. } | StoreError::Document { .. } => ErrorKind::Consistency,
        StoreError::Name(_) => ErrorKind::Validation,
        StoreError::Sync(e) => sync_kind(e),
    }
}

fn cache_kind(e: &CacheError) -> ErrorKind {
    match e {
        CacheError::Store(e) => store_kind(e),
        CacheError::WrongKind { .. } => ErrorKind::Consistency,
        CacheError::InvalidPattern { .. } => ErrorKind::Validation,
    }
}

fn props_kind(e: &PropsError) -> ErrorKind {
    match e {
        PropsError::Cache(e) => cache_kind(e),
        PropsError::Name(_) | PropsError::InvalidName { .. } => ErrorKind::Validation,
        PropsError::Consistency { .. } | PropsError::Detached { .. } => ErrorKind::Consistency,
    }
}

fn catalog_kind(e: &CatalogError) -> ErrorKind {
    match e {
        CatalogError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
        CatalogError::NotFound { .. } => ErrorKind::NotFound,
        CatalogError::InvalidId { .. } | CatalogError::Name(_) => ErrorKind::Validation,
        CatalogError::Cache(e) => cache_kind(e),
        CatalogError::Props(e) => props_kind(e),
        CatalogError::Sync(e) => sync_kind(e),
    }
}

pub type StrataResult<T> = Result<T, StrataError>;

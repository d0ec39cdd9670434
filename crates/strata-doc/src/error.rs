use thiserror::Error;

/// Errors from parsing, querying or patching documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocError {
    /// The bytes are not a well-formed document.
    #[error("parse error: {0}")]
    Parse(String),

    /// A path expression could not be understood.
    #[error("invalid path {path:?}: {reason}")]
    Query { path: String, reason: String },

    /// A directive could not be applied.
    #[error("directive failed at {path:?}: {reason}")]
    Directive { path: String, reason: String },
}

/// Result alias for document operations.
pub type DocResult<T> = Result<T, DocError>;

use thiserror::Error;

/// Errors produced when a name or path is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,

    #[error("invalid name {name:?}: {reason}")]
    Invalid { name: String, reason: String },
}

impl NameError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

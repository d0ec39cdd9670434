use strata_cache::CacheError;
use strata_types::NameError;

/// Errors from property operations.
#[derive(Debug, thiserror::Error)]
pub enum PropsError {
    /// Reading or writing the property record failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A scope or id failed validation.
    #[error(transparent)]
    Name(#[from] NameError),

    /// A property name is empty or contains a line break.
    #[error("invalid property name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A single value was requested but several are stored.
    #[error("property {name} of {resource} has {count} values, expected one")]
    Consistency {
        resource: String,
        name: String,
        count: usize,
    },

    /// The handle's entity was removed after the handle was obtained.
    #[error("property table of {resource} was detached by removal of its entity")]
    Detached { resource: String },
}

/// Result alias for property operations.
pub type PropsResult<T> = Result<T, PropsError>;

//! Entity handles.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::{canonical_prefix, validate_name, validate_path, ResourceKey};

use crate::error::CatalogResult;

/// Names one entity `(scope, id)` and derives the keys of its records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRoot {
    scope: String,
    id: String,
}

impl EntityRoot {
    /// Validate both names and build the handle.
    pub fn new(scope: impl Into<String>, id: impl Into<String>) -> CatalogResult<Self> {
        let (scope, id) = (scope.into(), id.into());
        validate_name(&scope)?;
        validate_name(&id)?;
        Ok(Self { scope, id })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key of the record `leaf` (which may itself be a relative path) inside
    /// this entity.
    pub fn key(&self, leaf: &str) -> CatalogResult<ResourceKey> {
        validate_path(leaf)?;
        Ok(ResourceKey::parse(&format!("{}/{}/{leaf}", self.scope, self.id))?)
    }

    /// Canonical prefix matching every record of this entity and nothing else.
    pub fn prefix(&self) -> String {
        canonical_prefix(&format!("{}/{}/", self.scope, self.id))
    }

    /// Whether `other` names the same entity, ignoring case.
    pub fn same_entity(&self, other: &EntityRoot) -> bool {
        self.prefix() == other.prefix()
    }
}

impl fmt::Display for EntityRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.id)
    }
}

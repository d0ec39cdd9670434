//! The scope index: the in-memory id list of one scope and its backing record.
//!
//! The list is hydrated from the backing on first touch. A mutation reloads
//! the backing, applies its change to the fresh list and rewrites the backing
//! before it returns. A single mutex serializes hydration and mutation within
//! the instance; when a [`LockRegistry`] is attached, the whole
//! reload-change-rewrite sequence additionally runs under the named mutex of
//! the backing key, so instances sharing one store never lose each other's
//! changes.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use strata_cache::ContentCache;
use strata_props::PropertyStore;
use strata_sync::{LockRegistry, NamedMutex};
use strata_types::normalize;
use tracing::debug;

use crate::backing::{BackingKind, CatalogBacking};
use crate::entry::EntityRoot;
use crate::error::{CatalogError, CatalogResult};
use crate::filter::PropertyFilter;

/// Membership of one scope.
pub struct ScopeIndex {
    scope: String,
    cache: Arc<ContentCache>,
    props: Arc<PropertyStore>,
    backing: Box<dyn CatalogBacking>,
    locks: Option<Arc<LockRegistry>>,
    /// `None` until hydrated.
    ids: Mutex<Option<Vec<String>>>,
}

impl std::fmt::Debug for ScopeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = self.ids.lock();
        f.debug_struct("ScopeIndex")
            .field("scope", &self.scope)
            .field("hydrated", &ids.is_some())
            .field("len", &ids.as_deref().map(<[String]>::len))
            .finish()
    }
}

impl ScopeIndex {
    /// Create an index for `scope` persisted in the form selected by `kind`.
    pub fn new(
        scope: impl Into<String>,
        kind: BackingKind,
        cache: Arc<ContentCache>,
        props: Arc<PropertyStore>,
    ) -> CatalogResult<Self> {
        Self::with_backing(scope, kind.backing(), cache, props)
    }

    pub fn with_backing(
        scope: impl Into<String>,
        backing: Box<dyn CatalogBacking>,
        cache: Arc<ContentCache>,
        props: Arc<PropertyStore>,
    ) -> CatalogResult<Self> {
        let scope = scope.into();
        backing.validate_scope(&scope)?;
        Ok(Self {
            scope,
            cache,
            props,
            backing,
            locks: None,
            ids: Mutex::new(None),
        })
    }

    /// Guard backing rewrites with named mutexes from `locks`.
    pub fn with_locks(mut self, locks: Arc<LockRegistry>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    // ---------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------

    /// Register `id` and return its handle.
    pub fn add(&self, id: &str) -> CatalogResult<EntityRoot> {
        self.backing.validate_id(id)?;
        let root = EntityRoot::new(self.scope.as_str(), id)?;

        self.mutate(|ids| {
            if position(ids, id).is_some() {
                return Err(CatalogError::AlreadyExists {
                    scope: self.scope.clone(),
                    id: id.to_string(),
                });
            }
            ids.push(id.to_string());
            Ok(())
        })?;
        debug!(scope = %self.scope, id, "entity added");
        Ok(root)
    }

    /// Unregister `id`, then delete every record of the entity.
    ///
    /// The backing is rewritten first. If deleting the records fails
    /// afterwards, the id stays unregistered and the error is returned.
    pub fn remove(&self, id: &str) -> CatalogResult<()> {
        let stored = self.mutate(|ids| match position(ids, id) {
            Some(index) => Ok(ids.remove(index)),
            None => Err(CatalogError::NotFound {
                scope: self.scope.clone(),
                id: id.to_string(),
            }),
        })?;
        let root = EntityRoot::new(self.scope.as_str(), stored.as_str())?;

        self.props.forget(&self.scope, root.id())?;
        let removed = self.cache.remove_prefix(&root.prefix())?;
        debug!(scope = %self.scope, id, records = removed, "entity removed");
        Ok(())
    }

    /// Whether `id` is registered.
    pub fn has(&self, id: &str) -> CatalogResult<bool> {
        let guard = self.hydrated()?;
        Ok(guard.as_deref().is_some_and(|ids| position(ids, id).is_some()))
    }

    pub fn len(&self) -> CatalogResult<usize> {
        Ok(self.hydrated()?.as_deref().map_or(0, <[String]>::len))
    }

    pub fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop the hydrated list so the next operation reloads the backing.
    pub fn reload(&self) {
        *self.ids.lock() = None;
        debug!(scope = %self.scope, "catalog marked for reload");
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    /// Ids in insertion order whose properties satisfy every filter.
    pub fn list(&self, filters: &[PropertyFilter]) -> CatalogResult<Vec<String>> {
        let ids = {
            let guard = self.hydrated()?;
            (*guard).clone().unwrap_or_default()
        };
        if filters.is_empty() {
            return Ok(ids);
        }
        let mut matched = Vec::new();
        for id in ids {
            let set = self.props.props(&self.scope, &id)?.snapshot();
            if filters.iter().all(|f| f.matches(&set)) {
                matched.push(id);
            }
        }
        Ok(matched)
    }

    /// Handles of the entities [`ScopeIndex::list`] would return.
    pub fn entities(&self, filters: &[PropertyFilter]) -> CatalogResult<Vec<EntityRoot>> {
        self.list(filters)?
            .into_iter()
            .map(|id| EntityRoot::new(self.scope.as_str(), id))
            .collect()
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn hydrated(&self) -> CatalogResult<MutexGuard<'_, Option<Vec<String>>>> {
        let mut guard = self.ids.lock();
        if guard.is_none() {
            let ids = self.backing.load(&self.cache, &self.scope)?;
            debug!(scope = %self.scope, ids = ids.len(), "catalog hydrated");
            *guard = Some(ids);
        }
        Ok(guard)
    }

    /// Reload the backing, apply `change` and rewrite the backing, all under
    /// the named mutex of the backing key when locks are attached. The
    /// hydrated list is replaced by the stored one, or by the reloaded one
    /// when `change` or the rewrite fails.
    fn mutate<T>(&self, change: impl FnOnce(&mut Vec<String>) -> CatalogResult<T>) -> CatalogResult<T> {
        let mut guard = self.ids.lock();
        let key = self.backing.key(&self.scope)?;
        let mutex: Option<NamedMutex> = self.locks.as_ref().map(|locks| locks.mutex(key.canonical()));
        let _held = mutex.as_ref().map(NamedMutex::lock).transpose()?;

        self.cache.evict(&key);
        let current = self.backing.load(&self.cache, &self.scope)?;
        let mut ids = current.clone();
        let outcome = change(&mut ids).and_then(|value| {
            self.backing.store(&self.cache, &self.scope, &ids)?;
            Ok(value)
        });
        *guard = Some(if outcome.is_ok() { ids } else { current });
        outcome
    }
}

fn position(ids: &[String], id: &str) -> Option<usize> {
    let wanted = normalize(id);
    ids.iter().position(|existing| normalize(existing) == wanted)
}

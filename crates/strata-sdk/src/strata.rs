use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tempfile::TempDir;
use strata_cache::ContentCache;
use strata_catalog::{EntityRoot, ScopeIndex};
use strata_props::{Properties, PropertyStore};
use strata_store::{Backend, FsStore, MemoryStore, ParsingStore, StoreError};
use strata_sync::{LocalPipe, LockRegistry, NamedMutex};
use strata_types::{normalize, validate_name};
use tracing::{debug, info};

use crate::config::StrataConfig;
use crate::entity::Entity;
use crate::error::StrataResult;

/// High-level Strata API.
///
/// Owns every shared structure of one storage instance; nothing is global,
/// so several instances may coexist in one process.
pub struct Strata {
    config: StrataConfig,
    cache: Arc<ContentCache>,
    props: Arc<PropertyStore>,
    locks: Arc<LockRegistry>,
    catalogs: RwLock<HashMap<String, Arc<ScopeIndex>>>,
    /// Private lock directory of an in-memory instance; removed on drop.
    _scratch_locks: Option<TempDir>,
}

impl Strata {
    /// Open an instance described by `config`.
    pub fn open(config: StrataConfig) -> StrataResult<Self> {
        let backend: Arc<dyn Backend> = match &config.root {
            Some(root) => Arc::new(ParsingStore::new(FsStore::open(root)?)),
            None => Arc::new(ParsingStore::new(MemoryStore::new())),
        };
        let cache = Arc::new(ContentCache::new(backend, &config.cache)?);
        let props = Arc::new(PropertyStore::new(Arc::clone(&cache)));
        let (lock_dir, scratch_locks) = match config.effective_lock_dir() {
            Some(dir) => (dir, None),
            None => {
                let scratch = tempfile::Builder::new()
                    .prefix("strata-locks-")
                    .tempdir()
                    .map_err(|e| StoreError::io("lock directory", e))?;
                (scratch.path().to_path_buf(), Some(scratch))
            }
        };
        let locks = LockRegistry::new(lock_dir);
        info!(
            root = ?config.root,
            lock_dir = %locks.lock_dir().display(),
            catalog = ?config.catalog,
            "strata opened"
        );
        Ok(Self {
            config,
            cache,
            props,
            locks,
            catalogs: RwLock::new(HashMap::new()),
            _scratch_locks: scratch_locks,
        })
    }

    /// A fresh in-memory instance with default settings.
    pub fn in_memory() -> StrataResult<Self> {
        Self::open(StrataConfig::in_memory())
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    // ---- Catalogs ----

    /// The index of `scope`. One index exists per scope and instance.
    pub fn catalog(&self, scope: &str) -> StrataResult<Arc<ScopeIndex>> {
        validate_name(scope)?;
        let name = normalize(scope);
        if let Some(index) = self.catalogs.read().get(&name) {
            return Ok(Arc::clone(index));
        }

        let mut catalogs = self.catalogs.write();
        if let Some(index) = catalogs.get(&name) {
            return Ok(Arc::clone(index));
        }
        let index = ScopeIndex::new(scope, self.config.catalog, Arc::clone(&self.cache), Arc::clone(&self.props))?
            .with_locks(Arc::clone(&self.locks));
        let index = Arc::new(index);
        catalogs.insert(name, Arc::clone(&index));
        debug!(scope, "catalog opened");
        Ok(index)
    }

    // ---- Entities ----

    /// Handle on entity `(scope, id)`. Membership in the catalog is not
    /// checked.
    pub fn entity(&self, scope: &str, id: &str) -> StrataResult<Entity> {
        let root = EntityRoot::new(scope, id)?;
        Ok(self.entity_at(root))
    }

    pub fn entity_at(&self, root: EntityRoot) -> Entity {
        Entity::new(
            root,
            Arc::clone(&self.cache),
            Arc::clone(&self.props),
            Arc::clone(&self.locks),
        )
    }

    pub fn props(&self, scope: &str, id: &str) -> StrataResult<Properties> {
        Ok(self.props.props(scope, id)?)
    }

    // ---- Synchronization ----

    /// A machine-wide mutex named `name`.
    pub fn mutex(&self, name: &str) -> NamedMutex {
        self.locks.mutex(name)
    }

    /// The process-local serialization pipe of this instance.
    pub fn pipe(&self) -> &LocalPipe {
        self.locks.pipe()
    }

    // ---- Introspection ----

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }
}

impl std::fmt::Debug for Strata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strata")
            .field("config", &self.config)
            .field("catalogs", &self.catalogs.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StrataError};
    use strata_catalog::{BackingKind, PropertyFilter};

    fn on_disk(dir: &std::path::Path, catalog: BackingKind) -> Strata {
        Strata::open(StrataConfig {
            catalog,
            ..StrataConfig::at(dir)
        })
        .unwrap()
    }

    #[test]
    fn catalog_is_shared_per_scope() {
        let strata = Strata::in_memory().unwrap();
        let a = strata.catalog("fleet").unwrap();
        let b = strata.catalog("FLEET").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &strata.catalog("depot").unwrap()));
    }

    #[test]
    fn invalid_scope_is_validation_error() {
        let strata = Strata::in_memory().unwrap();
        assert_eq!(strata.catalog("a/b").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(strata.catalog("1x").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn fleet_scenario() {
        for catalog in [BackingKind::Document, BackingKind::Ledger] {
            let dir = tempfile::tempdir().unwrap();
            let strata = on_disk(dir.path(), catalog);
            let fleet = strata.catalog("fleet").unwrap();

            fleet.add("truck-1").unwrap();
            let duplicate = fleet.add("truck-1").unwrap_err();
            assert_eq!(StrataError::from(duplicate).kind(), ErrorKind::AlreadyExists);

            let truck = strata.entity("fleet", "truck-1").unwrap();
            truck.props().unwrap().refine("status", ["active"]).unwrap();
            truck.cell("odometer").unwrap().write("120").unwrap();

            let active = [PropertyFilter::equals("status", "active")];
            assert_eq!(fleet.list(&active).unwrap(), ["truck-1"]);
            assert_eq!(truck.cell("odometer").unwrap().read_string().unwrap(), "120");

            fleet.remove("truck-1").unwrap();
            assert!(truck.cell("odometer").unwrap().read().unwrap().is_empty());
            assert!(fleet.list(&active).unwrap().is_empty());
            assert_eq!(
                StrataError::from(fleet.remove("truck-1").unwrap_err()).kind(),
                ErrorKind::NotFound
            );
        }
    }

    #[test]
    fn reopen_sees_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let strata = on_disk(dir.path(), BackingKind::Document);
            strata.catalog("fleet").unwrap().add("truck-1").unwrap();
            strata.props("fleet", "truck-1").unwrap().refine("tags", ["north", "cold"]).unwrap();
        }
        let strata = on_disk(dir.path(), BackingKind::Document);
        assert_eq!(strata.catalog("fleet").unwrap().list(&[]).unwrap(), ["truck-1"]);
        assert_eq!(strata.props("fleet", "truck-1").unwrap().values("tags"), ["north", "cold"]);
        assert!(dir.path().join("fleet").join("catalog.xml").is_file());
    }

    #[test]
    fn instances_on_one_root_keep_each_others_adds() {
        for catalog in [BackingKind::Document, BackingKind::Ledger] {
            let dir = tempfile::tempdir().unwrap();
            let a = on_disk(dir.path(), catalog);
            let b = on_disk(dir.path(), catalog);
            assert!(a.catalog("fleet").unwrap().is_empty().unwrap());
            assert!(b.catalog("fleet").unwrap().is_empty().unwrap());

            a.catalog("fleet").unwrap().add("truck-a").unwrap();
            b.catalog("fleet").unwrap().add("truck-b").unwrap();

            let fresh = on_disk(dir.path(), catalog);
            assert_eq!(fresh.catalog("fleet").unwrap().list(&[]).unwrap(), ["truck-a", "truck-b"], "{catalog:?}");
        }
    }

    #[test]
    fn catalog_record_names_are_not_entity_ids() {
        let dir = tempfile::tempdir().unwrap();
        let strata = on_disk(dir.path(), BackingKind::Document);
        let fleet = strata.catalog("fleet").unwrap();
        fleet.add("truck-1").unwrap();
        for id in ["catalog.xml", "catalog.cat"] {
            let err = StrataError::from(fleet.add(id).unwrap_err());
            assert_eq!(err.kind(), ErrorKind::Validation, "{id}");
        }
        assert_eq!(fleet.list(&[]).unwrap(), ["truck-1"]);
    }

    #[test]
    fn in_memory_instances_do_not_share_locks() {
        let a = Strata::in_memory().unwrap();
        let b = Strata::in_memory().unwrap();
        assert_ne!(a.locks().lock_dir(), b.locks().lock_dir());

        let held = a.mutex("fleet/truck-1/odometer");
        held.acquire().unwrap();
        let other = b.mutex("fleet/truck-1/odometer");
        other.acquire_timeout(std::time::Duration::from_millis(100)).unwrap();
        other.release().unwrap();
        held.release().unwrap();
    }

    #[test]
    fn in_memory_lock_dir_is_removed_on_drop() {
        let strata = Strata::in_memory().unwrap();
        strata.mutex("jobs/nightly").with(|| ()).unwrap();
        let lock_dir = strata.locks().lock_dir().to_path_buf();
        assert!(lock_dir.is_dir());
        drop(strata);
        assert!(!lock_dir.exists());
    }

    #[test]
    fn mutex_and_pipe_are_instance_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let strata = Strata::open(StrataConfig {
            lock_dir: Some(dir.path().to_path_buf()),
            ..StrataConfig::in_memory()
        })
        .unwrap();
        let mutex = strata.mutex("jobs/nightly");
        mutex.with(|| ()).unwrap();
        assert!(mutex.lock_path().starts_with(dir.path()));
        assert_eq!(strata.pipe().run("jobs/nightly", || 7), 7);
    }
}

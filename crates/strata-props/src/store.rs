use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use strata_cache::ContentCache;
use strata_types::{validate_name, ResourceKey};
use tracing::{debug, warn};

use crate::codec::{decode, encode};
use crate::error::{PropsError, PropsResult};
use crate::set::PropertySet;

/// Leaf name of the property record inside an entity.
pub const PROPS_LEAF: &str = "props.cat";

/// Memoizing access to entity property tables.
///
/// One parsed table is kept per record key and shared by every
/// [`Properties`] handle for that entity.
pub struct PropertyStore {
    cache: Arc<ContentCache>,
    tables: RwLock<HashMap<ResourceKey, SharedTable>>,
}

type SharedTable = Arc<RwLock<Table>>;

struct Table {
    set: PropertySet,
    /// Set once the store has forgotten the table. Handles still holding it
    /// read nothing and refuse writes.
    detached: bool,
}

impl PropertyStore {
    pub fn new(cache: Arc<ContentCache>) -> Self {
        Self {
            cache,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Record key of the properties of `(scope, id)`.
    pub fn key_for(scope: &str, id: &str) -> PropsResult<ResourceKey> {
        validate_name(scope)?;
        validate_name(id)?;
        Ok(ResourceKey::join(&[scope, id, PROPS_LEAF])?)
    }

    /// Properties of `(scope, id)`, loading the table on first access.
    pub fn props(&self, scope: &str, id: &str) -> PropsResult<Properties> {
        let key = Self::key_for(scope, id)?;
        if let Some(table) = self.tables.read().get(&key) {
            return Ok(self.handle(key, Arc::clone(table)));
        }

        let raw = self.cache.read_bytes_or_empty(&key)?;
        let text = match std::str::from_utf8(&raw) {
            Ok(text) => text.to_string(),
            Err(_) => {
                warn!(key = %key, "property record is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(&raw).into_owned()
            }
        };
        let loaded = decode(&text);
        debug!(key = %key, properties = loaded.len(), "property table loaded");

        let table = Arc::clone(
            self.tables
                .write()
                .entry(key.clone())
                .or_insert_with(|| {
                    Arc::new(RwLock::new(Table {
                        set: loaded,
                        detached: false,
                    }))
                }),
        );
        Ok(self.handle(key, table))
    }

    /// Drop the memoized table of `(scope, id)` and detach every handle on it.
    /// Returns whether one was held. The next [`props`](Self::props) call
    /// loads a fresh table from storage.
    pub fn forget(&self, scope: &str, id: &str) -> PropsResult<bool> {
        let key = Self::key_for(scope, id)?;
        let Some(table) = self.tables.write().remove(&key) else {
            return Ok(false);
        };
        let mut table = table.write();
        table.detached = true;
        table.set = PropertySet::default();
        debug!(key = %key, "property table detached");
        Ok(true)
    }

    /// Number of memoized tables.
    pub fn loaded(&self) -> usize {
        self.tables.read().len()
    }

    fn handle(&self, key: ResourceKey, table: SharedTable) -> Properties {
        Properties {
            key,
            table,
            cache: Arc::clone(&self.cache),
        }
    }
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyStore")
            .field("loaded", &self.loaded())
            .finish()
    }
}

/// Handle on one entity's property table.
///
/// Clones share the same table. Every mutation is written through to the
/// record before the table lock is released. A handle obtained before its
/// entity was removed is detached: it reads no properties and its mutations
/// fail with [`PropsError::Detached`].
#[derive(Clone)]
pub struct Properties {
    key: ResourceKey,
    table: SharedTable,
    cache: Arc<ContentCache>,
}

impl Properties {
    /// Replace all values of `name`; an empty list removes the property.
    pub fn refine<I>(&self, name: &str, values: I) -> PropsResult<()>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        validate_property_name(name)?;
        let values: Vec<String> = values.into_iter().map(Into::into).collect();

        let mut table = self.table.write();
        if table.detached {
            return Err(PropsError::Detached {
                resource: self.key.to_string(),
            });
        }
        let mut next = table.set.clone();
        next.set(name, values);
        if next == table.set {
            return Ok(());
        }
        self.cache.write_bytes(&self.key, encode(&next).as_bytes())?;
        debug!(key = %self.key, name, "property refined");
        table.set = next;
        Ok(())
    }

    /// Remove `name`. Same as refining it with no values.
    pub fn clear(&self, name: &str) -> PropsResult<()> {
        self.refine(name, Vec::<String>::new())
    }

    /// The single value of `name`, or `default` when absent.
    pub fn value(&self, name: &str, default: &str) -> PropsResult<String> {
        let table = self.table.read();
        match table.set.values(name) {
            [] => Ok(default.to_string()),
            [one] => Ok(one.clone()),
            many => Err(PropsError::Consistency {
                resource: self.key.to_string(),
                name: name.to_string(),
                count: many.len(),
            }),
        }
    }

    /// All values of `name` in order, empty when absent.
    pub fn values(&self, name: &str) -> Vec<String> {
        self.table.read().set.values(name).to_vec()
    }

    pub fn names(&self) -> Vec<String> {
        self.table.read().set.names().map(str::to_string).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().set.contains(name)
    }

    /// Immutable copy of the current table.
    pub fn snapshot(&self) -> PropertySet {
        self.table.read().set.clone()
    }

    /// Whether the entity was removed after this handle was obtained.
    pub fn is_detached(&self) -> bool {
        self.table.read().detached
    }

    /// Record key backing this table.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }
}

impl std::fmt::Debug for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Properties")
            .field("key", &self.key)
            .field("table", &self.table.read().set)
            .finish()
    }
}

fn validate_property_name(name: &str) -> PropsResult<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.contains(['\r', '\n']) {
        "must not contain line breaks"
    } else {
        return Ok(());
    };
    Err(PropsError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

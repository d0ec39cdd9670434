use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use strata_doc::Document;
use strata_store::{Backend, Producer, StoreError, TreeProducer};
use strata_sync::LocalPipe;
use strata_types::{canonical_prefix, ResourceKey};
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::policy::SkipPolicy;

/// The payload form a key is accessed as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Bytes,
    Tree,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes => write!(f, "bytes"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// Hit/miss counters for a cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Payloads read or written but not retained because of the skip policy.
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    skipped: AtomicU64,
}

struct Listing {
    epoch: u64,
    keys: Arc<Vec<ResourceKey>>,
}

type Table<T> = RwLock<HashMap<String, T>>;

/// Read-through/write-through cache in front of a single backend.
///
/// Bytes and documents live in separate tables; a key accessed as one kind
/// cannot be accessed as the other until it is deleted. Fills racing with a
/// write are discarded: every write bumps `epoch` under the table lock both
/// before and after it reaches the store, and a fill is only applied when the
/// epoch it observed before reading the store is still current. Writes to one
/// key are serialized so the retained entry always matches the store.
pub struct ContentCache {
    next: Arc<dyn Backend>,
    policy: SkipPolicy,
    bytes: Table<Bytes>,
    trees: Table<Document>,
    kinds: Table<PayloadKind>,
    listing: RwLock<Option<Listing>>,
    epoch: AtomicU64,
    counters: Counters,
    writers: LocalPipe,
}

impl ContentCache {
    /// Create a cache over `next` with a policy compiled from `config`.
    pub fn new(next: Arc<dyn Backend>, config: &CacheConfig) -> CacheResult<Self> {
        Ok(Self::with_policy(next, SkipPolicy::from_config(config)?))
    }

    pub fn with_policy(next: Arc<dyn Backend>, policy: SkipPolicy) -> Self {
        Self {
            next,
            policy,
            bytes: RwLock::new(HashMap::new()),
            trees: RwLock::new(HashMap::new()),
            kinds: RwLock::new(HashMap::new()),
            listing: RwLock::new(None),
            epoch: AtomicU64::new(0),
            counters: Counters::default(),
            writers: LocalPipe::new(),
        }
    }

    /// The backend this cache delegates to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.next
    }

    pub fn policy(&self) -> &SkipPolicy {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // Bytes
    // -----------------------------------------------------------------------

    /// Read the bytes at `key`, producing them through the store if absent.
    pub fn read_bytes(&self, key: &ResourceKey, if_absent: Producer<'_>) -> CacheResult<Bytes> {
        self.check_kind(key, PayloadKind::Bytes)?;
        if let Some(hit) = self.bytes.read().get(key.canonical()) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let observed = self.epoch.load(Ordering::Acquire);
        let next = &self.next;
        let data = next.bytes(key, &mut || {
            if next.contains(key)? {
                return Err(producer_misuse(key));
            }
            if_absent()
        })?;

        if !data.is_empty() {
            self.fill(&self.bytes, key, PayloadKind::Bytes, observed, data.len(), || data.clone());
        }
        Ok(data)
    }

    /// Read the bytes at `key`, empty when absent.
    pub fn read_bytes_or_empty(&self, key: &ResourceKey) -> CacheResult<Bytes> {
        self.read_bytes(key, &mut || Ok(Bytes::new()))
    }

    /// Write the bytes at `key`; empty data deletes the record.
    pub fn write_bytes(&self, key: &ResourceKey, data: &[u8]) -> CacheResult<()> {
        if data.is_empty() {
            return self.delete(key);
        }
        self.check_kind(key, PayloadKind::Bytes)?;
        let retained = if self.skip(key, data.len()) {
            None
        } else {
            Some(Bytes::copy_from_slice(data))
        };
        self.write_through(&self.bytes, key, retained, PayloadKind::Bytes, || {
            self.next.update_bytes(key, data)
        })
    }

    // -----------------------------------------------------------------------
    // Trees
    // -----------------------------------------------------------------------

    /// Read the document at `key`, producing it through the store if absent.
    /// Cache hits are never re-parsed.
    pub fn read_tree(&self, key: &ResourceKey, if_absent: TreeProducer<'_>) -> CacheResult<Document> {
        self.check_kind(key, PayloadKind::Tree)?;
        if let Some(hit) = self.trees.read().get(key.canonical()) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let observed = self.epoch.load(Ordering::Acquire);
        let next = &self.next;
        let doc = next.tree(key, &mut || {
            if next.contains(key)? {
                return Err(producer_misuse(key));
            }
            if_absent()
        })?;

        if !doc.is_empty() {
            let size = next.serialized_len(&doc);
            self.fill(&self.trees, key, PayloadKind::Tree, observed, size, || doc.clone());
        }
        Ok(doc)
    }

    /// Read the document at `key`, empty when absent.
    pub fn read_tree_or_empty(&self, key: &ResourceKey) -> CacheResult<Document> {
        self.read_tree(key, &mut || Ok(Document::empty()))
    }

    /// Write the document at `key`; a document without a root deletes the record.
    pub fn write_tree(&self, key: &ResourceKey, doc: &Document) -> CacheResult<()> {
        if doc.is_empty() {
            return self.delete(key);
        }
        self.check_kind(key, PayloadKind::Tree)?;
        let retained = if self.skip(key, self.next.serialized_len(doc)) {
            None
        } else {
            Some(doc.clone())
        };
        self.write_through(&self.trees, key, retained, PayloadKind::Tree, || {
            self.next.update_tree(key, doc)
        })
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Delete the record at `key` whatever its kind, forgetting the kind.
    pub fn delete(&self, key: &ResourceKey) -> CacheResult<()> {
        self.writers.run(key.canonical(), || self.delete_serialized(key))
    }

    fn delete_serialized(&self, key: &ResourceKey) -> CacheResult<()> {
        self.begin_write(key);
        let result = self.next.update_bytes(key, &[]);
        {
            let mut bytes = self.bytes.write();
            let mut trees = self.trees.write();
            bytes.remove(key.canonical());
            trees.remove(key.canonical());
            self.kinds.write().remove(key.canonical());
            self.epoch.fetch_add(1, Ordering::AcqRel);
        }
        debug!(key = %key, "cache delete");
        Ok(result?)
    }

    /// Delete every record whose key lies under `prefix`. Returns the number
    /// of records deleted.
    pub fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let keys = self.enumerate(prefix)?;
        for key in keys.iter() {
            self.delete(key)?;
        }
        debug!(prefix, removed = keys.len(), "cache remove prefix");
        Ok(keys.len())
    }

    /// Drop cached state for `key` without touching the store.
    pub fn evict(&self, key: &ResourceKey) -> bool {
        let a = self.bytes.write().remove(key.canonical()).is_some();
        let b = self.trees.write().remove(key.canonical()).is_some();
        a || b
    }

    /// Drop cached state, including the listing, for every key under `prefix`.
    pub fn evict_prefix(&self, prefix: &str) -> usize {
        let prefix = canonical_prefix(prefix);
        let mut evicted = 0;
        self.bytes.write().retain(|k, _| {
            let keep = !k.starts_with(&prefix);
            evicted += usize::from(!keep);
            keep
        });
        self.trees.write().retain(|k, _| {
            let keep = !k.starts_with(&prefix);
            evicted += usize::from(!keep);
            keep
        });
        *self.listing.write() = None;
        evicted
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    /// Keys known to the store under `prefix`, sorted.
    pub fn enumerate(&self, prefix: &str) -> CacheResult<Vec<ResourceKey>> {
        let prefix = canonical_prefix(prefix);
        let keys = self.listing()?;
        Ok(keys.iter().filter(|k| k.has_prefix(&prefix)).cloned().collect())
    }

    fn listing(&self) -> CacheResult<Arc<Vec<ResourceKey>>> {
        let observed = self.epoch.load(Ordering::Acquire);
        if let Some(listing) = self.listing.read().as_ref() {
            if listing.epoch == observed {
                return Ok(Arc::clone(&listing.keys));
            }
        }
        let keys = Arc::new(self.next.knowledge("")?);
        debug!(epoch = observed, keys = keys.len(), "listing refreshed");
        *self.listing.write() = Some(Listing {
            epoch: observed,
            keys: Arc::clone(&keys),
        });
        Ok(keys)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Whether `key` is currently retained in either table.
    pub fn is_cached(&self, key: &ResourceKey) -> bool {
        self.bytes.read().contains_key(key.canonical())
            || self.trees.read().contains_key(key.canonical())
    }

    /// Number of retained entries across both tables.
    pub fn cached_len(&self) -> usize {
        self.bytes.read().len() + self.trees.read().len()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check_kind(&self, key: &ResourceKey, requested: PayloadKind) -> CacheResult<()> {
        match self.kinds.read().get(key.canonical()) {
            Some(&actual) if actual != requested => Err(CacheError::WrongKind {
                resource: key.to_string(),
                requested,
                actual,
            }),
            _ => Ok(()),
        }
    }

    fn remember_kind(&self, key: &ResourceKey, kind: PayloadKind) {
        self.kinds.write().insert(key.canonical().to_string(), kind);
    }

    fn skip(&self, key: &ResourceKey, size: usize) -> bool {
        let skip = self.policy.skips(key, size);
        if skip {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, size, "cache skip");
        }
        skip
    }

    /// Record the kind of a key just read from the store and retain its
    /// payload unless skipped. Both are dropped if a write raced the read.
    fn fill<T>(
        &self,
        table: &Table<T>,
        key: &ResourceKey,
        kind: PayloadKind,
        observed: u64,
        size: usize,
        value: impl FnOnce() -> T,
    ) {
        let skip = self.skip(key, size);
        let mut table = table.write();
        if self.epoch.load(Ordering::Acquire) != observed {
            debug!(key = %key, "cache fill raced a write, discarded");
            return;
        }
        self.remember_kind(key, kind);
        if skip {
            return;
        }
        table.entry(key.canonical().to_string()).or_insert_with(value);
        debug!(key = %key, size, "cache populate");
    }

    fn begin_write(&self, key: &ResourceKey) {
        let mut bytes = self.bytes.write();
        let mut trees = self.trees.write();
        bytes.remove(key.canonical());
        trees.remove(key.canonical());
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn write_through<T>(
        &self,
        table: &Table<T>,
        key: &ResourceKey,
        retained: Option<T>,
        kind: PayloadKind,
        forward: impl FnOnce() -> Result<(), StoreError>,
    ) -> CacheResult<()> {
        self.writers.run(key.canonical(), || self.write_serialized(table, key, retained, kind, forward))
    }

    fn write_serialized<T>(
        &self,
        table: &Table<T>,
        key: &ResourceKey,
        retained: Option<T>,
        kind: PayloadKind,
        forward: impl FnOnce() -> Result<(), StoreError>,
    ) -> CacheResult<()> {
        self.begin_write(key);
        let result = forward();
        {
            let mut table = table.write();
            if result.is_ok() {
                if let Some(value) = retained {
                    table.insert(key.canonical().to_string(), value);
                }
                self.remember_kind(key, kind);
            }
            self.epoch.fetch_add(1, Ordering::AcqRel);
        }
        debug!(key = %key, %kind, ok = result.is_ok(), "cache write");
        Ok(result?)
    }
}

fn producer_misuse(key: &ResourceKey) -> StoreError {
    StoreError::consistency(key, "producer invoked although the store holds the key")
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("policy", &self.policy)
            .field("cached", &self.cached_len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

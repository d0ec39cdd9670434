use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::RwLock;
use strata_sync::LocalPipe;
use strata_types::{canonical_prefix, ResourceKey};
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::{ContentStore, Producer};

/// In-memory, `BTreeMap`-based content store.
///
/// Intended for tests and embedding. Records live behind a `RwLock`; payloads
/// are reference-counted [`Bytes`], so reads never copy. Data is lost when the
/// store is dropped.
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, (ResourceKey, Bytes)>>,
    pipe: LocalPipe,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            pipe: LocalPipe::new(),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Total bytes across all stored records.
    pub fn total_bytes(&self) -> u64 {
        self.records
            .read()
            .values()
            .map(|(_, data)| data.len() as u64)
            .sum()
    }

    /// Remove all records from the store.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    fn get(&self, key: &ResourceKey) -> Option<Bytes> {
        self.records
            .read()
            .get(key.canonical())
            .map(|(_, data)| data.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for MemoryStore {
    fn bytes(&self, key: &ResourceKey, if_absent: Producer<'_>) -> StoreResult<Bytes> {
        if let Some(data) = self.get(key) {
            return Ok(data);
        }
        // The producer runs outside the table lock, serialized per key.
        self.pipe.run(key.canonical(), || {
            if let Some(data) = self.get(key) {
                return Ok(data);
            }
            let produced = if_absent()?;
            if !produced.is_empty() {
                debug!(key = %key, len = produced.len(), "memory store: produced record");
                self.records
                    .write()
                    .insert(key.canonical().to_string(), (key.clone(), produced.clone()));
            }
            Ok(produced)
        })
    }

    fn update_bytes(&self, key: &ResourceKey, data: &[u8]) -> StoreResult<()> {
        self.pipe.run(key.canonical(), || {
            let mut records = self.records.write();
            if data.is_empty() {
                if records.remove(key.canonical()).is_some() {
                    debug!(key = %key, "memory store: deleted record");
                }
            } else {
                records.insert(
                    key.canonical().to_string(),
                    (key.clone(), Bytes::copy_from_slice(data)),
                );
            }
        });
        Ok(())
    }

    fn knowledge(&self, prefix: &str) -> StoreResult<Vec<ResourceKey>> {
        let prefix = canonical_prefix(prefix);
        let records = self.records.read();
        Ok(records
            .range(prefix.clone()..)
            .take_while(|(canonical, _)| canonical.starts_with(&prefix))
            .map(|(_, (key, _))| key.clone())
            .collect())
    }

    fn contains(&self, key: &ResourceKey) -> StoreResult<bool> {
        Ok(self.records.read().contains_key(key.canonical()))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("record_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::Arc;
    use std::thread;

    fn key(raw: &str) -> ResourceKey {
        ResourceKey::parse(raw).unwrap()
    }

    fn failing() -> StoreResult<Bytes> {
        Err(StoreError::consistency("test", "producer must not run"))
    }

    // -----------------------------------------------------------------------
    // Read-through
    // -----------------------------------------------------------------------

    #[test]
    fn producer_output_is_persisted() {
        let store = MemoryStore::new();
        let data = store
            .bytes(&key("fleet/t1/odometer"), &mut || Ok(Bytes::from_static(b"1200")))
            .unwrap();
        assert_eq!(&data[..], b"1200");
        assert_eq!(store.len(), 1);

        let again = store.bytes(&key("fleet/t1/odometer"), &mut failing).unwrap();
        assert_eq!(&again[..], b"1200");
    }

    #[test]
    fn empty_producer_output_is_not_persisted() {
        let store = MemoryStore::new();
        let data = store.bytes(&key("a"), &mut || Ok(Bytes::new())).unwrap();
        assert!(data.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn producer_error_propagates() {
        let store = MemoryStore::new();
        assert!(store.bytes(&key("a"), &mut failing).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn normalized_keys_share_a_record() {
        let store = MemoryStore::new();
        store.bytes(&key("A/B"), &mut || Ok(Bytes::from_static(b"first"))).unwrap();
        let second = store.bytes(&key("a\\b"), &mut failing).unwrap();
        assert_eq!(&second[..], b"first");
    }

    // -----------------------------------------------------------------------
    // Write / delete
    // -----------------------------------------------------------------------

    #[test]
    fn update_then_read() {
        let store = MemoryStore::new();
        store.update_bytes(&key("a/b"), b"data").unwrap();
        assert!(store.contains(&key("A/B")).unwrap());
        assert_eq!(&store.bytes(&key("a/b"), &mut failing).unwrap()[..], b"data");
        assert_eq!(store.total_bytes(), 4);
    }

    #[test]
    fn empty_write_deletes() {
        let store = MemoryStore::new();
        store.update_bytes(&key("a/b"), b"data").unwrap();
        store.update_bytes(&key("a/b"), b"").unwrap();
        assert!(!store.contains(&key("a/b")).unwrap());
        assert!(store.knowledge("").unwrap().is_empty());
        // Deleting an absent record is fine.
        store.update_bytes(&key("a/b"), b"").unwrap();
    }

    #[test]
    fn knowledge_filters_by_canonical_prefix() {
        let store = MemoryStore::new();
        for raw in ["fleet/t1/a", "fleet/t1/b", "fleet/t10/a", "garage/x"] {
            store.update_bytes(&key(raw), b"x").unwrap();
        }
        let under_t1: Vec<_> = store
            .knowledge("Fleet\\T1\\")
            .unwrap()
            .into_iter()
            .map(|k| k.canonical().to_string())
            .collect();
        assert_eq!(under_t1, vec!["fleet/t1/a", "fleet/t1/b"]);
        assert_eq!(store.knowledge("fleet").unwrap().len(), 3);
        assert_eq!(store.knowledge("").unwrap().len(), 4);
    }

    #[test]
    fn knowledge_keeps_original_spelling() {
        let store = MemoryStore::new();
        store.update_bytes(&key("Fleet/Truck-1"), b"x").unwrap();
        let keys = store.knowledge("").unwrap();
        assert_eq!(keys[0].original(), "Fleet/Truck-1");
    }

    #[test]
    fn clear_removes_all() {
        let store = MemoryStore::new();
        store.update_bytes(&key("a"), b"1").unwrap();
        store.update_bytes(&key("b"), b"2").unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_first_reads_produce_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = Arc::new(MemoryStore::new());
        let produced = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let produced = Arc::clone(&produced);
                thread::spawn(move || {
                    store
                        .bytes(&key("shared"), &mut || {
                            produced.fetch_add(1, Ordering::SeqCst);
                            Ok(Bytes::from_static(b"v"))
                        })
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            assert_eq!(&h.join().expect("thread should not panic")[..], b"v");
        }
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_format() {
        let store = MemoryStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("MemoryStore"));
        assert!(debug.contains("record_count"));
    }
}

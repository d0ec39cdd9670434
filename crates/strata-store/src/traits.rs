use bytes::Bytes;
use strata_doc::Document;
use strata_types::ResourceKey;

use crate::error::StoreResult;

/// Producer of a default byte payload, invoked only for absent records.
pub type Producer<'a> = &'a mut dyn FnMut() -> StoreResult<Bytes>;

/// Producer of a default tree payload, invoked only for absent records.
pub type TreeProducer<'a> = &'a mut dyn FnMut() -> StoreResult<Document>;

/// Byte key/value backend.
///
/// All implementations must satisfy these invariants:
/// - Keys are compared by their canonical form only.
/// - `if_absent` is invoked only if the store holds no record for the key;
///   a non-empty produced payload is persisted before it is returned.
/// - An empty payload is never stored: writing one deletes the record.
/// - All I/O errors are propagated, never silently ignored.
pub trait ContentStore: Send + Sync {
    /// Read the record for `key`, producing and persisting it if absent.
    fn bytes(&self, key: &ResourceKey, if_absent: Producer<'_>) -> StoreResult<Bytes>;

    /// Write (or, with empty `data`, delete) the record for `key`.
    fn update_bytes(&self, key: &ResourceKey, data: &[u8]) -> StoreResult<()>;

    /// Keys currently held, with canonical form starting with `prefix`
    /// (see [`strata_types::canonical_prefix`]), sorted.
    fn knowledge(&self, prefix: &str) -> StoreResult<Vec<ResourceKey>>;

    /// Whether a record exists for `key`.
    fn contains(&self, key: &ResourceKey) -> StoreResult<bool> {
        let mut found = true;
        self.bytes(key, &mut || {
            found = false;
            Ok(Bytes::new())
        })?;
        Ok(found)
    }
}

/// Tree-shaped payload capability layered over bytes.
pub trait TreeStore: Send + Sync {
    /// Read and parse the record for `key`, producing it if absent.
    fn tree(&self, key: &ResourceKey, if_absent: TreeProducer<'_>) -> StoreResult<Document>;

    /// Write (or, with an empty document, delete) the record for `key`.
    fn update_tree(&self, key: &ResourceKey, doc: &Document) -> StoreResult<()>;

    /// Size of `doc` in serialized form.
    fn serialized_len(&self, doc: &Document) -> usize;
}

/// A backend offering both payload forms, as consumed by the cache.
pub trait Backend: ContentStore + TreeStore {}

impl<T: ContentStore + TreeStore + ?Sized> Backend for T {}

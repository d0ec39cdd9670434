use bytes::Bytes;
use strata_doc::{Document, DocumentEngine, XmlEngine};
use strata_types::ResourceKey;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ContentStore, Producer, TreeProducer, TreeStore};

/// Adds the [`TreeStore`] capability to a byte store.
///
/// Trees are rendered to bytes on write and parsed from bytes on read by the
/// configured [`DocumentEngine`]. Byte operations pass straight through, so a
/// `ParsingStore` is a complete [`Backend`](crate::Backend).
pub struct ParsingStore<S, E = XmlEngine> {
    inner: S,
    engine: E,
}

impl<S: ContentStore> ParsingStore<S, XmlEngine> {
    pub fn new(inner: S) -> Self {
        Self::with_engine(inner, XmlEngine::new())
    }
}

impl<S: ContentStore, E: DocumentEngine> ParsingStore<S, E> {
    pub fn with_engine(inner: S, engine: E) -> Self {
        Self { inner, engine }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<S: ContentStore, E: DocumentEngine> ContentStore for ParsingStore<S, E> {
    fn bytes(&self, key: &ResourceKey, if_absent: Producer<'_>) -> StoreResult<Bytes> {
        self.inner.bytes(key, if_absent)
    }

    fn update_bytes(&self, key: &ResourceKey, data: &[u8]) -> StoreResult<()> {
        self.inner.update_bytes(key, data)
    }

    fn knowledge(&self, prefix: &str) -> StoreResult<Vec<ResourceKey>> {
        self.inner.knowledge(prefix)
    }

    fn contains(&self, key: &ResourceKey) -> StoreResult<bool> {
        self.inner.contains(key)
    }
}

impl<S: ContentStore, E: DocumentEngine> TreeStore for ParsingStore<S, E> {
    fn tree(&self, key: &ResourceKey, if_absent: TreeProducer<'_>) -> StoreResult<Document> {
        let data = self
            .inner
            .bytes(key, &mut || Ok(Bytes::from(self.engine.render(&if_absent()?))))?;
        self.engine.parse(&data).map_err(|source| StoreError::Document {
            resource: key.to_string(),
            source,
        })
    }

    fn update_tree(&self, key: &ResourceKey, doc: &Document) -> StoreResult<()> {
        self.inner.update_bytes(key, &self.engine.render(doc))
    }

    fn serialized_len(&self, doc: &Document) -> usize {
        self.engine.render(doc).len()
    }
}

impl<S: std::fmt::Debug, E> std::fmt::Debug for ParsingStore<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsingStore").field("inner", &self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::traits::Backend;
    use strata_doc::Element;

    fn key(raw: &str) -> ResourceKey {
        ResourceKey::parse(raw).unwrap()
    }

    fn fleet() -> Document {
        Document::new(Element::new("fleet").with_child(Element::new("entity").with_attr("id", "t1")))
    }

    #[test]
    fn tree_producer_is_rendered_and_persisted() {
        let store = ParsingStore::new(MemoryStore::new());
        let doc = store.tree(&key("fleet/catalog.xml"), &mut || Ok(fleet())).unwrap();
        assert_eq!(doc, fleet());

        let raw = store.bytes(&key("fleet/catalog.xml"), &mut || Err(StoreError::consistency("test", "unexpected producer call"))).unwrap();
        assert!(String::from_utf8_lossy(&raw).contains("<entity id=\"t1\"/>"));
    }

    #[test]
    fn empty_tree_write_deletes() {
        let store = ParsingStore::new(MemoryStore::new());
        store.update_tree(&key("d"), &fleet()).unwrap();
        assert!(store.contains(&key("d")).unwrap());
        store.update_tree(&key("d"), &Document::empty()).unwrap();
        assert!(!store.contains(&key("d")).unwrap());
    }

    #[test]
    fn unparsable_bytes_name_the_resource() {
        let store = ParsingStore::new(MemoryStore::new());
        store.update_bytes(&key("Fleet/Broken"), b"<a><b></a>").unwrap();
        let err = store.tree(&key("fleet/broken"), &mut || Ok(Document::empty())).unwrap_err();
        match err {
            StoreError::Document { resource, .. } => assert_eq!(resource, "fleet/broken"),
            other => panic!("expected Document error, got {other:?}"),
        }
    }

    #[test]
    fn serialized_len_matches_render() {
        let store = ParsingStore::new(MemoryStore::new());
        assert_eq!(store.serialized_len(&Document::empty()), 0);
        assert_eq!(store.serialized_len(&fleet()), XmlEngine.render(&fleet()).len());
    }

    #[test]
    fn usable_as_backend_object() {
        let store: Box<dyn Backend> = Box::new(ParsingStore::new(MemoryStore::new()));
        store.update_bytes(&key("x"), b"1").unwrap();
        assert_eq!(store.knowledge("").unwrap().len(), 1);
    }
}

use std::sync::Arc;

use bytes::Bytes;
use strata_cache::ContentCache;
use strata_catalog::EntityRoot;
use strata_doc::{Directive, Document, DocumentEngine, XmlEngine};
use strata_props::{Properties, PropertyStore};
use strata_sync::LockRegistry;
use strata_types::ResourceKey;
use tracing::debug;

use crate::error::{StrataError, StrataResult};
use crate::guarded::{GuardedCell, GuardedDocument};

/// Handle on one entity and the records below it.
#[derive(Clone)]
pub struct Entity {
    root: EntityRoot,
    cache: Arc<ContentCache>,
    props: Arc<PropertyStore>,
    locks: Arc<LockRegistry>,
}

impl Entity {
    pub(crate) fn new(
        root: EntityRoot,
        cache: Arc<ContentCache>,
        props: Arc<PropertyStore>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            root,
            cache,
            props,
            locks,
        }
    }

    pub fn root(&self) -> &EntityRoot {
        &self.root
    }

    pub fn scope(&self) -> &str {
        self.root.scope()
    }

    pub fn id(&self) -> &str {
        self.root.id()
    }

    /// Byte record `leaf` of this entity.
    pub fn cell(&self, leaf: &str) -> StrataResult<Cell> {
        Ok(Cell {
            key: self.root.key(leaf)?,
            cache: Arc::clone(&self.cache),
        })
    }

    /// Document record `leaf` of this entity.
    pub fn document(&self, leaf: &str) -> StrataResult<DocumentCell> {
        Ok(DocumentCell {
            key: self.root.key(leaf)?,
            cache: Arc::clone(&self.cache),
            engine: XmlEngine::new(),
        })
    }

    pub fn props(&self) -> StrataResult<Properties> {
        Ok(self.props.props(self.root.scope(), self.root.id())?)
    }

    /// Byte record `leaf`, exclusively held from its first operation until
    /// the wrapper is released or dropped.
    pub fn guarded_cell(&self, leaf: &str) -> StrataResult<GuardedCell> {
        let cell = self.cell(leaf)?;
        let mutex = self.locks.mutex(cell.key().canonical());
        Ok(GuardedCell::new(cell, mutex))
    }

    /// Document counterpart of [`Entity::guarded_cell`].
    pub fn guarded_document(&self, leaf: &str) -> StrataResult<GuardedDocument> {
        let doc = self.document(leaf)?;
        let mutex = self.locks.mutex(doc.key().canonical());
        Ok(GuardedDocument::new(doc, mutex))
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Entity").field(&self.root).finish()
    }
}

// ---------------------------------------------------------------------------
// Byte records
// ---------------------------------------------------------------------------

/// A byte record, read and written through the content cache.
#[derive(Clone)]
pub struct Cell {
    key: ResourceKey,
    cache: Arc<ContentCache>,
}

impl Cell {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current bytes, empty when absent.
    pub fn read(&self) -> StrataResult<Bytes> {
        Ok(self.cache.read_bytes_or_empty(&self.key)?)
    }

    /// Current bytes, or `default` (persisted unless empty) when absent.
    pub fn read_or(&self, default: impl Into<Bytes>) -> StrataResult<Bytes> {
        let mut default = Some(default.into());
        Ok(self
            .cache
            .read_bytes(&self.key, &mut || Ok(default.take().unwrap_or_default()))?)
    }

    /// Current content as text, empty when absent.
    pub fn read_string(&self) -> StrataResult<String> {
        let data = self.read()?;
        String::from_utf8(data.to_vec()).map_err(|_| StrataError::NotText {
            resource: self.key.to_string(),
        })
    }

    /// Replace the content; empty data deletes the record.
    pub fn write(&self, data: impl AsRef<[u8]>) -> StrataResult<()> {
        Ok(self.cache.write_bytes(&self.key, data.as_ref())?)
    }

    pub fn delete(&self) -> StrataResult<()> {
        Ok(self.cache.delete(&self.key)?)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Cell").field(&self.key).finish()
    }
}

// ---------------------------------------------------------------------------
// Document records
// ---------------------------------------------------------------------------

/// A document record, read and written through the content cache.
#[derive(Clone)]
pub struct DocumentCell {
    key: ResourceKey,
    cache: Arc<ContentCache>,
    engine: XmlEngine,
}

impl DocumentCell {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current document, empty when absent.
    pub fn read(&self) -> StrataResult<Document> {
        Ok(self.cache.read_tree_or_empty(&self.key)?)
    }

    /// Current document, or the one built by `build` (persisted unless empty)
    /// when absent. `build` runs at most once.
    pub fn read_or_else(&self, build: impl FnOnce() -> Document) -> StrataResult<Document> {
        let mut build = Some(build);
        Ok(self.cache.read_tree(&self.key, &mut || {
            Ok(build.take().map_or_else(Document::empty, |build| build()))
        })?)
    }

    /// Replace the document; a document without a root deletes the record.
    pub fn write(&self, doc: &Document) -> StrataResult<()> {
        Ok(self.cache.write_tree(&self.key, doc)?)
    }

    pub fn delete(&self) -> StrataResult<()> {
        Ok(self.cache.delete(&self.key)?)
    }

    /// Values selected by `path` in the current document.
    pub fn query(&self, path: &str) -> StrataResult<Vec<String>> {
        let doc = self.read()?;
        Ok(self.engine.query(&doc, path)?)
    }

    /// Apply `directives` to the current document and write the result back.
    /// Returns the number of elements touched; nothing is written when no
    /// element was touched.
    pub fn patch(&self, directives: &[Directive]) -> StrataResult<usize> {
        let mut doc = self.read()?;
        let touched = self.engine.apply(&mut doc, directives)?;
        if touched > 0 {
            self.write(&doc)?;
        }
        debug!(key = %self.key, directives = directives.len(), touched, "document patched");
        Ok(touched)
    }
}

impl std::fmt::Debug for DocumentCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DocumentCell").field(&self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::Strata;
    use strata_doc::Element;

    fn truck(strata: &Strata) -> Entity {
        strata.entity("fleet", "truck-1").unwrap()
    }

    // ---- Cells ----

    #[test]
    fn cell_read_write_delete() {
        let strata = Strata::in_memory().unwrap();
        let cell = truck(&strata).cell("odometer").unwrap();
        assert!(cell.read().unwrap().is_empty());
        cell.write("120").unwrap();
        assert_eq!(cell.read().unwrap(), Bytes::from_static(b"120"));
        cell.delete().unwrap();
        assert!(cell.read_string().unwrap().is_empty());
    }

    #[test]
    fn read_or_persists_default_once() {
        let strata = Strata::in_memory().unwrap();
        let cell = truck(&strata).cell("odometer").unwrap();
        assert_eq!(&cell.read_or("0").unwrap()[..], b"0");
        assert_eq!(&cell.read_or("99").unwrap()[..], b"0");
        strata.cache().evict(cell.key());
        assert_eq!(cell.read_string().unwrap(), "0");
    }

    #[test]
    fn non_utf8_is_reported() {
        let strata = Strata::in_memory().unwrap();
        let cell = truck(&strata).cell("blob").unwrap();
        cell.write(b"\xff\xfe").unwrap();
        let err = cell.read_string().unwrap_err();
        assert!(matches!(err, StrataError::NotText { .. }));
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }

    #[test]
    fn invalid_leaf_is_rejected() {
        let strata = Strata::in_memory().unwrap();
        assert_eq!(truck(&strata).cell("a|b").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(truck(&strata).cell("").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn cell_and_document_on_one_key_conflict() {
        let strata = Strata::in_memory().unwrap();
        let entity = truck(&strata);
        entity.cell("state").unwrap().write("raw").unwrap();
        let err = entity.document("state").unwrap().read().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }

    // ---- Documents ----

    #[test]
    fn document_query_and_patch() {
        let strata = Strata::in_memory().unwrap();
        let doc = truck(&strata).document("manifest.xml").unwrap();
        let initial = doc
            .read_or_else(|| Document::new(Element::new("manifest")))
            .unwrap();
        assert_eq!(initial.root().unwrap().name, "manifest");

        let touched = doc
            .patch(&[
                Directive::Append {
                    parent: "manifest".into(),
                    element: Element::new("item").with_attr("sku", "a-1").with_text("bolts"),
                },
                Directive::Append {
                    parent: "manifest".into(),
                    element: Element::new("item").with_attr("sku", "b-2").with_text("nuts"),
                },
            ])
            .unwrap();
        assert_eq!(touched, 2);
        assert_eq!(doc.query("manifest/item/@sku").unwrap(), ["a-1", "b-2"]);
        assert_eq!(doc.query("manifest/item[@sku='b-2']/text()").unwrap(), ["nuts"]);

        doc.patch(&[Directive::Remove {
            path: "manifest/item[@sku='a-1']".into(),
        }])
        .unwrap();
        assert_eq!(doc.query("manifest/item/@sku").unwrap(), ["b-2"]);
    }

    #[test]
    fn patch_touching_nothing_writes_nothing() {
        let strata = Strata::in_memory().unwrap();
        let doc = truck(&strata).document("manifest.xml").unwrap();
        let touched = doc
            .patch(&[Directive::SetText {
                path: "manifest/item".into(),
                text: "x".into(),
            }])
            .unwrap();
        assert_eq!(touched, 0);
        assert!(doc.read().unwrap().is_empty());
    }

    #[test]
    fn document_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let strata = Strata::open(crate::StrataConfig::at(dir.path())).unwrap();
            let doc = truck(&strata).document("route.xml").unwrap();
            doc.write(&Document::new(Element::new("route").with_attr("to", "depot & yard")))
                .unwrap();
        }
        let strata = Strata::open(crate::StrataConfig::at(dir.path())).unwrap();
        let doc = truck(&strata).document("route.xml").unwrap();
        assert_eq!(doc.query("route/@to").unwrap(), ["depot & yard"]);
    }

    #[test]
    fn bad_path_is_validation() {
        let strata = Strata::in_memory().unwrap();
        let doc = truck(&strata).document("d.xml").unwrap();
        doc.write(&Document::new(Element::new("d"))).unwrap();
        assert_eq!(doc.query("d[@x").unwrap_err().kind(), ErrorKind::Validation);
    }
}

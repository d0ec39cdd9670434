//! Persistent forms of a scope's id list.

use serde::{Deserialize, Serialize};
use strata_cache::ContentCache;
use strata_doc::{Document, Element};
use strata_types::{validate_name, validate_tag_name, ResourceKey};
use tracing::warn;

use crate::error::{CatalogError, CatalogResult};

/// How a scope's id list is persisted.
pub trait CatalogBacking: Send + Sync {
    /// Key of the backing record of `scope`.
    fn key(&self, scope: &str) -> CatalogResult<ResourceKey>;

    /// Check that `scope` can be represented by this form.
    fn validate_scope(&self, scope: &str) -> CatalogResult<()> {
        Ok(validate_name(scope)?)
    }

    /// Check that `id` can be represented by this form.
    fn validate_id(&self, id: &str) -> CatalogResult<()> {
        validate_entity_id(id)
    }

    /// Read the ids of `scope` in stored order; no record means no ids.
    fn load(&self, cache: &ContentCache, scope: &str) -> CatalogResult<Vec<String>>;

    /// Replace the stored ids of `scope`; an empty list deletes the record.
    fn store(&self, cache: &ContentCache, scope: &str, ids: &[String]) -> CatalogResult<()>;
}

/// Selects a [`CatalogBacking`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackingKind {
    /// `{scope}/catalog.xml`, see [`DocumentBacking`].
    #[default]
    Document,
    /// `{scope}/catalog.cat`, see [`LedgerBacking`].
    Ledger,
}

impl BackingKind {
    pub fn backing(self) -> Box<dyn CatalogBacking> {
        match self {
            Self::Document => Box::new(DocumentBacking),
            Self::Ledger => Box::new(LedgerBacking),
        }
    }
}

/// Leaf of the document form's record.
pub const DOCUMENT_LEAF: &str = "catalog.xml";
/// Leaf of the ledger form's record.
pub const LEDGER_LEAF: &str = "catalog.cat";

/// Name rules shared by every form. An id naming a scope-level record would
/// put the entity's directory where that record lives.
pub fn validate_entity_id(id: &str) -> CatalogResult<()> {
    validate_name(id)?;
    if [DOCUMENT_LEAF, LEDGER_LEAF].iter().any(|leaf| id.eq_ignore_ascii_case(leaf)) {
        return Err(CatalogError::InvalidId {
            id: id.to_string(),
            reason: "names a scope-level catalog record",
        });
    }
    Ok(())
}

// ---------------------------------------------------------------
// Document form
// ---------------------------------------------------------------

const ENTITY_TAG: &str = "entity";
const ID_ATTR: &str = "id";

/// Document form: a root element named after the scope with one
/// `<entity id="..."/>` child per id.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentBacking;

impl CatalogBacking for DocumentBacking {
    fn key(&self, scope: &str) -> CatalogResult<ResourceKey> {
        Ok(ResourceKey::join(&[scope, DOCUMENT_LEAF])?)
    }

    fn validate_scope(&self, scope: &str) -> CatalogResult<()> {
        Ok(validate_tag_name(scope)?)
    }

    fn load(&self, cache: &ContentCache, scope: &str) -> CatalogResult<Vec<String>> {
        let key = self.key(scope)?;
        let doc = cache.read_tree_or_empty(&key)?;
        let Some(root) = doc.root() else {
            return Ok(Vec::new());
        };
        if !root.name.eq_ignore_ascii_case(scope) {
            warn!(key = %key, root = %root.name, "catalog root does not match scope");
        }
        Ok(root
            .elements()
            .filter(|el| el.name == ENTITY_TAG)
            .filter_map(|el| el.attr(ID_ATTR))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn store(&self, cache: &ContentCache, scope: &str, ids: &[String]) -> CatalogResult<()> {
        let key = self.key(scope)?;
        if ids.is_empty() {
            return Ok(cache.write_tree(&key, &Document::empty())?);
        }
        let mut root = Element::new(scope);
        for id in ids {
            root.push(Element::new(ENTITY_TAG).with_attr(ID_ATTR, id.as_str()));
        }
        Ok(cache.write_tree(&key, &Document::new(root))?)
    }
}

// ---------------------------------------------------------------
// Ledger form
// ---------------------------------------------------------------

const LEDGER_SEPARATOR: char = ';';

/// Ledger form: ids joined by `;` in a single text record.
#[derive(Clone, Copy, Debug, Default)]
pub struct LedgerBacking;

impl CatalogBacking for LedgerBacking {
    fn key(&self, scope: &str) -> CatalogResult<ResourceKey> {
        Ok(ResourceKey::join(&[scope, LEDGER_LEAF])?)
    }

    fn validate_id(&self, id: &str) -> CatalogResult<()> {
        validate_entity_id(id)?;
        if id.contains(LEDGER_SEPARATOR) {
            return Err(CatalogError::InvalidId {
                id: id.to_string(),
                reason: "must not contain ';' in a ledger catalog",
            });
        }
        // Loading trims each entry.
        if id.trim() != id {
            return Err(CatalogError::InvalidId {
                id: id.to_string(),
                reason: "must not start or end with whitespace in a ledger catalog",
            });
        }
        Ok(())
    }

    fn load(&self, cache: &ContentCache, scope: &str) -> CatalogResult<Vec<String>> {
        let raw = cache.read_bytes_or_empty(&self.key(scope)?)?;
        let text = String::from_utf8_lossy(&raw);
        Ok(text
            .split(LEDGER_SEPARATOR)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn store(&self, cache: &ContentCache, scope: &str, ids: &[String]) -> CatalogResult<()> {
        let text = ids.join(&LEDGER_SEPARATOR.to_string());
        Ok(cache.write_bytes(&self.key(scope)?, text.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_cache::CacheConfig;
    use strata_store::{Backend, ContentStore, MemoryStore, ParsingStore};

    fn cache() -> (Arc<dyn Backend>, ContentCache) {
        let backend: Arc<dyn Backend> = Arc::new(ParsingStore::new(MemoryStore::new()));
        let cache = ContentCache::new(backend.clone(), &CacheConfig::default()).unwrap();
        (backend, cache)
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn raw_text(backend: &Arc<dyn Backend>, key: &ResourceKey) -> String {
        let raw = backend.bytes(key, &mut || Ok(Default::default())).unwrap();
        String::from_utf8(raw.to_vec()).unwrap()
    }

    #[test]
    fn document_form_layout() {
        let (backend, cache) = cache();
        DocumentBacking.store(&cache, "fleet", &ids(&["truck-1", "truck-2"])).unwrap();
        let key = DocumentBacking.key("fleet").unwrap();
        assert_eq!(
            raw_text(&backend, &key),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><fleet><entity id=\"truck-1\"/><entity id=\"truck-2\"/></fleet>"
        );
        cache.evict(&key);
        assert_eq!(DocumentBacking.load(&cache, "fleet").unwrap(), ids(&["truck-1", "truck-2"]));
    }

    #[test]
    fn ledger_form_layout() {
        let (backend, cache) = cache();
        LedgerBacking.store(&cache, "fleet", &ids(&["truck-1", "truck-2"])).unwrap();
        let key = LedgerBacking.key("fleet").unwrap();
        assert_eq!(raw_text(&backend, &key), "truck-1;truck-2");
        assert_eq!(LedgerBacking.load(&cache, "fleet").unwrap(), ids(&["truck-1", "truck-2"]));
    }

    #[test]
    fn both_forms_agree() {
        let (_backend, cache) = cache();
        let list = ids(&["a", "b & c", "d"]);
        for kind in [BackingKind::Document, BackingKind::Ledger] {
            let backing = kind.backing();
            backing.store(&cache, "scope", &list).unwrap();
            assert_eq!(backing.load(&cache, "scope").unwrap(), list, "{kind:?}");
        }
    }

    #[test]
    fn empty_list_deletes_record() {
        let (backend, cache) = cache();
        for kind in [BackingKind::Document, BackingKind::Ledger] {
            let backing = kind.backing();
            backing.store(&cache, "fleet", &ids(&["x"])).unwrap();
            backing.store(&cache, "fleet", &[]).unwrap();
            assert!(!backend.contains(&backing.key("fleet").unwrap()).unwrap());
            assert!(backing.load(&cache, "fleet").unwrap().is_empty());
        }
    }

    #[test]
    fn document_load_tolerates_foreign_children() {
        let (backend, cache) = cache();
        let key = DocumentBacking.key("fleet").unwrap();
        backend
            .update_bytes(&key, b"<fleet><note/><entity id='a'/><entity/><entity id='b'>x</entity></fleet>")
            .unwrap();
        assert_eq!(DocumentBacking.load(&cache, "fleet").unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn scope_and_id_validation() {
        assert!(DocumentBacking.validate_scope("1fleet").is_err());
        assert!(LedgerBacking.validate_scope("1fleet").is_ok());
        assert!(matches!(LedgerBacking.validate_id("a;b"), Err(CatalogError::InvalidId { .. })));
        assert!(DocumentBacking.validate_id("a;b").is_ok());
    }

    #[test]
    fn ledger_rejects_padded_ids() {
        for id in [" padded", "padded ", "\u{a0}padded"] {
            assert!(matches!(LedgerBacking.validate_id(id), Err(CatalogError::InvalidId { .. })), "{id:?}");
        }
        assert!(LedgerBacking.validate_id("pad ded").is_ok());
    }

    #[test]
    fn record_leaves_are_not_ids() {
        for kind in [BackingKind::Document, BackingKind::Ledger] {
            let backing = kind.backing();
            for id in ["catalog.xml", "catalog.cat", "Catalog.XML"] {
                assert!(matches!(backing.validate_id(id), Err(CatalogError::InvalidId { .. })), "{kind:?} {id}");
            }
            assert!(backing.validate_id("catalog").is_ok());
        }
    }

    #[test]
    fn backing_kind_serde() {
        let kind: BackingKind = serde_json::from_str("\"ledger\"").unwrap();
        assert_eq!(kind, BackingKind::Ledger);
        assert_eq!(BackingKind::default(), BackingKind::Document);
    }
}

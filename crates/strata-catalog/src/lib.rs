//! Entity catalog for Strata.
//!
//! A [`ScopeIndex`] tracks the ids registered in one scope and keeps them in
//! a persistent backing record, either a document (`{scope}/catalog.xml`) or
//! a flat ledger (`{scope}/catalog.cat`). Listing can be narrowed with
//! [`PropertyFilter`]s evaluated against each entity's properties.
//!
//! # Key Types
//!
//! - [`ScopeIndex`] -- In-memory id list, hydrated once from its backing
//! - [`EntityRoot`] -- Handle naming one entity and its record keys
//! - [`CatalogBacking`] -- Backing form trait, see [`BackingKind`]
//! - [`PropertyFilter`] -- Predicate over an entity's [`PropertySet`](strata_props::PropertySet)

pub mod backing;
pub mod entry;
pub mod error;
pub mod filter;
pub mod index;

pub use backing::{validate_entity_id, BackingKind, CatalogBacking, DocumentBacking, LedgerBacking, DOCUMENT_LEAF, LEDGER_LEAF};
pub use entry::EntityRoot;
pub use error::{CatalogError, CatalogResult};
pub use filter::PropertyFilter;
pub use index::ScopeIndex;

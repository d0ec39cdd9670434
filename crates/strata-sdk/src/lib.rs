//! High-level SDK for Strata.
//!
//! [`Strata`] wires a backend, the content cache, the property store, the
//! lock registry and one [`ScopeIndex`] per scope behind a single handle.
//! This is the main entry point for applications embedding Strata.
//!
//! ```
//! use strata_sdk::{PropertyFilter, Strata};
//!
//! let strata = Strata::in_memory().unwrap();
//! let fleet = strata.catalog("fleet").unwrap();
//! fleet.add("truck-1").unwrap();
//!
//! let truck = strata.entity("fleet", "truck-1").unwrap();
//! truck.props().unwrap().refine("status", ["active"]).unwrap();
//! truck.cell("odometer").unwrap().write("120").unwrap();
//!
//! let active = fleet.list(&[PropertyFilter::equals("status", "active")]).unwrap();
//! assert_eq!(active, ["truck-1"]);
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod guarded;
pub mod strata;

pub use config::StrataConfig;
pub use entity::{Cell, DocumentCell, Entity};
pub use error::{ErrorKind, StrataError, StrataResult};
pub use guarded::{GuardedCell, GuardedDocument};
pub use strata::Strata;

// Re-export key types
pub use bytes::Bytes;
pub use strata_cache::{CacheConfig, CacheStats};
pub use strata_catalog::{BackingKind, EntityRoot, PropertyFilter, ScopeIndex};
pub use strata_doc::{Directive, Document, Element};
pub use strata_props::{Properties, PropertySet};
pub use strata_sync::{LocalPipe, NamedMutex, NamedMutexGuard};
pub use strata_types::ResourceKey;

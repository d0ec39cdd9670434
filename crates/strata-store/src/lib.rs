//! Content stores for Strata.
//!
//! A content store is a minimal key/value backend: canonical [`ResourceKey`]
//! to opaque bytes. Records are created lazily by a caller-supplied producer
//! on first read, or by an explicit write; writing an empty payload deletes
//! the record.
//!
//! # Storage Backends
//!
//! All byte backends implement the [`ContentStore`] trait:
//!
//! - [`MemoryStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FsStore`] -- one file per key under a root directory
//!
//! [`ParsingStore`] decorates any byte backend with the [`TreeStore`]
//! capability by running a [`DocumentEngine`](strata_doc::DocumentEngine)
//! below the caching layers.
//!
//! # Design Rules
//!
//! 1. A producer is invoked only when the store holds no record for the key.
//! 2. A non-empty produced payload is persisted before it is returned.
//! 3. Reads and writes of one key are serialized in-process by a
//!    [`LocalPipe`](strata_sync::LocalPipe); different keys proceed in parallel.
//! 4. All I/O errors are propagated with the offending resource name.

pub mod error;
pub mod fs;
pub mod memory;
pub mod parsing;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use parsing::ParsingStore;
pub use traits::{Backend, ContentStore, Producer, TreeProducer, TreeStore};

pub use bytes::Bytes;
pub use strata_types::ResourceKey;

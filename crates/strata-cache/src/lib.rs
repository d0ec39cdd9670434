//! Content cache for Strata.
//!
//! [`ContentCache`] sits in front of one [`Backend`](strata_store::Backend)
//! and keeps two independent tables: raw bytes and parsed documents. Reads
//! are read-through, writes are write-through: the cache never substitutes
//! for durability.
//!
//! # Skip Policy
//!
//! A key is never retained in a table when its serialized size exceeds
//! [`CacheConfig::max_entry_bytes`] or when it matches one of the
//! [`CacheConfig::ignore`] glob patterns. Skipped keys are still read from
//! and written to the store.
//!
//! # Enumeration
//!
//! The full key listing is cached and tagged with a write epoch. Every write
//! bumps the epoch before and after it reaches the store, so a listing taken
//! before a membership change is never served after it.

pub mod cache;
pub mod config;
pub mod error;
pub mod policy;

pub use cache::{CacheStats, ContentCache, PayloadKind};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use policy::SkipPolicy;

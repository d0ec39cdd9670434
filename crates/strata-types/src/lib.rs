//! Foundation types for Strata.
//!
//! Every resource held by a Strata store is addressed by a hierarchical path
//! of the form `scope/entity-id/leaf-name`. This crate owns the rules for
//! turning caller-supplied strings into canonical lookup keys and for
//! rejecting names that cannot be stored.
//!
//! # Key Types
//!
//! - [`ResourceKey`] -- validated path with an original spelling and a
//!   canonical (separator-normalized, case-folded) lookup form
//! - [`NameError`] -- validation failure raised at construction time
//!
//! # Normalization
//!
//! Two keys that differ only by separator style (`/` vs `\`) or by letter
//! case are the same key. All equality, ordering and hashing goes through the
//! canonical form; the original spelling is kept for display only.

pub mod error;
pub mod key;
pub mod names;

pub use error::NameError;
pub use key::{canonical_prefix, normalize, ResourceKey, SEPARATOR};
pub use names::{validate_name, validate_path, validate_tag_name};

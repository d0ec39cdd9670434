//! Entity properties for Strata.
//!
//! Every entity `(scope, id)` owns one table of named, multi-valued string
//! properties, stored at `{scope}/{id}/props.cat`:
//!
//! ```text
//! status:active\rtags:north,refrigerated
//! ```
//!
//! Records are separated by `\r`; within a record the name is followed by `:`
//! and comma-separated values. Reserved characters are percent-escaped. See
//! [`codec`] for the exact format.
//!
//! Tables are loaded on first access, memoized per key by [`PropertyStore`],
//! and written through on every [`Properties::refine`].

pub mod codec;
pub mod error;
pub mod set;
pub mod store;

pub use codec::{decode, encode};
pub use error::{PropsError, PropsResult};
pub use set::PropertySet;
pub use store::{Properties, PropertyStore, PROPS_LEAF};

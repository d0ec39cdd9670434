//! Tree-shaped documents for Strata.
//!
//! The caching layers treat a [`Document`] as an opaque, cloneable value. This
//! crate supplies the concrete tree and the engine contract used to turn
//! bytes into trees and back, to read values out of a tree with a small
//! path language, and to patch a tree with [`Directive`]s.
//!
//! # Key Types
//!
//! - [`Document`] -- optional root [`Element`]; a document without a root is
//!   "empty" and deletes the record when written
//! - [`Element`] / [`Node`] -- the element tree
//! - [`DocumentEngine`] -- parse / render / query / apply contract
//! - [`XmlEngine`] -- XML implementation backed by `roxmltree`
//! - [`Directive`] -- tree mutation

pub mod engine;
pub mod error;
pub mod path;
pub mod tree;

pub use engine::{Directive, DocumentEngine, XmlEngine};
pub use error::{DocError, DocResult};
pub use path::{Selection, TreePath};
pub use tree::{Document, Element, Node};

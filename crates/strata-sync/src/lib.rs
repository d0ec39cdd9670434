//! Synchronization primitives for Strata.
//!
//! Two independent mechanisms guard logical resources:
//!
//! - [`LocalPipe`] -- a process-local, per-name exclusive executor. Actions
//!   submitted under the same name never overlap; actions under different
//!   names run freely.
//! - [`NamedMutex`] -- a machine-wide exclusive lock. Independent handles for
//!   the same logical name contend on the same OS lock file, whose name is a
//!   deterministic [`digest`] of the canonical resource name.
//!
//! Both are handed out by a [`LockRegistry`], an explicit object owned by
//! the top-level store. Two registries in one process never share state.
//!
//! # Design Rules
//!
//! 1. Acquisition blocks indefinitely unless a timeout is requested; a timeout
//!    is reported as [`SyncError::Timeout`], never as abandonment.
//! 2. Release is idempotent.
//! 3. A lock whose previous holder died while holding it is reported as
//!    [`SyncError::Abandoned`] and is never silently recovered.
//! 4. Scoped acquisition through [`NamedMutexGuard`] releases on every exit path.

pub mod digest;
pub mod error;
pub mod mutex;
pub mod pipe;
pub mod registry;

pub use digest::digest;
pub use error::{SyncError, SyncResult};
pub use mutex::{NamedMutex, NamedMutexGuard};
pub use pipe::LocalPipe;
pub use registry::LockRegistry;

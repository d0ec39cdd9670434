use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_cache::CacheConfig;
use strata_catalog::BackingKind;
use strata_store::fs::RESERVED_DIR;

/// Configuration for [`Strata::open`](crate::Strata::open).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Root directory of the filesystem backend; `None` keeps everything in
    /// memory.
    pub root: Option<PathBuf>,
    /// Directory of lock files. Defaults to `<root>/.strata/locks`. In-memory
    /// instances without one get a private temporary directory.
    pub lock_dir: Option<PathBuf>,
    pub cache: CacheConfig,
    /// Backing form of scope catalogs.
    pub catalog: BackingKind,
}

impl StrataConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Filesystem-backed configuration rooted at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Default::default()
        }
    }

    /// The configured or root-derived lock directory. `None` for an in-memory
    /// instance without an explicit `lock_dir`.
    pub fn effective_lock_dir(&self) -> Option<PathBuf> {
        match (&self.lock_dir, &self.root) {
            (Some(dir), _) => Some(dir.clone()),
            (None, Some(root)) => Some(default_lock_dir(root)),
            (None, None) => None,
        }
    }
}

fn default_lock_dir(root: &Path) -> PathBuf {
    root.join(RESERVED_DIR).join("locks")
}

use serde::{Deserialize, Serialize};

/// Configuration for a [`ContentCache`](crate::ContentCache).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Payloads whose serialized size exceeds this many bytes are written
    /// and read through but never retained.
    pub max_entry_bytes: usize,
    /// Glob patterns of keys that are never retained. Case-insensitive;
    /// `*` matches zero or more characters (separators included), `?` exactly
    /// one; each pattern is anchored at the end of the key.
    pub ignore: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entry_bytes: 1024 * 1024, // 1 MiB
            ignore: Vec::new(),
        }
    }
}

impl CacheConfig {
    /// A configuration that retains nothing.
    pub fn disabled() -> Self {
        Self {
            max_entry_bytes: 0,
            ..Default::default()
        }
    }
}

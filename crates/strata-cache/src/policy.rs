use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use strata_types::ResourceKey;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Decides which payloads a cache may retain.
#[derive(Clone, Debug)]
pub struct SkipPolicy {
    max_entry_bytes: usize,
    patterns: Vec<String>,
    ignore: GlobSet,
}

impl SkipPolicy {
    /// Compile a policy from configuration.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore {
            let glob = GlobBuilder::new(&translate(pattern))
                .case_insensitive(true)
                .literal_separator(false)
                .backslash_escape(true)
                .build()
                .map_err(|e| CacheError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
            builder.add(glob);
        }
        let ignore = builder.build().map_err(|e| CacheError::InvalidPattern {
            pattern: config.ignore.join(", "),
            reason: e.to_string(),
        })?;
        Ok(Self {
            max_entry_bytes: config.max_entry_bytes,
            patterns: config.ignore.clone(),
            ignore,
        })
    }

    /// A policy that retains everything up to the default size limit.
    pub fn permissive() -> Self {
        Self {
            max_entry_bytes: CacheConfig::default().max_entry_bytes,
            patterns: Vec::new(),
            ignore: GlobSet::empty(),
        }
    }

    /// Whether `key` matches an ignore pattern.
    pub fn is_ignored(&self, key: &ResourceKey) -> bool {
        !self.patterns.is_empty() && self.ignore.is_match(key.canonical())
    }

    /// Whether a payload of `size` bytes stored under `key` must not be retained.
    pub fn skips(&self, key: &ResourceKey, size: usize) -> bool {
        size > self.max_entry_bytes || self.is_ignored(key)
    }

    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_bytes
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

/// Rewrite a user pattern into a glob over canonical keys: separators are
/// unified, only `*` and `?` stay special, and a leading `*` leaves the
/// pattern anchored at the end only.
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 1);
    if !pattern.starts_with('*') {
        out.push('*');
    }
    for c in pattern.chars() {
        match c {
            '\\' | '/' => out.push('/'),
            '[' | ']' | '{' | '}' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(patterns: &[&str]) -> SkipPolicy {
        SkipPolicy::from_config(&CacheConfig {
            ignore: patterns.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    fn key(raw: &str) -> ResourceKey {
        ResourceKey::parse(raw).unwrap()
    }

    #[test]
    fn star_matches_across_separators() {
        let p = policy(&["*.log"]);
        assert!(p.is_ignored(&key("a/b/c/trace.log")));
        assert!(p.is_ignored(&key("trace.log")));
        assert!(!p.is_ignored(&key("trace.log.bak")));
    }

    #[test]
    fn anchored_at_end_only() {
        let p = policy(&["tmp/data.bin"]);
        assert!(p.is_ignored(&key("fleet/truck-1/tmp/data.bin")));
        assert!(!p.is_ignored(&key("fleet/tmp/data.bin/x")));
    }

    #[test]
    fn question_mark_is_one_char() {
        let p = policy(&["part?.dat"]);
        assert!(p.is_ignored(&key("x/part1.dat")));
        assert!(!p.is_ignored(&key("x/part12.dat")));
        assert!(!p.is_ignored(&key("x/part.dat")));
    }

    #[test]
    fn case_and_separator_insensitive() {
        let p = policy(&["Logs\\*.TXT"]);
        assert!(p.is_ignored(&key("root/logs/a.txt")));
        assert!(p.is_ignored(&key("ROOT\\LOGS\\B.TXT")));
    }

    #[test]
    fn brackets_are_literal() {
        let p = policy(&["[x].bin"]);
        assert!(p.is_ignored(&key("a/[x].bin")));
        assert!(!p.is_ignored(&key("a/x.bin")));
    }

    #[test]
    fn braces_are_literal() {
        let p = policy(&["{a,b}.bin"]);
        assert!(p.is_ignored(&key("x/{a,b}.bin")));
        assert!(!p.is_ignored(&key("x/a.bin")));
    }

    #[test]
    fn size_limit() {
        let p = SkipPolicy::from_config(&CacheConfig {
            max_entry_bytes: 4,
            ignore: vec![],
        })
        .unwrap();
        assert!(!p.skips(&key("a"), 4));
        assert!(p.skips(&key("a"), 5));
    }

    #[test]
    fn empty_policy_ignores_nothing() {
        let p = SkipPolicy::permissive();
        assert!(!p.is_ignored(&key("anything/at/all")));
        assert!(p.patterns().is_empty());
    }
}

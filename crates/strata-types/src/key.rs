use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::NameError;
use crate::names::{validate_name, validate_path, SEPARATORS};

/// The canonical separator used in every normalized key.
pub const SEPARATOR: char = '/';

/// A validated hierarchical resource path.
///
/// A `ResourceKey` keeps the spelling it was created with for display, and a
/// canonical form used for every lookup: alternate separators replaced by
/// [`SEPARATOR`], empty segments dropped, and all letters lowercased.
/// `Eq`, `Ord` and `Hash` only look at the canonical form.
#[derive(Clone)]
pub struct ResourceKey {
    original: String,
    canonical: String,
}

impl ResourceKey {
    /// Validate and normalize a raw path.
    ///
    /// ```
    /// use strata_types::ResourceKey;
    ///
    /// let a = ResourceKey::parse("A/B").unwrap();
    /// let b = ResourceKey::parse("a\\b").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.canonical(), "a/b");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        validate_path(raw)?;
        Ok(Self {
            original: raw.to_string(),
            canonical: normalize(raw),
        })
    }

    /// Join individually validated segments into a key.
    pub fn join<S: AsRef<str>>(segments: &[S]) -> Result<Self, NameError> {
        if segments.is_empty() {
            return Err(NameError::Empty);
        }
        for segment in segments {
            validate_name(segment.as_ref())?;
        }
        let original = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("/");
        Ok(Self {
            canonical: normalize(&original),
            original,
        })
    }

    /// A key one level below this one.
    pub fn child(&self, leaf: &str) -> Result<Self, NameError> {
        validate_name(leaf)?;
        let original = format!("{}{SEPARATOR}{leaf}", self.original.trim_end_matches(SEPARATORS));
        Ok(Self {
            canonical: format!("{}{SEPARATOR}{}", self.canonical, leaf.to_lowercase()),
            original,
        })
    }

    /// The canonical lookup form.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// The spelling this key was created with.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Canonical segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.canonical.split(SEPARATOR)
    }

    /// The last canonical segment.
    pub fn leaf(&self) -> &str {
        self.canonical
            .rsplit(SEPARATOR)
            .next()
            .unwrap_or(&self.canonical)
    }

    /// Whether this key lies under `prefix` (a canonical prefix, see
    /// [`canonical_prefix`]). The empty prefix matches every key.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.canonical.starts_with(prefix)
    }
}

/// Normalize a prefix filter the same way keys are normalized.
///
/// A trailing separator is preserved, so `"fleet/truck-1/"` only matches keys
/// strictly below `fleet/truck-1`, while `"fleet/truck-1"` would also match
/// `fleet/truck-10`.
pub fn canonical_prefix(raw: &str) -> String {
    let mut prefix = normalize(raw);
    if !prefix.is_empty() && raw.ends_with(SEPARATORS) {
        prefix.push(SEPARATOR);
    }
    prefix
}

/// Canonical lookup form of any path-like string, without validation.
///
/// Used directly for lock and pipe names, which are not storage paths.
pub fn normalize(raw: &str) -> String {
    raw.split(SEPARATORS)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ResourceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({})", self.canonical)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl std::str::FromStr for ResourceKey {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use proptest::prelude::*;

    #[test]
    fn separator_and_case_are_folded() {
        let a = ResourceKey::parse("Fleet/Truck-1/Odometer").unwrap();
        let b = ResourceKey::parse("fleet\\truck-1\\ODOMETER").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "fleet/truck-1/odometer");
        assert_eq!(a.original(), "Fleet/Truck-1/Odometer");
    }

    #[test]
    fn empty_segments_are_dropped() {
        let key = ResourceKey::parse("/fleet//truck-1/").unwrap();
        assert_eq!(key.canonical(), "fleet/truck-1");
        assert_eq!(key.segments().collect::<Vec<_>>(), vec!["fleet", "truck-1"]);
    }

    #[test]
    fn equal_keys_hash_equal() {
        let mut set = HashSet::new();
        set.insert(ResourceKey::parse("A/B").unwrap());
        set.insert(ResourceKey::parse("a\\b").unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn join_validates_each_segment() {
        let key = ResourceKey::join(&["fleet", "truck-1", "props.cat"]).unwrap();
        assert_eq!(key.canonical(), "fleet/truck-1/props.cat");
        assert_eq!(key.leaf(), "props.cat");

        assert!(ResourceKey::join(&["fleet", "a/b"]).is_err());
        assert!(ResourceKey::join::<&str>(&[]).is_err());
    }

    #[test]
    fn child_extends_both_forms() {
        let root = ResourceKey::parse("Fleet\\Truck-1").unwrap();
        let child = root.child("Odometer").unwrap();
        assert_eq!(child.canonical(), "fleet/truck-1/odometer");
        assert_eq!(child.original(), "Fleet\\Truck-1/Odometer");
        assert!(root.child("a\\b").is_err());
    }

    #[test]
    fn invalid_raw_paths_fail_at_construction() {
        assert!(ResourceKey::parse("").is_err());
        assert!(ResourceKey::parse("a\r\nb").is_err());
        assert!("a|b".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn prefix_matching_uses_canonical_form() {
        let key = ResourceKey::parse("Fleet/Truck-10/odometer").unwrap();
        assert!(key.has_prefix(&canonical_prefix("FLEET\\truck-1")));
        assert!(!key.has_prefix(&canonical_prefix("fleet/truck-1/")));
        assert!(key.has_prefix(&canonical_prefix("fleet/truck-10/")));
        assert!(key.has_prefix(&canonical_prefix("")));
    }

    #[test]
    fn serde_uses_original_spelling() {
        let key = ResourceKey::parse("Fleet/Truck-1").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"Fleet/Truck-1\"");
        let back: ResourceKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<ResourceKey>("\"a|b\"").is_err());
    }

    proptest! {
        #[test]
        fn separator_style_and_case_never_change_identity(
            segments in proptest::collection::vec("[A-Za-z0-9_.-]{1,8}", 1..5),
            backslashes in proptest::collection::vec(any::<bool>(), 5),
        ) {
            prop_assume!(segments.iter().all(|s| s != "." && s != ".."));
            let forward = segments.join("/");
            let mut mixed = String::new();
            for (i, segment) in segments.iter().enumerate() {
                if i > 0 {
                    mixed.push(if backslashes[i % backslashes.len()] { '\\' } else { '/' });
                }
                mixed.push_str(&segment.to_uppercase());
            }
            let a = ResourceKey::parse(&forward).unwrap();
            let b = ResourceKey::parse(&mixed).unwrap();
            prop_assert_eq!(a.canonical(), b.canonical());
            prop_assert_eq!(a, b);
        }
    }
}

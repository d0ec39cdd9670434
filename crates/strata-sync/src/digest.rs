use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use strata_types::normalize;

/// Domain tag mixed into every lock digest.
const DOMAIN: &str = "strata-lock-v1";

/// Deterministic, path-safe identifier for a logical lock name.
///
/// The canonical form of `name` is hashed with BLAKE3 (domain-separated) and
/// the hash is base64 encoded with the URL-safe alphabet, which replaces the
/// path-unsafe `/` and `+` with `_` and `-`. Names that differ only by
/// separator style or case produce the same digest.
pub fn digest(name: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN.as_bytes());
    hasher.update(b":");
    hasher.update(normalize(name).as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize().as_bytes())
}

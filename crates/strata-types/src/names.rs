//! Path and name validation.
//!
//! Three levels of strictness:
//!
//! - [`validate_path`] -- a whole hierarchical path. Rejects characters that
//!   are illegal in filesystem paths on common platforms, ASCII control
//!   characters (which covers `\r` and `\n`, reserved as ledger delimiters),
//!   empty input and `..` traversal segments.
//! - [`validate_name`] -- a single path segment (scope, entity id, leaf).
//!   Everything `validate_path` rejects, plus separators.
//! - [`validate_tag_name`] -- a segment that doubles as the root tag of a
//!   generated document. Additionally rejects whitespace and `&`, `<`, `>`,
//!   and names that cannot start an XML element name.

use crate::error::NameError;

/// Characters that are forbidden anywhere in a path.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Separators accepted in paths. The first is canonical.
pub(crate) const SEPARATORS: &[char] = &['/', '\\'];

/// Validate a whole hierarchical path, returning `Ok(())` if it can be stored.
///
/// # Examples
///
/// ```
/// use strata_types::validate_path;
///
/// assert!(validate_path("fleet/truck-1/odometer").is_ok());
/// assert!(validate_path("fleet\\truck-1").is_ok());
/// assert!(validate_path("fleet/../etc").is_err());
/// assert!(validate_path("bad\rname").is_err());
/// ```
pub fn validate_path(path: &str) -> Result<(), NameError> {
    if path.trim_matches(SEPARATORS).is_empty() {
        return Err(NameError::Empty);
    }

    if let Some(ch) = path.chars().find(|c| c.is_control()) {
        return Err(NameError::invalid(
            path,
            format!("contains control character {ch:?}"),
        ));
    }

    if let Some(ch) = path.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(NameError::invalid(
            path,
            format!("contains forbidden character {ch:?}"),
        ));
    }

    if path.split(SEPARATORS).any(|segment| segment == "..") {
        return Err(NameError::invalid(path, "must not contain '..' segments"));
    }

    Ok(())
}

/// Validate a single path segment.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.contains(SEPARATORS) {
        return Err(NameError::invalid(name, "must not contain a path separator"));
    }
    if name == "." {
        return Err(NameError::invalid(name, "must not be '.'"));
    }
    validate_path(name)
}

/// Validate a segment that is also used as the root element of a document.
pub fn validate_tag_name(name: &str) -> Result<(), NameError> {
    validate_name(name)?;

    if name.chars().any(char::is_whitespace) {
        return Err(NameError::invalid(name, "must not contain whitespace"));
    }
    if let Some(ch) = name.chars().find(|c| matches!(c, '&' | '<' | '>')) {
        return Err(NameError::invalid(
            name,
            format!("contains markup character {ch:?}"),
        ));
    }
    if name.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        return Err(NameError::invalid(
            name,
            "must not start with a digit, '-' or '.'",
        ));
    }

    Ok(())
}

//! Tag name normalization.

use std::collections::BTreeSet;

use super::error::DomainError;

/// Maximum number of distinct tags a post may carry.
pub const MAX_TAGS_PER_POST: usize = 5;

/// Trim and lower-case a tag name. The result is the uniqueness key for tags.
pub fn normalize_tag_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalize a batch of raw names into a de-duplicated set, rejecting
/// batches with more than [`MAX_TAGS_PER_POST`] distinct entries.
///
/// Blank names are dropped.
pub fn normalize_tag_names<S: AsRef<str>>(raw: &[S]) -> Result<BTreeSet<String>, DomainError> {
    let names: BTreeSet<String> = raw
        .iter()
        .map(|name| normalize_tag_name(name.as_ref()))
        .filter(|name| !name.is_empty())
        .collect();

    if names.len() > MAX_TAGS_PER_POST {
        return Err(DomainError::validation(
            "tags",
            format!(
                "at most {MAX_TAGS_PER_POST} distinct tags are allowed, got {}",
                names.len()
            ),
        ));
    }

    Ok(names)
}

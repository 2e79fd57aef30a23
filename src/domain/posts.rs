//! Post content invariants shared by the create and edit pipelines.

use super::error::DomainError;

/// Minimum number of characters in a trimmed title.
pub const MIN_TITLE_CHARS: usize = 3;

pub fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().chars().count() < MIN_TITLE_CHARS {
        return Err(DomainError::validation(
            "title",
            format!("must be at least {MIN_TITLE_CHARS} characters long"),
        ));
    }
    Ok(())
}

pub fn validate_markdown(markdown: &str) -> Result<(), DomainError> {
    if markdown.trim().is_empty() {
        return Err(DomainError::validation("body", "must not be empty"));
    }
    Ok(())
}

/// Whether a submitted field differs from the stored one, ignoring surrounding whitespace.
pub fn text_changed(submitted: &str, stored: &str) -> bool {
    submitted.trim() != stored.trim()
}

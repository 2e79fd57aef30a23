//! Cover image invariants: accepted types, pixel bounds and storage keys.

use std::path::Path;

use slug::slugify;
use url::Url;
use uuid::Uuid;

use super::error::DomainError;

/// MIME subtypes accepted for cover images (`image/<subtype>`).
pub const ALLOWED_IMAGE_SUBTYPES: [&str; 5] = ["jpeg", "jpg", "png", "webp", "gif"];

pub const DEFAULT_MAX_WIDTH: u32 = 1280;
pub const DEFAULT_MAX_HEIGHT: u32 = 720;

/// Parse and check a declared MIME type against the allow-list.
///
/// Parameters such as `; charset=...` are ignored and the comparison is
/// case-insensitive. Returns the canonical lower-case type.
pub fn validate_image_mime(declared: &str) -> Result<String, DomainError> {
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let allowed = essence
        .strip_prefix("image/")
        .is_some_and(|subtype| ALLOWED_IMAGE_SUBTYPES.contains(&subtype));

    if !allowed {
        return Err(DomainError::validation(
            "cover_image",
            format!("unsupported image type `{declared}`"),
        ));
    }

    Ok(essence)
}

/// Inclusive upper bounds for cover image pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageBounds {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

impl ImageBounds {
    pub fn check(&self, width: u64, height: u64) -> Result<(), DomainError> {
        if width > u64::from(self.max_width) || height > u64::from(self.max_height) {
            return Err(DomainError::validation(
                "cover_image",
                format!(
                    "image is {width}x{height}, the maximum is {}x{}",
                    self.max_width, self.max_height
                ),
            ));
        }
        Ok(())
    }
}

/// Build a collision-free storage key: `<uuid>_<sanitized filename>`.
pub fn storage_key_for(original_name: &str) -> String {
    format!("{}_{}", Uuid::new_v4(), sanitize_filename(original_name))
}

/// Recover the storage key from a public blob URL (its last path segment).
pub fn storage_key_from_url(public_url: &str) -> Option<String> {
    let parsed = Url::parse(public_url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    Some(segment.to_string())
}

pub fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original.trim());
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

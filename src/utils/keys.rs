use std::collections::HashSet;
use std::path::Path;

/// Content types served back by the bucket, keyed by lowercase extension
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
];

/// Looks up the content type for a file name by extension.
/// Unknown or missing extensions fall back to `application/octet-stream`.
pub fn content_type_for(file_name: &str) -> &'static str {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .and_then(|ext| {
            CONTENT_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

/// Ensures a non-empty folder prefix ends in exactly one `/`. Empty stays empty.
pub fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim().trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Builds `{folder}{timestamp_ms}-{base_name}`
pub fn object_key(folder: &str, timestamp_ms: i64, base_name: &str) -> String {
    format!("{}{}-{}", normalize_folder(folder), timestamp_ms, base_name)
}

/// Returns `name`, or `stem-N.ext` with the lowest free `N >= 2` when `name` is already
/// taken. Files of one request share a folder and usually a millisecond, so their
/// base names must differ for the keys to differ.
pub fn unique_file_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    (2..)
        .map(|n| match ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

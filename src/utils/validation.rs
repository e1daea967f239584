use mime::Mime;
use std::path::Path;
use thiserror::Error;

/// Maximum file size: 10 MB
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of files accepted in a single request
pub const MAX_FILES_PER_REQUEST: usize = 15;

/// Allowed MIME types: listing photos only
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    // jpg aliases sent by some browsers and older clients
    "image/jpg",
    "image/pjpeg",
];

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    /// Size violations map to 413, everything else to 400
    pub fn is_too_large(&self) -> bool {
        self.code == "FILE_TOO_LARGE"
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Validates how many files a request carries. `count` includes the file being checked.
pub fn validate_file_count(count: usize, max_files: usize) -> Result<(), ValidationError> {
    if count > max_files {
        return Err(ValidationError {
            code: "TOO_MANY_FILES",
            message: format!("At most {} files can be uploaded per request", max_files),
        });
    }
    Ok(())
}

/// Validates MIME type against allowlist
pub fn validate_mime_type(content_type: &str) -> Result<(), ValidationError> {
    // Parameters such as `; charset=binary` are ignored
    let normalized = content_type
        .trim()
        .parse::<Mime>()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_default();

    if ALLOWED_MIME_TYPES
        .iter()
        .any(|&allowed| allowed == normalized)
    {
        return Ok(());
    }

    Err(ValidationError {
        code: "INVALID_MIME_TYPE",
        message: format!(
            "Invalid file type '{}'. Only JPEG, PNG, JPG, and WEBP are allowed.",
            content_type
        ),
    })
}

/// Sanitizes filename to prevent path traversal and injection attacks
/// Returns the sanitized filename or an error if the name is invalid
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Browsers on Windows may send the full client path
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if filename.contains("..") {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
                || c == '#'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Keys carry a timestamp prefix, so leave headroom under the 1024 byte S3 limit
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        });
    }

    Ok(sanitized)
}

/// Pre-staging checks for one file part. `position` is 1-based.
pub fn validate_incoming_file(
    content_type: Option<&str>,
    declared_size: Option<usize>,
    position: usize,
    max_size: usize,
    max_files: usize,
) -> Result<(), ValidationError> {
    // 1. Count check
    validate_file_count(position, max_files)?;

    // 2. MIME type check
    validate_mime_type(content_type.unwrap_or("application/octet-stream"))?;

    // 3. Size check, when the client declared one
    if let Some(size) = declared_size {
        validate_file_size(size, max_size)?;
    }

    Ok(())
}

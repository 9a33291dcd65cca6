//! Common utilities for file upload handling

use studyhub_core::AppError;

const MAX_FILENAME_LENGTH: usize = 255;

/// Longest extension carried onto the temp file name.
pub const MAX_EXTENSION_LENGTH: usize = 10;

/// Validate file size
pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Strips parameters and lower-cases (`"Text/Plain; charset=utf-8"` -> `"text/plain"`).
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Validate a normalized content type against the allow-list.
pub fn validate_content_type(content_type: &str, allowed_types: &[String]) -> Result<(), AppError> {
    if !allowed_types.iter().any(|ct| ct.eq_ignore_ascii_case(content_type)) {
        return Err(AppError::UnsupportedMediaType(format!(
            "Content type '{}' is not allowed. Allowed types: {}",
            content_type,
            allowed_types.join(", ")
        )));
    }
    Ok(())
}

/// Lower-cased extension of `filename`, or an empty string when it has none.
pub fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Validate a lower-cased extension against the allow-list.
pub fn validate_file_extension(
    extension: &str,
    allowed_extensions: &[String],
) -> Result<(), AppError> {
    if extension.is_empty() || !allowed_extensions.iter().any(|e| e == extension) {
        let shown = if extension.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{}", extension)
        };
        return Err(AppError::UnsupportedMediaType(format!(
            "File type {} is not allowed. Allowed extensions: {}",
            shown,
            allowed_extensions.join(", ")
        )));
    }
    Ok(())
}

/// Extension as it may appear on disk: ASCII alphanumerics only, at most 10 chars.
pub fn temp_file_extension(extension: &str) -> String {
    extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LENGTH)
        .collect()
}

/// Display name for a client-supplied filename.
///
/// Drops any directory part (either separator), removes control characters
/// and caps the result at 255 characters. The result is never used as a path.
pub fn sanitize_display_name(filename: &str) -> String {
    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    filename_only
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_LENGTH)
        .collect::<String>()
        .trim()
        .to_string()
}

//! Validation utilities for upload handling

/// Content types a document extension may legitimately be sent as.
///
/// `None` for extensions outside the document set.
fn expected_content_types(extension: &str) -> Option<&'static [&'static str]> {
    let types: &'static [&'static str] = match extension {
        "pdf" => &["application/pdf"],
        "doc" => &["application/msword"],
        "docx" => &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
        "ppt" => &["application/vnd.ms-powerpoint"],
        "pptx" => &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
        "txt" => &["text/plain"],
        _ => return None,
    };
    Some(types)
}

/// Checks that the content type agrees with the file extension.
///
/// Blocks a `.pdf` declared as `text/plain` and similar spoofing. Both
/// arguments are expected to be normalized already.
pub fn validate_extension_content_type_match(
    extension: &str,
    content_type: &str,
) -> Result<(), String> {
    if extension.is_empty() {
        return Err("File must have an extension".to_string());
    }

    match expected_content_types(extension) {
        Some(expected) if expected.contains(&content_type) => Ok(()),
        Some(expected) => Err(format!(
            "Content-Type '{}' does not match extension '{}'. Expected one of: {}",
            content_type,
            extension,
            expected.join(", ")
        )),
        None => {
            // Operator widened ALLOWED_EXTENSIONS; the allow-lists still apply.
            tracing::debug!(
                extension = %extension,
                content_type = %content_type,
                "Unknown extension, skipping Content-Type/extension cross-validation"
            );
            Ok(())
        }
    }
}

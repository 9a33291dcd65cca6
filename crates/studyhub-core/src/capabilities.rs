//! Small capability interfaces chosen at startup and injected into the service.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Resolves a MIME type from a filename.
pub trait MimeLookup: Send + Sync {
    fn lookup(&self, filename: &str) -> Option<String>;
}

/// Extension based lookup backed by `mime_guess`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionMimeLookup;

impl MimeLookup for ExtensionMimeLookup {
    fn lookup(&self, filename: &str) -> Option<String> {
        mime_guess::from_path(filename)
            .first()
            .map(|mime| mime.essence_str().to_string())
    }
}

/// Builds the `Content-Disposition` value served with a download.
pub trait DispositionFormatter: Send + Sync {
    fn attachment(&self, filename: &str) -> String;
}

// Same unreserved set as JavaScript's encodeURIComponent.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// RFC 5987 attr-char forbids quote and parentheses.
const EXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~');

/// `attachment; filename="<encoded>"; filename*=UTF-8''<encoded>`
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentDisposition;

impl DispositionFormatter for AttachmentDisposition {
    fn attachment(&self, filename: &str) -> String {
        let plain = utf8_percent_encode(filename, COMPONENT).to_string();
        let extended = utf8_percent_encode(filename, EXT_VALUE).to_string();
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            plain, extended
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_document_types() {
        let lookup = ExtensionMimeLookup;
        assert_eq!(lookup.lookup("notes.pdf").as_deref(), Some("application/pdf"));
        assert_eq!(lookup.lookup("README.TXT").as_deref(), Some("text/plain"));
        assert_eq!(
            lookup.lookup("slides.pptx").as_deref(),
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        );
        assert_eq!(lookup.lookup("no_extension"), None);
    }

    #[test]
    fn attachment_encodes_unsafe_characters() {
        let value = AttachmentDisposition.attachment("unit 1 \"final\".pdf");
        assert_eq!(
            value,
            "attachment; filename=\"unit%201%20%22final%22.pdf\"; filename*=UTF-8''unit%201%20%22final%22.pdf"
        );
    }

    #[test]
    fn attachment_encodes_non_ascii_as_utf8() {
        let value = AttachmentDisposition.attachment("résumé.pdf");
        assert!(value.contains("filename=\"r%C3%A9sum%C3%A9.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
    }
}

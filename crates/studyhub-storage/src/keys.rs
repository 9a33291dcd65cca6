use uuid::Uuid;

pub(crate) const MATERIALS_PREFIX: &str = "materials";
const MAX_EXTENSION_LEN: usize = 10;

/// Fresh key of the form `materials/{uuid}.{ext}`.
pub(crate) fn generate_key(extension: &str) -> String {
    let ext: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if ext.is_empty() {
        format!("{}/{}", MATERIALS_PREFIX, Uuid::new_v4())
    } else {
        format!("{}/{}.{}", MATERIALS_PREFIX, Uuid::new_v4(), ext)
    }
}

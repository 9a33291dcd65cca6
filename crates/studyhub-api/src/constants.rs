//! API constants

/// Prefix for every material route.
pub const API_PREFIX: &str = "/api";

/// Room for the text fields and multipart framing on top of the file itself.
pub const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Builds a path under [`API_PREFIX`].
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

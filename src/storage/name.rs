//! File name handling
//!
//! Every stored file is addressed by its base name only, whatever the client sent.

/// Return the final path segment of `name`, treating both `/` and `\` as separators.
///
/// Idempotent: `base_name(base_name(x)) == base_name(x)`.
pub fn base_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(name)
}

/// Whether `name` can be stored directly inside the upload directory
pub fn is_storable(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name != super::STAGING_DIR
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}

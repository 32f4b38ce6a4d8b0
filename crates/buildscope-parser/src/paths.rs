//! Path normalization for log-derived paths.

/// Normalize a path as it appears in MSVC log output: backslashes become
/// forward slashes and the whole path is lowercased, so the same file
/// always compares equal regardless of how the compiler spelled it.
pub fn unify_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Final component of an already-unified path.
pub(crate) fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

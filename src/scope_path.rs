use std::path::Path;

/// Forward slashes only, so Windows paths and `year/month` labels compare directly.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn normalize(path: &str) -> String {
    let mut normalized = normalize_separators(path);
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

/// Absolute form of a user-supplied scan root, falling back to the path as given.
pub fn absolute_root(root: &Path) -> std::path::PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

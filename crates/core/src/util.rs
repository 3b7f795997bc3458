use std::path::{Path, PathBuf};

/// Join two paths, only including the normal components.
pub fn join_normalized(base: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let mut out = base.as_ref().to_path_buf();
    out.extend(path.as_ref().components().filter(|v| matches!(v, std::path::Component::Normal(_))));
    out
}

/// Split a wildcard route capture into its non-empty segments.
pub fn split_segments(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

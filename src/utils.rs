use std::path::{Component, Path, PathBuf};

/// Rough estimate: GPT-style token ≈ 4 chars (good enough for UI)
pub fn approx_tokens(s: &str) -> usize {
    s.chars().count() / 4
}

/// `/`-separated form of a root-relative path, used for persistence and
/// report headers regardless of platform.
pub fn path_key(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn key_to_path(key: &str) -> PathBuf {
    key.split('/').filter(|s| !s.is_empty() && *s != ".").collect()
}

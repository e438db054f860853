use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Build pretty tree-style labels in **O(n)**.
///
/// * `paths` are root-relative and **must** be in depth-first order, which
///   for component-wise `Path` ordering means sorted.
/// * Every path's parent must either be the root or appear earlier in `paths`.
/// * Each element in `paths` is `(path, is_dir)`.
pub fn build_tree_labels(paths: &[(PathBuf, bool)]) -> Vec<String> {
    // PASS #1 – record each parent's last immediate child index
    let mut last_child: HashMap<&Path, usize> = HashMap::new();
    for (idx, (path, _)) in paths.iter().enumerate() {
        last_child.insert(path.parent().unwrap_or_else(|| Path::new("")), idx);
    }

    // PASS #2 – `open[d]` is true while the ancestor at depth d+1 still has
    // siblings below it, i.e. its column needs a "│".
    let mut open: Vec<bool> = Vec::new();
    let mut labels = Vec::with_capacity(paths.len());
    for (idx, (path, is_dir)) in paths.iter().enumerate() {
        let depth = path.components().count().max(1);
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let is_last = last_child.get(parent) == Some(&idx);

        open.truncate(depth - 1);
        let mut label: String = open
            .iter()
            .map(|&has_more| if has_more { "│  " } else { "   " })
            .collect();
        label.push_str(if is_last { "└─ " } else { "├─ " });
        label.push_str(&path.file_name().unwrap_or_default().to_string_lossy());
        if *is_dir {
            label.push('/');
        }
        labels.push(label);
        open.push(!is_last);
    }
    labels
}

use std::path::PathBuf;

/// One node of the lazily built tree. Children are listed only the first
/// time a directory is expanded.
#[derive(Debug, Clone)]
pub struct TreeRow {
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_expanded: bool,
    pub children_loaded: bool,
    /// Excluded by the classifier; shown dimmed and never reached by a
    /// directory toggle.
    pub excluded: bool,
    pub children_indices: Vec<usize>,
    pub parent_index: Option<usize>,
}

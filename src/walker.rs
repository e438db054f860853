use crate::classifier::PathClassifier;
use crate::error::{ContextError, Result};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// One filesystem entry, keyed by its root-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl Entry {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Order in which a directory is yielded relative to its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Directory before its children (pre-order).
    DirsFirst,
    /// Directory after all of its children (post-order).
    ContentsFirst,
}

/// Filesystem traversal rooted at the workspace.
///
/// * Every listing is sorted by file name, so walks are deterministic.
/// * Traversal is driven by `walkdir`'s internal queue; deep trees never
///   recurse on the call stack.
/// * Symlinks are followed, so an entry is classified by its target. Broken
///   links and link cycles surface as walk errors.
/// * Unreadable entries are logged and skipped; they never abort a walk.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    classifier: PathClassifier,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>, classifier: PathClassifier) -> Self {
        Self {
            root: root.into(),
            classifier,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    pub fn absolute(&self, rel: &Path) -> PathBuf {
        if rel.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }

    pub fn is_dir(&self, rel: &Path) -> bool {
        self.absolute(rel).is_dir()
    }

    /// False for broken symlinks, matching what a walk yields.
    pub fn exists(&self, rel: &Path) -> bool {
        self.absolute(rel).metadata().is_ok()
    }

    /// Converts an absolute path under the root, or a relative one, into a
    /// clean root-relative path.
    pub fn relativize(&self, path: &Path) -> Result<PathBuf> {
        let relative = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    let canonical = path.canonicalize().map_err(|_| self.outside(path))?;
                    canonical
                        .strip_prefix(&self.root)
                        .map_err(|_| self.outside(path))?
                        .to_path_buf()
                }
            }
        } else {
            path.to_path_buf()
        };

        let mut clean = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => clean.push(segment),
                Component::CurDir => {}
                _ => return Err(self.outside(path)),
            }
        }
        Ok(clean)
    }

    fn outside(&self, path: &Path) -> ContextError {
        ContextError::OutsideRoot {
            path: path.to_path_buf(),
            root: self.root.clone(),
        }
    }

    /// One level of `dir`, sorted by name. Excluded entries are included; it
    /// is up to the caller to consult the classifier.
    pub fn list_children(&self, dir: &Path) -> Result<Vec<Entry>> {
        let abs = self.absolute(dir);
        let mut children = Vec::new();
        for result in WalkDir::new(&abs)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            match result {
                Ok(dirent) => children.push(self.to_entry(dirent.path(), dirent.file_type().is_dir())),
                Err(err) if err.depth() == 0 => {
                    return Err(ContextError::Traversal {
                        path: abs,
                        source: err,
                    });
                }
                Err(err) => log::warn!("Skipping unreadable entry in {}: {}", abs.display(), err),
            }
        }
        Ok(children)
    }

    /// Like [`TreeWalker::list_children`], but an unreadable directory is
    /// logged and treated as empty.
    pub fn list_children_or_empty(&self, dir: &Path) -> Vec<Entry> {
        self.list_children(dir).unwrap_or_else(|err| {
            log::warn!("{}", err);
            Vec::new()
        })
    }

    /// Children of `dir` that are not excluded by the classifier.
    pub fn selectable_children(&self, dir: &Path) -> Vec<Entry> {
        self.list_children_or_empty(dir)
            .into_iter()
            .filter(|entry| !self.classifier.is_excluded(&entry.path, entry.is_dir))
            .collect()
    }

    /// Depth-first walk of everything below `dir` (not `dir` itself).
    ///
    /// `keep` is consulted for every entry; returning `false` skips a file or
    /// prunes a whole directory without visiting it.
    pub fn walk<'a, F>(
        &'a self,
        dir: &Path,
        order: Order,
        mut keep: F,
    ) -> impl Iterator<Item = Entry> + use<'a, F>
    where
        F: FnMut(&Entry) -> bool + 'a,
    {
        let abs = self.absolute(dir);
        WalkDir::new(&abs)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .contents_first(order == Order::ContentsFirst)
            .into_iter()
            .filter_entry(move |dirent| {
                keep(&self.to_entry(dirent.path(), dirent.file_type().is_dir()))
            })
            .filter_map(move |result| match result {
                Ok(dirent) => Some(self.to_entry(dirent.path(), dirent.file_type().is_dir())),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
    }

    /// Walk that prunes everything the classifier excludes.
    pub fn walk_selectable<'a>(
        &'a self,
        dir: &Path,
        order: Order,
    ) -> impl Iterator<Item = Entry> + use<'a> {
        self.walk(dir, order, move |entry| {
            !self.classifier.is_excluded(&entry.path, entry.is_dir)
        })
    }

    fn to_entry(&self, abs: &Path, is_dir: bool) -> Entry {
        let path = abs
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| abs.to_path_buf());
        Entry { path, is_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExclusionPolicy;
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/b.rs"), "b").unwrap();
        fs::write(root.join("src/a.rs"), "a").unwrap();
        fs::write(root.join("src/logo.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("src/nested/c.rs"), "c").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join("README.md"), "readme").unwrap();
        dir
    }

    fn walker(root: &Path) -> TreeWalker {
        TreeWalker::new(root, PathClassifier::new(&ExclusionPolicy::default()))
    }

    #[test]
    fn list_children_is_sorted_and_unfiltered() {
        let dir = fixture();
        let w = walker(dir.path());
        let names: Vec<String> = w.list_children(Path::new("")).unwrap().iter().map(Entry::name).collect();
        assert_eq!(names, vec!["README.md", "node_modules", "src"]);

        let src = w.list_children(Path::new("src")).unwrap();
        assert_eq!(src[0].path, PathBuf::from("src/a.rs"));
        assert!(!src[0].is_dir);
        assert!(src.iter().any(|e| e.path == Path::new("src/nested") && e.is_dir));
    }

    #[test]
    fn missing_directory_is_a_traversal_error() {
        let dir = fixture();
        let w = walker(dir.path());
        assert!(matches!(
            w.list_children(Path::new("nope")),
            Err(ContextError::Traversal { .. })
        ));
        assert!(w.list_children_or_empty(Path::new("nope")).is_empty());
    }

    #[test]
    fn selectable_walk_prunes_excluded_subtrees() {
        let dir = fixture();
        let w = walker(dir.path());
        let paths: Vec<PathBuf> = w.walk_selectable(Path::new(""), Order::DirsFirst).map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("src"),
                PathBuf::from("src/a.rs"),
                PathBuf::from("src/b.rs"),
                PathBuf::from("src/nested"),
                PathBuf::from("src/nested/c.rs"),
            ]
        );
    }

    #[test]
    fn contents_first_yields_directories_after_children() {
        let dir = fixture();
        let w = walker(dir.path());
        let paths: Vec<PathBuf> = w.walk_selectable(Path::new("src"), Order::ContentsFirst).map(|e| e.path).collect();
        let nested = paths.iter().position(|p| p == Path::new("src/nested")).unwrap();
        let nested_file = paths.iter().position(|p| p == Path::new("src/nested/c.rs")).unwrap();
        assert!(nested_file < nested);
        assert!(!paths.contains(&PathBuf::from("src")));
    }

    #[test]
    fn relativize_accepts_absolute_and_relative_paths() {
        let dir = fixture();
        let root = dir.path().canonicalize().unwrap();
        let w = walker(&root);
        assert_eq!(w.relativize(&root.join("src/a.rs")).unwrap(), PathBuf::from("src/a.rs"));
        assert_eq!(w.relativize(Path::new("./src/./a.rs")).unwrap(), PathBuf::from("src/a.rs"));
        assert_eq!(w.relativize(&root).unwrap(), PathBuf::new());
        assert!(w.relativize(Path::new("../elsewhere")).is_err());
        assert!(w.relativize(Path::new("/definitely/not/under/root")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_skipped() {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path().join("src/gone.rs"), dir.path().join("src/broken.rs"))
            .unwrap();
        let w = walker(dir.path());

        let listed: Vec<PathBuf> = w.list_children(Path::new("src")).unwrap().into_iter().map(|e| e.path).collect();
        assert!(!listed.contains(&PathBuf::from("src/broken.rs")));
        assert!(w.walk(Path::new(""), Order::DirsFirst, |_| true).all(|e| e.path != Path::new("src/broken.rs")));
        assert!(!w.exists(Path::new("src/broken.rs")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_walked_as_a_directory() {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path().join("src/nested"), dir.path().join("linked")).unwrap();
        let w = walker(dir.path());

        let entries: Vec<Entry> = w.walk_selectable(Path::new("linked"), Order::DirsFirst).collect();
        assert_eq!(
            entries,
            vec![Entry { path: PathBuf::from("linked/c.rs"), is_dir: false }]
        );
        let top = w.list_children(Path::new("")).unwrap();
        assert!(top.iter().any(|e| e.path == Path::new("linked") && e.is_dir));
        assert!(w.is_dir(Path::new("linked")));
    }
}

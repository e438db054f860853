use crate::error::{ContextError, Result};
use crate::store::SelectionStore;
use crate::utils::{approx_tokens, path_key};
use crate::walker::Order;
use std::fs;
use std::path::{Path, PathBuf};

/// A file that was selected but could not be included.
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: ContextError,
}

/// Concatenated contents of every effectively selected file.
#[derive(Debug, Default)]
pub struct Report {
    pub text: String,
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn approx_tokens(&self) -> usize {
        approx_tokens(&self.text)
    }
}

/// Builds the report for the store's workspace.
///
/// The list of files is snapshotted with a single depth-first walk before
/// any file is read, so changes made during the read phase do not alter
/// which paths are visited. Unreadable or non-UTF-8 files are skipped and
/// recorded in [`Report::skipped`]. `progress` receives
/// `"Processing: <path>"` after each appended file.
pub fn build_report<F>(store: &SelectionStore, mut progress: F) -> Report
where
    F: FnMut(&str),
{
    let snapshot: Vec<PathBuf> = store
        .walker()
        .walk(Path::new(""), Order::DirsFirst, |entry| {
            store.may_hold_selection(entry)
        })
        .filter(|entry| !entry.is_dir && store.effective_rel(&entry.path))
        .map(|entry| entry.path)
        .collect();
    log::debug!("Building report from {} selected files", snapshot.len());

    let mut report = Report::default();
    for rel in snapshot {
        let abs = store.walker().absolute(&rel);
        match read_text(&abs) {
            Ok(content) => {
                let key = path_key(&rel);
                append_record(&mut report.text, &key, &content);
                report.files.push(rel);
                progress(&format!("Processing: {}", key));
            }
            Err(error) => {
                log::warn!("Skipping {}: {}", abs.display(), error);
                report.skipped.push(SkippedFile { path: rel, error });
            }
        }
    }
    report
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| ContextError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| ContextError::NotText(path.to_path_buf()))
}

fn append_record(out: &mut String, relative_path: &str, content: &str) {
    out.push_str("\n--- File: ");
    out.push_str(relative_path);
    out.push_str(" ---\n");
    out.push_str(content);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExclusionPolicy;
    use crate::persistence::MemoryStateStore;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn open(root: &Path) -> SelectionStore {
        SelectionStore::open(root, &ExclusionPolicy::default(), Box::new(MemoryStateStore::new()))
    }

    #[test]
    fn report_contains_only_selected_text_files() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/a.ts", b"export const a = 1;");
        write(dir.path(), "src/b.png", b"\x89PNG");
        write(dir.path(), "node_modules/x.js", b"module.exports = {};");

        let store = open(dir.path());
        let report = build_report(&store, |_| {});
        assert_eq!(report.text, "\n--- File: src/a.ts ---\nexport const a = 1;\n");
        assert_eq!(report.files, vec![PathBuf::from("src/a.ts")]);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn records_follow_lexical_traversal_order() {
        let dir = tempdir().unwrap();
        write(dir.path(), "z.md", b"z");
        write(dir.path(), "a/b/c.rs", b"c");
        write(dir.path(), "a/a.rs", b"a");
        write(dir.path(), "m.txt", b"m");

        let store = open(dir.path());
        let first = build_report(&store, |_| {});
        assert_eq!(
            first.files,
            vec![
                PathBuf::from("a/a.rs"),
                PathBuf::from("a/b/c.rs"),
                PathBuf::from("m.txt"),
                PathBuf::from("z.md"),
            ]
        );
        let second = build_report(&store, |_| {});
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn unreadable_files_are_skipped_and_progress_is_reported() {
        let dir = tempdir().unwrap();
        write(dir.path(), "good.txt", b"hello");
        write(dir.path(), "latin1.txt", &[0x63, 0x61, 0x66, 0xe9]);

        let store = open(dir.path());
        let mut messages = Vec::new();
        let report = build_report(&store, |msg| messages.push(msg.to_string()));

        assert_eq!(report.files, vec![PathBuf::from("good.txt")]);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0].error, ContextError::NotText(_)));
        assert_eq!(messages, vec!["Processing: good.txt".to_string()]);
    }

    #[test]
    fn empty_selection_yields_empty_report() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/main.rs", b"fn main() {}");
        let mut store = open(dir.path());
        store.clear_all();
        let report = build_report(&store, |_| {});
        assert!(report.is_empty());
        assert!(report.text.is_empty());
        assert_eq!(report.approx_tokens(), 0);
    }
}

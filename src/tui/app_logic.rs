use super::app_state::TreeRow;
use crate::clipboard::ClipboardSink;
use crate::commands::{self, CommandOutcome, DEFAULT_DOWNLOAD_NAME};
use crate::store::{SelectionState, SelectionStore};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct TuiApp<'a> {
    pub(super) store: &'a mut SelectionStore,
    clipboard: &'a mut dyn ClipboardSink,
    pub(super) rows: Vec<TreeRow>,
    pub(super) top_level: Vec<usize>,
    pub(super) current_selection_idx: usize,
    pub(super) scroll_offset: usize,
    pub(super) quit: bool,
    pub(super) list_viewport_height: usize,
    pub(super) status: Option<CommandOutcome>,
    count_cache: HashMap<PathBuf, usize>,
}

impl<'a> TuiApp<'a> {
    pub fn new(store: &'a mut SelectionStore, clipboard: &'a mut dyn ClipboardSink) -> Self {
        let mut app = TuiApp {
            store,
            clipboard,
            rows: Vec::new(),
            top_level: Vec::new(),
            current_selection_idx: 0,
            scroll_offset: 0,
            quit: false,
            list_viewport_height: 0, // Will be updated by ui_renderer
            status: None,
            count_cache: HashMap::new(),
        };
        app.top_level = app.load_children(None);
        app
    }

    /// Lists one directory level and appends it to the arena.
    fn load_children(&mut self, parent: Option<usize>) -> Vec<usize> {
        let dir = match parent {
            Some(idx) => self.rows[idx].path.clone(),
            None => PathBuf::new(),
        };
        let entries = self.store.walker().list_children_or_empty(&dir);
        let mut indices = Vec::with_capacity(entries.len());
        for entry in entries {
            let excluded = self
                .store
                .classifier()
                .is_excluded(&entry.path, entry.is_dir);
            indices.push(self.rows.len());
            self.rows.push(TreeRow {
                path: entry.path,
                is_dir: entry.is_dir,
                is_expanded: false,
                children_loaded: false,
                excluded,
                children_indices: Vec::new(),
                parent_index: parent,
            });
        }
        if let Some(idx) = parent {
            self.rows[idx].children_indices = indices.clone();
            self.rows[idx].children_loaded = true;
        }
        indices
    }

    pub(super) fn get_visible_item_indices(&self) -> Vec<usize> {
        let mut visible = Vec::new();
        let mut stack: Vec<usize> = self.top_level.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            visible.push(idx);
            let row = &self.rows[idx];
            if row.is_dir && row.is_expanded {
                stack.extend(row.children_indices.iter().rev().copied());
            }
        }
        visible
    }

    pub(super) fn row_state(&self, idx: usize) -> SelectionState {
        self.store.aggregate_state(&self.rows[idx].path)
    }

    /// Selected files under a directory row, cached until the next mutation.
    pub(super) fn selected_count(&mut self, idx: usize) -> usize {
        self.cached_count(self.rows[idx].path.clone())
    }

    pub(super) fn selected_count_total(&mut self) -> usize {
        self.cached_count(PathBuf::new())
    }

    fn cached_count(&mut self, path: PathBuf) -> usize {
        if let Some(count) = self.count_cache.get(&path) {
            return *count;
        }
        let count = self.store.count_selected(&path);
        self.count_cache.insert(path, count);
        count
    }

    pub(super) fn current_path(&self) -> Option<&Path> {
        self.rows
            .get(self.current_selection_idx)
            .map(|row| row.path.as_path())
    }

    fn selection_changed(&mut self, outcome: CommandOutcome) {
        self.count_cache.clear();
        self.status = Some(outcome);
    }

    pub(super) fn move_selection_in_visible_list(&mut self, delta: i32) {
        let visible_indices = self.get_visible_item_indices();
        if visible_indices.is_empty() {
            return;
        }
        let new_pos = match visible_indices
            .iter()
            .position(|&idx| idx == self.current_selection_idx)
        {
            Some(pos) => (pos as i32 + delta).rem_euclid(visible_indices.len() as i32) as usize,
            None if delta > 0 => 0,
            None => visible_indices.len() - 1,
        };
        self.current_selection_idx = visible_indices[new_pos];
    }

    pub(super) fn toggle_current_item_selection(&mut self) {
        let Some(path) = self.current_path().map(Path::to_path_buf) else {
            return;
        };
        let outcome = commands::toggle_selection(self.store, &path);
        self.selection_changed(outcome);
    }

    pub(super) fn toggle_expansion_and_adjust_selection(&mut self) {
        let idx = self.current_selection_idx;
        if idx >= self.rows.len() || !self.rows[idx].is_dir {
            return;
        }
        if !self.rows[idx].children_loaded {
            self.load_children(Some(idx));
        }
        self.rows[idx].is_expanded = !self.rows[idx].is_expanded;
        self.ensure_selection_is_visible_in_viewport();
    }

    pub(super) fn collapse_all_directories(&mut self) {
        for row in self.rows.iter_mut() {
            row.is_expanded = false;
        }
        // Climb to the top-level ancestor of the current row.
        while let Some(parent) = self
            .rows
            .get(self.current_selection_idx)
            .and_then(|row| row.parent_index)
        {
            self.current_selection_idx = parent;
        }
        self.ensure_selection_is_visible_in_viewport();
    }

    pub(super) fn copy_to_clipboard(&mut self) {
        let outcome = commands::copy_selected_to_clipboard(self.store, &mut *self.clipboard, |msg| {
            log::trace!("{}", msg)
        });
        self.status = Some(outcome);
    }

    pub(super) fn download_to_file(&mut self) {
        let destination = self.store.root().join(DEFAULT_DOWNLOAD_NAME);
        let outcome = commands::download_selected_to_file(self.store, &destination, |msg| {
            log::trace!("{}", msg)
        });
        self.status = Some(outcome);
    }

    pub(super) fn reset_to_default(&mut self) {
        let outcome = commands::reset_to_default(self.store);
        self.selection_changed(outcome);
    }

    pub(super) fn clear_all(&mut self) {
        let outcome = commands::clear_all(self.store);
        self.selection_changed(outcome);
    }

    /// Re-syncs the store with the disk and rebuilds the rows, keeping the
    /// same directories expanded and the cursor on the same path if it
    /// still exists.
    pub(super) fn refresh(&mut self) {
        let root = self.store.root().to_path_buf();
        let outcome = match self.store.invalidate(&root) {
            Ok(()) => CommandOutcome::ok("Refreshed from disk."),
            Err(err) => CommandOutcome::failed(format!("Refresh failed: {}", err)),
        };

        let expanded: HashSet<PathBuf> = self
            .rows
            .iter()
            .filter(|row| row.is_expanded)
            .map(|row| row.path.clone())
            .collect();
        let current = self.current_path().map(Path::to_path_buf);

        self.rows.clear();
        self.top_level = self.load_children(None);
        let mut pending: Vec<usize> = self.top_level.clone();
        while let Some(idx) = pending.pop() {
            if self.rows[idx].is_dir && expanded.contains(&self.rows[idx].path) {
                pending.extend(self.load_children(Some(idx)));
                self.rows[idx].is_expanded = true;
            }
        }
        self.current_selection_idx = current
            .and_then(|path| self.rows.iter().position(|row| row.path == path))
            .unwrap_or(0);
        self.scroll_offset = 0;
        self.selection_changed(outcome);
        self.ensure_selection_is_visible_in_viewport();
    }

    pub(super) fn ensure_selection_is_visible_in_viewport(&mut self) {
        let visible_indices = self.get_visible_item_indices();
        if visible_indices.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let pos = match visible_indices
            .iter()
            .position(|&idx| idx == self.current_selection_idx)
        {
            Some(pos) => pos,
            None => {
                self.current_selection_idx = visible_indices[0];
                0
            }
        };
        let list_height = self.list_viewport_height;
        if list_height == 0 {
            return;
        }
        if pos < self.scroll_offset {
            self.scroll_offset = pos;
        } else if pos >= self.scroll_offset + list_height {
            self.scroll_offset = pos + 1 - list_height;
        }
        let num_visible_items = visible_indices.len();
        if num_visible_items <= list_height {
            self.scroll_offset = 0;
        } else {
            self.scroll_offset = self.scroll_offset.min(num_visible_items - list_height);
        }
    }

    pub(super) fn handle_input(&mut self, key_event: KeyEvent) {
        if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
        {
            self.quit = true;
            return;
        }
        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection_in_visible_list(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection_in_visible_list(-1),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_current_item_selection(),
            KeyCode::Char('o') | KeyCode::Tab | KeyCode::Right | KeyCode::Left => {
                self.toggle_expansion_and_adjust_selection()
            }
            KeyCode::Char('-') => self.collapse_all_directories(),
            KeyCode::Char('y') => self.copy_to_clipboard(),
            KeyCode::Char('w') => self.download_to_file(),
            KeyCode::Char('r') => self.reset_to_default(),
            KeyCode::Char('c') => self.clear_all(),
            KeyCode::Char('R') | KeyCode::F(5) => self.refresh(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExclusionPolicy;
    use crate::persistence::MemoryStateStore;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    #[derive(Default)]
    struct FakeClipboard(Option<String>);

    impl ClipboardSink for FakeClipboard {
        fn set_text(&mut self, text: String) -> anyhow::Result<()> {
            self.0 = Some(text);
            Ok(())
        }
    }

    fn fixture() -> (TempDir, SelectionStore) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("src/nested/util.rs"), "// util").unwrap();
        fs::write(dir.path().join("node_modules/x.js"), "x").unwrap();
        fs::write(dir.path().join("README.md"), "# hi").unwrap();
        let store = SelectionStore::open(
            dir.path(),
            &ExclusionPolicy::default(),
            Box::new(MemoryStateStore::new()),
        );
        (dir, store)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn visible_paths(app: &TuiApp) -> Vec<PathBuf> {
        app.get_visible_item_indices()
            .into_iter()
            .map(|idx| app.rows[idx].path.clone())
            .collect()
    }

    #[test]
    fn only_top_level_is_loaded_initially() {
        let (_dir, mut store) = fixture();
        let mut clipboard = FakeClipboard::default();
        let app = TuiApp::new(&mut store, &mut clipboard);
        assert_eq!(
            visible_paths(&app),
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("node_modules"),
                PathBuf::from("src"),
            ]
        );
        assert!(app.rows[1].excluded);
        assert!(app.rows.iter().all(|row| !row.children_loaded));
    }

    #[test]
    fn expanding_loads_children_lazily() {
        let (_dir, mut store) = fixture();
        let mut clipboard = FakeClipboard::default();
        let mut app = TuiApp::new(&mut store, &mut clipboard);

        app.handle_input(key(KeyCode::Down));
        app.handle_input(key(KeyCode::Down));
        assert_eq!(app.current_path(), Some(Path::new("src")));
        app.handle_input(key(KeyCode::Tab));
        assert_eq!(
            visible_paths(&app)[3..],
            [PathBuf::from("src/main.rs"), PathBuf::from("src/nested")]
        );

        app.handle_input(key(KeyCode::Down));
        app.handle_input(key(KeyCode::Char('-')));
        assert_eq!(app.current_path(), Some(Path::new("src")));
        assert_eq!(visible_paths(&app).len(), 3);
    }

    #[test]
    fn space_toggles_through_the_store() {
        let (_dir, mut store) = fixture();
        let mut clipboard = FakeClipboard::default();
        {
            let mut app = TuiApp::new(&mut store, &mut clipboard);
            app.handle_input(key(KeyCode::Up)); // wraps to "src"
            assert_eq!(app.current_path(), Some(Path::new("src")));
            assert_eq!(app.row_state(app.current_selection_idx), SelectionState::FullySelected);
            assert_eq!(app.selected_count(app.current_selection_idx), 2);

            app.handle_input(key(KeyCode::Char(' ')));
            assert_eq!(app.row_state(app.current_selection_idx), SelectionState::NotSelected);
            assert_eq!(app.selected_count(app.current_selection_idx), 0);
            assert!(app.status.as_ref().is_some_and(|s| s.success));

            app.handle_input(key(KeyCode::Char('y')));
            assert!(app.status.as_ref().is_some_and(|s| s.success));
        }
        assert_eq!(clipboard.0.as_deref(), Some("\n--- File: README.md ---\n# hi\n"));
    }

    #[test]
    fn clear_reset_and_refresh() {
        let (dir, mut store) = fixture();
        let mut clipboard = FakeClipboard::default();
        let mut app = TuiApp::new(&mut store, &mut clipboard);

        app.handle_input(key(KeyCode::Char('c')));
        assert_eq!(app.row_state(0), SelectionState::NotSelected);
        app.handle_input(key(KeyCode::Char('r')));
        assert_eq!(app.row_state(0), SelectionState::FullySelected);

        app.current_selection_idx = 2;
        app.handle_input(key(KeyCode::Tab));
        fs::write(dir.path().join("src/added.rs"), "// new").unwrap();
        app.handle_input(key(KeyCode::Char('R')));
        assert!(visible_paths(&app).contains(&PathBuf::from("src/added.rs")));
        assert_eq!(app.current_path(), Some(Path::new("src")));
        assert!(app.store.effective_selection(Path::new("src/added.rs")));
    }

    #[test]
    fn written_export_stays_out_of_the_selection() {
        let (dir, mut store) = fixture();
        let mut clipboard = FakeClipboard::default();
        let mut app = TuiApp::new(&mut store, &mut clipboard);

        app.handle_input(key(KeyCode::Char('w')));
        assert!(app.status.as_ref().is_some_and(|s| s.success));
        assert!(dir.path().join(DEFAULT_DOWNLOAD_NAME).is_file());

        app.handle_input(key(KeyCode::Char('R')));
        app.handle_input(key(KeyCode::Char('r')));
        let export_row = app
            .rows
            .iter()
            .position(|row| row.path == Path::new(DEFAULT_DOWNLOAD_NAME))
            .unwrap();
        assert!(app.rows[export_row].excluded);
        assert_eq!(app.row_state(export_row), SelectionState::NotSelected);
        assert_eq!(app.selected_count_total(), 3);
    }

    #[test]
    fn toggling_excluded_directory_reports_failure() {
        let (_dir, mut store) = fixture();
        let mut clipboard = FakeClipboard::default();
        let mut app = TuiApp::new(&mut store, &mut clipboard);

        app.current_selection_idx = 1;
        assert_eq!(app.current_path(), Some(Path::new("node_modules")));
        app.handle_input(key(KeyCode::Char(' ')));
        assert!(app.status.as_ref().is_some_and(|s| !s.success));
        assert_eq!(app.row_state(1), SelectionState::NotSelected);
    }

    #[test]
    fn quit_keys() {
        let (_dir, mut store) = fixture();
        let mut clipboard = FakeClipboard::default();
        let mut app = TuiApp::new(&mut store, &mut clipboard);
        app.handle_input(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.quit);
    }
}

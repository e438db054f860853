use crate::classifier::PathClassifier;
use crate::config::ExclusionPolicy;
use crate::error::{ContextError, Result};
use crate::persistence::{CHECKED_ITEMS_KEY, StateStore};
use crate::utils::{key_to_path, path_key};
use crate::walker::{Entry, Order, TreeWalker};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};

/// Derived tri-state of a path, for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    NotSelected,
    PartiallySelected,
    FullySelected,
}

/// What a subtree rebuild does to the files it visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileMode {
    Keep,
    Check,
    Uncheck,
}

/// The explicit set of checked paths and everything derived from it.
///
/// Keys are root-relative; the root itself is never stored. Files in the
/// set are authoritative. A directory is in the set iff it has at least one
/// selectable descendant file and all of them are selected; that membership
/// is recomputed after every mutation, never set directly.
pub struct SelectionStore {
    walker: TreeWalker,
    workspace: String,
    explicit: BTreeSet<PathBuf>,
    state: Box<dyn StateStore>,
    /// Whether a directory holds any selectable file. Only the filesystem
    /// changes this, so it is dropped on `initialize` and `invalidate`.
    selectable_dirs: RefCell<HashMap<PathBuf, bool>>,
}

impl SelectionStore {
    /// Restores the explicit set for `root` from `state`, or seeds it with
    /// [`SelectionStore::initialize`] when nothing usable is stored.
    pub fn open(root: &Path, policy: &ExclusionPolicy, state: Box<dyn StateStore>) -> Self {
        let walker = TreeWalker::new(root, PathClassifier::for_root(policy, root));
        let workspace = root.to_string_lossy().into_owned();
        let mut store = Self {
            walker,
            workspace,
            explicit: BTreeSet::new(),
            state,
            selectable_dirs: RefCell::new(HashMap::new()),
        };

        match store.state.get(&store.workspace, CHECKED_ITEMS_KEY) {
            Ok(Some(keys)) => {
                log::debug!("Restored {} checked items for {}", keys.len(), store.workspace);
                store.explicit = keys.iter().map(|k| key_to_path(k)).collect();
                store.normalize_restored();
            }
            Ok(None) => {
                log::info!("No saved selection for {}, selecting defaults", store.workspace);
                store.initialize();
            }
            Err(err) => {
                log::warn!("Could not load saved selection, selecting defaults: {}", err);
                store.initialize();
            }
        }
        store
    }

    pub fn root(&self) -> &Path {
        self.walker.root()
    }

    pub fn walker(&self) -> &TreeWalker {
        &self.walker
    }

    pub fn classifier(&self) -> &PathClassifier {
        self.walker.classifier()
    }

    /// The explicit set, in path order.
    pub fn explicit(&self) -> &BTreeSet<PathBuf> {
        &self.explicit
    }

    pub fn is_explicit(&self, path: &Path) -> bool {
        self.walker
            .relativize(path)
            .is_ok_and(|rel| self.explicit.contains(&rel))
    }

    /// Clears everything and selects every non-excluded file, then marks
    /// directories bottom-up.
    pub fn initialize(&mut self) {
        self.explicit.clear();
        self.selectable_dirs.get_mut().clear();
        self.rebuild_subtree(Path::new(""), FileMode::Check);
        log::info!("Initialized selection with {} checked items", self.explicit.len());
        self.persist();
    }

    pub fn reset_to_default(&mut self) {
        self.initialize();
    }

    pub fn clear_all(&mut self) {
        self.explicit.clear();
        log::info!("Cleared selection");
        self.persist();
    }

    /// Flips the effective selection of `path` and returns the new value.
    pub fn toggle(&mut self, path: &Path) -> Result<bool> {
        let rel = self.walker.relativize(path)?;
        let checked = if rel.as_os_str().is_empty() {
            self.aggregate_state(&rel) != SelectionState::FullySelected
        } else if self.is_excluded_dir(&rel) {
            !self.has_explicit_under(&rel)
        } else {
            !self.effective_rel(&rel)
        };
        self.set_checked(&rel, checked)?;
        Ok(checked)
    }

    /// Checks or unchecks `path`.
    ///
    /// A directory applies `checked` to every descendant file the classifier
    /// allows; excluded entries below it are left untouched. An excluded file
    /// targeted directly is recorded as asked. An excluded directory can only
    /// be unchecked, which drops every file checked inside it. Ancestors are
    /// re-derived afterwards.
    pub fn set_checked(&mut self, path: &Path, checked: bool) -> Result<()> {
        let rel = self.walker.relativize(path)?;
        if !rel.as_os_str().is_empty() && !self.walker.exists(&rel) {
            return Err(ContextError::NotFound(self.walker.absolute(&rel)));
        }
        if self.is_excluded_dir(&rel) && checked {
            return Err(ContextError::Excluded(self.walker.absolute(&rel)));
        }
        let mode = if checked {
            FileMode::Check
        } else {
            FileMode::Uncheck
        };

        let is_dir = self.walker.is_dir(&rel);
        if rel.as_os_str().is_empty() {
            self.rebuild_subtree(&rel, mode);
        } else if self.is_excluded_dir(&rel) {
            self.explicit.retain(|p| !p.starts_with(&rel));
            self.update_ancestors(&rel);
        } else if is_dir {
            self.rebuild_subtree(&rel, mode);
            self.update_ancestors(&rel);
        } else {
            self.apply(&rel, mode);
            self.update_ancestors(&rel);
        }
        log::debug!("Set {} to {}", path_key(&rel), checked);
        self.persist();
        Ok(())
    }

    /// True if `path` is checked, or a non-excluded path under a checked
    /// directory.
    pub fn effective_selection(&self, path: &Path) -> bool {
        self.walker
            .relativize(path)
            .is_ok_and(|rel| self.effective_rel(&rel))
    }

    pub fn aggregate_state(&self, path: &Path) -> SelectionState {
        let Ok(rel) = self.walker.relativize(path) else {
            return SelectionState::NotSelected;
        };
        if rel.as_os_str().is_empty() {
            let (any, all) = self.children_fill(&rel);
            return if any && all {
                SelectionState::FullySelected
            } else if !self.explicit.is_empty() {
                SelectionState::PartiallySelected
            } else {
                SelectionState::NotSelected
            };
        }
        if self.effective_rel(&rel) {
            SelectionState::FullySelected
        } else if self.has_explicit_under(&rel) {
            SelectionState::PartiallySelected
        } else {
            SelectionState::NotSelected
        }
    }

    /// Number of files at or below `path` that are effectively selected.
    pub fn count_selected(&self, path: &Path) -> usize {
        let Ok(rel) = self.walker.relativize(path) else {
            return 0;
        };
        if !rel.as_os_str().is_empty() && !self.walker.is_dir(&rel) {
            return usize::from(self.effective_rel(&rel));
        }
        self.walker
            .walk(&rel, Order::DirsFirst, |entry| self.may_hold_selection(entry))
            .filter(|entry| !entry.is_dir && self.effective_rel(&entry.path))
            .count()
    }

    /// Every effectively selected file, in traversal order.
    pub fn selected_files(&self) -> Vec<PathBuf> {
        self.walker
            .walk(Path::new(""), Order::DirsFirst, |entry| {
                self.may_hold_selection(entry)
            })
            .filter(|entry| !entry.is_dir && self.effective_rel(&entry.path))
            .map(|entry| entry.path)
            .collect()
    }

    /// Re-syncs the store with the filesystem at and below `path` after an
    /// external change: vanished entries are dropped, new files under a
    /// checked directory become checked, and ancestors are re-derived.
    pub fn invalidate(&mut self, path: &Path) -> Result<()> {
        let rel = self.walker.relativize(path)?;
        self.selectable_dirs.get_mut().clear();

        let vanished: Vec<PathBuf> = self
            .explicit
            .iter()
            .filter(|p| p.starts_with(&rel) && !self.walker.exists(p))
            .cloned()
            .collect();
        for p in &vanished {
            self.explicit.remove(p);
        }
        self.materialize_checked_dirs(&rel);

        if self.walker.is_dir(&rel) && !self.classifier().is_excluded(&rel, true) {
            let mode = if !rel.as_os_str().is_empty() && self.effective_rel(&rel) {
                FileMode::Check
            } else {
                FileMode::Keep
            };
            self.rebuild_subtree(&rel, mode);
        }
        if !rel.as_os_str().is_empty() {
            self.update_ancestors(&rel);
        }
        log::debug!(
            "Invalidated '{}' ({} vanished entries dropped)",
            path_key(&rel),
            vanished.len()
        );
        self.persist();
        Ok(())
    }

    /// Whether a walk looking for selected files has to visit `entry`.
    /// Excluded entries only matter if something at or below them was
    /// checked directly.
    pub(crate) fn may_hold_selection(&self, entry: &Entry) -> bool {
        !self.classifier().is_excluded(&entry.path, entry.is_dir)
            || self.explicit.contains(&entry.path)
            || (entry.is_dir && self.has_explicit_under(&entry.path))
    }

    pub(crate) fn effective_rel(&self, rel: &Path) -> bool {
        if rel.as_os_str().is_empty() {
            return false;
        }
        if self.explicit.contains(rel) {
            return true;
        }
        let classifier = self.classifier();
        if classifier.is_structurally_excluded(rel) || classifier.is_non_text_file(rel) {
            return false;
        }
        rel.ancestors()
            .skip(1)
            .take_while(|a| !a.as_os_str().is_empty())
            .any(|a| self.explicit.contains(a))
    }

    /// Any explicit entry strictly below `dir`. Component-wise ordering keeps
    /// descendants contiguous right after `dir`.
    fn has_explicit_under(&self, dir: &Path) -> bool {
        if dir.as_os_str().is_empty() {
            return !self.explicit.is_empty();
        }
        self.explicit
            .range::<Path, _>((Bound::Excluded(dir), Bound::Unbounded))
            .next()
            .is_some_and(|p| p.starts_with(dir))
    }

    fn has_selectable_files(&self, dir: &Path) -> bool {
        if let Some(&known) = self.selectable_dirs.borrow().get(dir) {
            return known;
        }
        let found = self
            .walker
            .walk_selectable(dir, Order::DirsFirst)
            .any(|entry| !entry.is_dir);
        self.selectable_dirs
            .borrow_mut()
            .insert(dir.to_path_buf(), found);
        found
    }

    fn is_excluded_dir(&self, rel: &Path) -> bool {
        !rel.as_os_str().is_empty()
            && self.walker.is_dir(rel)
            && self.classifier().is_excluded(rel, true)
    }

    fn apply(&mut self, rel: &Path, mode: FileMode) {
        match mode {
            FileMode::Check => {
                self.explicit.insert(rel.to_path_buf());
            }
            FileMode::Uncheck => {
                self.explicit.remove(rel);
            }
            FileMode::Keep => {}
        }
    }

    fn mark_dir(&mut self, dir: &Path, full: bool) {
        if full {
            self.explicit.insert(dir.to_path_buf());
        } else {
            self.explicit.remove(dir);
        }
    }

    /// Post-order pass over the selectable part of `dir`: applies `mode` to
    /// files and re-marks every directory (including `dir`) from the counts
    /// of its descendant files.
    fn rebuild_subtree(&mut self, dir: &Path, mode: FileMode) {
        // (selectable files, selected files) per directory
        let mut counts: HashMap<PathBuf, (usize, usize)> = HashMap::new();
        let entries: Vec<Entry> = self
            .walker
            .walk_selectable(dir, Order::ContentsFirst)
            .collect();

        for entry in entries {
            let (selectable, selected) = if entry.is_dir {
                let (selectable, selected) = counts.remove(&entry.path).unwrap_or((0, 0));
                self.mark_dir(&entry.path, selectable > 0 && selected == selectable);
                self.selectable_dirs
                    .get_mut()
                    .insert(entry.path.clone(), selectable > 0);
                (selectable, selected)
            } else {
                self.apply(&entry.path, mode);
                (1, usize::from(self.explicit.contains(&entry.path)))
            };
            let parent = entry.path.parent().map(Path::to_path_buf).unwrap_or_default();
            let slot = counts.entry(parent).or_insert((0, 0));
            slot.0 += selectable;
            slot.1 += selected;
        }

        if !dir.as_os_str().is_empty() {
            let (selectable, selected) = counts.remove(dir).unwrap_or((0, 0));
            self.mark_dir(dir, selectable > 0 && selected == selectable);
            self.selectable_dirs
                .get_mut()
                .insert(dir.to_path_buf(), selectable > 0);
        }
    }

    /// `(any selectable content, all of it selected)` for the direct
    /// children of `dir`. Child directories without selectable files are
    /// ignored. Unchecked child directories are searched last and only until
    /// one of them turns out to hold a file.
    fn children_fill(&self, dir: &Path) -> (bool, bool) {
        let mut any = false;
        let mut unchecked_dirs = Vec::new();
        for child in self.walker.selectable_children(dir) {
            if self.explicit.contains(&child.path) {
                any = true;
            } else if child.is_dir {
                unchecked_dirs.push(child.path);
            } else {
                return (true, false);
            }
        }
        if unchecked_dirs.iter().any(|d| self.has_selectable_files(d)) {
            return (true, false);
        }
        (any, true)
    }

    /// Re-derives every ancestor of `rel` below the root, bottom-up, from its
    /// direct children.
    fn update_ancestors(&mut self, rel: &Path) {
        let ancestors: Vec<PathBuf> = rel
            .ancestors()
            .skip(1)
            .take_while(|a| !a.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect();
        for ancestor in ancestors {
            if self.classifier().is_excluded(&ancestor, true) {
                continue;
            }
            let (any, all) = self.children_fill(&ancestor);
            self.mark_dir(&ancestor, any && all);
        }
    }

    /// Restored state may come from a lazy writer that only recorded a
    /// directory, or from an older tree: drop what is gone, materialize
    /// checked directories, then re-derive all directory marks.
    fn normalize_restored(&mut self) {
        let before = self.explicit.clone();
        // Excluded directories never hold a key; files checked inside them do.
        let walker = &self.walker;
        self.explicit.retain(|p| {
            walker.exists(p) && !(walker.is_dir(p) && walker.classifier().is_excluded(p, true))
        });
        self.materialize_checked_dirs(Path::new(""));
        self.rebuild_subtree(Path::new(""), FileMode::Keep);

        if self.explicit != before {
            log::debug!("Restored selection changed during normalization");
            self.persist();
        }
    }

    /// Checks every selectable file under each checked directory at or
    /// below `under`, so that files created since the directory was checked
    /// are materialized too.
    fn materialize_checked_dirs(&mut self, under: &Path) {
        let mut checked_dirs: Vec<PathBuf> = Vec::new();
        for p in &self.explicit {
            if !p.starts_with(under)
                || checked_dirs.last().is_some_and(|outer| p.starts_with(outer))
            {
                continue;
            }
            if self.walker.is_dir(p) && !self.classifier().is_excluded(p, true) {
                checked_dirs.push(p.clone());
            }
        }
        for dir in checked_dirs {
            self.rebuild_subtree(&dir, FileMode::Check);
        }
    }

    fn persist(&mut self) {
        let keys: Vec<String> = self.explicit.iter().map(|p| path_key(p)).collect();
        if let Err(err) = self.state.put(&self.workspace, CHECKED_ITEMS_KEY, keys) {
            log::warn!("Could not save selection: {}", err);
        }
    }
}

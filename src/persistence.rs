//! Workspace-scoped key-value storage for the explicit selection set.

use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Key under which the explicit set is stored.
pub const CHECKED_ITEMS_KEY: &str = "checkedItems";

/// Opaque string-list storage, partitioned by workspace identity.
pub trait StateStore {
    /// `Ok(None)` means nothing was ever stored for this workspace/key.
    fn get(&self, workspace: &str, key: &str) -> Result<Option<Vec<String>>>;
    fn put(&mut self, workspace: &str, key: &str, value: Vec<String>) -> Result<()>;
}

/// Volatile store, used for `--no-persist` and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    entries: HashMap<(String, String), Vec<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, workspace: &str, key: &str) -> Result<Option<Vec<String>>> {
        Ok(self
            .entries
            .get(&(workspace.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&mut self, workspace: &str, key: &str, value: Vec<String>) -> Result<()> {
        self.entries
            .insert((workspace.to_string(), key.to_string()), value);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct StateFile {
    workspaces: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

/// JSON file holding the state of every workspace:
/// `{ "<workspace>": { "checkedItems": [..] } }`.
///
/// Writes go through a temporary file in the same directory and an atomic
/// rename, so a crash never leaves a truncated state file behind.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StateFile> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(StateFile::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StateFile::default()),
            Err(err) => Err(ContextError::Persistence(format!(
                "Could not read {}: {}",
                self.path.display(),
                err
            ))),
        }
    }

    fn save(&self, state: &StateFile) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

impl StateStore for JsonFileStateStore {
    fn get(&self, workspace: &str, key: &str) -> Result<Option<Vec<String>>> {
        let state = self.load()?;
        Ok(state
            .workspaces
            .get(workspace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn put(&mut self, workspace: &str, key: &str, value: Vec<String>) -> Result<()> {
        // A corrupt file is replaced rather than blocking every future write.
        let mut state = self.load().unwrap_or_else(|err| {
            log::warn!("Discarding unreadable state file: {}", err);
            StateFile::default()
        });
        state
            .workspaces
            .entry(workspace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.save(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_is_scoped_by_workspace() {
        let mut store = MemoryStateStore::new();
        store.put("/a", CHECKED_ITEMS_KEY, vec!["x".into()]).unwrap();
        assert_eq!(store.get("/a", CHECKED_ITEMS_KEY).unwrap(), Some(vec!["x".to_string()]));
        assert_eq!(store.get("/b", CHECKED_ITEMS_KEY).unwrap(), None);
    }

    #[test]
    fn json_store_survives_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = JsonFileStateStore::new(&path);
        assert_eq!(store.get("/ws", CHECKED_ITEMS_KEY).unwrap(), None);
        store
            .put("/ws", CHECKED_ITEMS_KEY, vec!["src".into(), "src/a.ts".into()])
            .unwrap();
        store.put("/other", CHECKED_ITEMS_KEY, Vec::new()).unwrap();

        let reopened = JsonFileStateStore::new(&path);
        assert_eq!(
            reopened.get("/ws", CHECKED_ITEMS_KEY).unwrap(),
            Some(vec!["src".to_string(), "src/a.ts".to_string()])
        );
        assert_eq!(reopened.get("/other", CHECKED_ITEMS_KEY).unwrap(), Some(Vec::new()));

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["/ws"]["checkedItems"][1], "src/a.ts");
    }

    #[test]
    fn corrupt_state_is_reported_and_then_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = JsonFileStateStore::new(&path);
        assert!(store.get("/ws", CHECKED_ITEMS_KEY).is_err());
        store.put("/ws", CHECKED_ITEMS_KEY, vec!["a".into()]).unwrap();
        assert_eq!(store.get("/ws", CHECKED_ITEMS_KEY).unwrap(), Some(vec!["a".to_string()]));
    }
}

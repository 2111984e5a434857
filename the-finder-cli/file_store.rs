use std::{
  collections::BTreeMap,
  fs,
  path::{
    Path,
    PathBuf,
  },
};

use anyhow::{
  Context,
  Result,
};
use the_finder::persist::KeyValueStore;

/// Key-value slots kept in a single JSON object on disk. Every write
/// rewrites the whole file.
#[derive(Debug)]
pub struct FileKeyValueStore {
  path:  PathBuf,
  slots: BTreeMap<String, String>,
}

impl FileKeyValueStore {
  pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let slots = match fs::read_to_string(&path) {
      Ok(raw) => {
        serde_json::from_str(&raw).unwrap_or_else(|err| {
          log::warn!("discarding unreadable state file {}: {err}", path.display());
          BTreeMap::new()
        })
      },
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(err) => {
        return Err(err).with_context(|| format!("failed to read {}", path.display()));
      },
    };
    Ok(Self { path, slots })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn flush(&self) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&self.slots)?;
    fs::write(&self.path, json).with_context(|| format!("failed to write {}", self.path.display()))
  }

  fn flush_or_warn(&self) {
    if let Err(err) = self.flush() {
      log::warn!("{err:#}");
    }
  }
}

impl KeyValueStore for FileKeyValueStore {
  fn get(&self, key: &str) -> Option<String> {
    self.slots.get(key).cloned()
  }

  fn set(&mut self, key: &str, value: String) {
    self.slots.insert(key.to_string(), value);
    self.flush_or_warn();
  }

  fn remove(&mut self, key: &str) {
    if self.slots.remove(key).is_some() {
      self.flush_or_warn();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn slots_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let mut store = FileKeyValueStore::open(&path).unwrap();
    store.set("finder.tabs.v1", r#"{"tabs":[1],"active":0}"#.to_string());
    store.set("gone", "x".to_string());
    store.remove("gone");

    let reopened = FileKeyValueStore::open(&path).unwrap();
    assert_eq!(
      reopened.get("finder.tabs.v1").as_deref(),
      Some(r#"{"tabs":[1],"active":0}"#)
    );
    assert_eq!(reopened.get("gone"), None);
  }

  #[test]
  fn corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "{ nope").unwrap();
    let store = FileKeyValueStore::open(&path).unwrap();
    assert_eq!(store.get("anything"), None);
  }
}

//! Session persistence: the visible path and focus memory of each tab.
//!
//! Only primitive data is stored. Listings are always fetched again on
//! restore, so a persisted path may be stale: folders that no longer resolve
//! cut the replay short instead of failing it.

use std::collections::{
  BTreeMap,
  HashMap,
};

use serde::{
  Deserialize,
  Serialize,
  de::DeserializeOwned,
};
use thiserror::Error;

use crate::{
  focus::{
    FocusMemory,
    clamp_index,
  },
  item::{
    FolderId,
    position_of_folder,
  },
  navigation::{
    NavigationError,
    resolve_path,
  },
  store::{
    FetchError,
    FolderStore,
  },
  tab::TabState,
  tabs::TabId,
};

/// Bumped whenever the persisted shape changes. Slots written under an older
/// version are never read again.
pub const SCHEMA_VERSION: u32 = 1;

/// Persistent string slots.
pub trait KeyValueStore {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&mut self, key: &str, value: String);
  fn remove(&mut self, key: &str);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
  slots: HashMap<String, String>,
}

impl MemoryKeyValueStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }
}

impl KeyValueStore for MemoryKeyValueStore {
  fn get(&self, key: &str) -> Option<String> {
    self.slots.get(key).cloned()
  }

  fn set(&mut self, key: &str, value: String) {
    self.slots.insert(key.to_string(), value);
  }

  fn remove(&mut self, key: &str) {
    self.slots.remove(key);
  }
}

/// Persisted form of one tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPath {
  /// Folder ids from the root's child down to the active column.
  pub path:  Vec<String>,
  pub focus: BTreeMap<String, usize>,
}

impl PersistedPath {
  /// Snapshot of an initialized tab; `None` for a tab with nothing loaded.
  pub fn capture(tab: &TabState) -> Option<Self> {
    tab.depth()?;
    Some(Self {
      path:  tab
        .path()
        .iter()
        .map(|id| id.as_str().to_string())
        .collect(),
      focus: tab.focus_memory().entries().clone(),
    })
  }
}

/// Persisted set of open tabs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTabs {
  pub tabs:   Vec<u64>,
  pub active: usize,
}

/// Versioned slot names under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKeys {
  prefix: String,
}

impl SlotKeys {
  pub fn new(prefix: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
    }
  }

  pub fn tab(&self, id: TabId) -> String {
    format!("{}.tab.{}.v{SCHEMA_VERSION}", self.prefix, id.get())
  }

  pub fn tabs(&self) -> String {
    format!("{}.tabs.v{SCHEMA_VERSION}", self.prefix)
  }
}

pub fn save<T: Serialize>(kv: &mut dyn KeyValueStore, key: &str, value: &T) {
  match serde_json::to_string(value) {
    Ok(json) => kv.set(key, json),
    Err(err) => tracing::warn!(key, %err, "failed to serialize persisted state"),
  }
}

/// Reads a slot. Missing slots and unreadable data both yield `None`.
pub fn load<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> Option<T> {
  let raw = kv.get(key)?;
  match serde_json::from_str(&raw) {
    Ok(value) => Some(value),
    Err(err) => {
      tracing::warn!(key, %err, "ignoring unreadable persisted state");
      None
    },
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
  #[error(transparent)]
  Navigation(#[from] NavigationError),
  #[error("root listing failed: {0}")]
  Root(FetchError),
}

/// What a restore managed to bring back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
  pub requested: usize,
  pub restored:  usize,
  /// Why the replay stopped early, if it did.
  pub truncated: Option<FetchError>,
}

/// Replays `persisted` into a tab, level by level.
///
/// Each restored column takes its focus from the persisted focus map,
/// clamped to what the store returns now. Folders are matched by id, so a
/// reordered ancestor listing still resolves the path. The tab is only touched once the
/// replay is done; if even the root cannot be listed it is left as it was.
pub async fn restore_tab<S>(
  tab: &mut TabState,
  store: &S,
  persisted: PersistedPath,
  root_title: &str,
) -> Result<RestoreReport, RestoreError>
where
  S: FolderStore + ?Sized,
{
  tab.ensure_idle()?;
  let serial = tab.raise_guard();

  let mut memory = FocusMemory::from_entries(persisted.focus);
  let path: Vec<FolderId> = persisted.path.into_iter().map(FolderId::from).collect();
  // Levels without a remembered row focus the next folder of the path.
  let resolved = resolve_path(store, root_title, &path, |level, folder, items| {
    match memory.get(folder) {
      Some(index) => clamp_index(index, items.len()),
      None => {
        path
          .get(level)
          .and_then(|next| position_of_folder(items, next))
          .unwrap_or(0)
      },
    }
  })
  .await;
  tab.lower_guard(serial)?;
  for column in &resolved.columns {
    if memory.get(column.folder_id()).is_none() {
      memory.remember(column.folder_id(), column.focused_index());
    }
  }

  if resolved.columns.is_empty() {
    let err = resolved
      .error
      .unwrap_or_else(|| FetchError::Other("empty replay".into()));
    tracing::warn!(%err, "restore failed at the root");
    return Err(RestoreError::Root(err));
  }
  if let Some(err) = &resolved.error {
    tracing::warn!(
      %err,
      requested = path.len(),
      restored = resolved.columns.len() - 1,
      "persisted path truncated"
    );
  }

  let restored = resolved.columns.len() - 1;
  tab.focus_memory = memory;
  tab.columns = resolved.columns;
  tab.depth = Some(restored);
  tab.check_invariants();

  Ok(RestoreReport {
    requested: path.len(),
    restored,
    truncated: resolved.error,
  })
}

#[cfg(test)]
mod tests {
  use futures_executor::block_on;

  use super::*;
  use crate::{
    item::ListItem,
    store::MemoryFolderStore,
  };

  fn notes(prefix: &str, count: usize) -> Vec<ListItem> {
    (0..count)
      .map(|i| ListItem::note(format!("{prefix}-{i}").as_str(), format!("{prefix} {i}")))
      .collect()
  }

  fn store(f1_items: usize) -> MemoryFolderStore {
    let mut f1 = vec![ListItem::folder("f2", "Second")];
    f1.extend(notes("f1", f1_items.saturating_sub(1)));
    MemoryFolderStore::new()
      .with_listing(None, vec![ListItem::folder("f1", "First")])
      .with_listing(Some("f1"), f1)
      .with_listing(Some("f2"), notes("f2", 1))
  }

  fn persisted() -> PersistedPath {
    PersistedPath {
      path:  vec!["f1".into(), "f2".into()],
      focus: BTreeMap::from([("f1".to_string(), 2), ("f2".to_string(), 0)]),
    }
  }

  #[test]
  fn keys_carry_schema_version() {
    let keys = SlotKeys::new("finder");
    assert_eq!(keys.tab(TabId::new(3)), format!("finder.tab.3.v{SCHEMA_VERSION}"));
    assert_eq!(keys.tabs(), format!("finder.tabs.v{SCHEMA_VERSION}"));
  }

  #[test]
  fn round_trip_restores_focus() {
    let mut kv = MemoryKeyValueStore::new();
    save(&mut kv, "slot", &persisted());
    let loaded: PersistedPath = load(&kv, "slot").unwrap();
    assert_eq!(loaded, persisted());

    let store = store(5);
    let mut tab = TabState::new();
    let report = block_on(restore_tab(&mut tab, &store, loaded, "Home")).unwrap();

    assert_eq!(report.restored, 2);
    assert_eq!(report.truncated, None);
    assert_eq!(tab.depth(), Some(2));
    assert_eq!(tab.columns()[1].focused_index(), 2);
    assert_eq!(tab.columns()[2].focused_index(), 0);
  }

  #[test]
  fn restored_focus_clamps_to_shrunken_listing() {
    let store = store(1);
    let mut tab = TabState::new();
    block_on(restore_tab(&mut tab, &store, persisted(), "Home")).unwrap();
    assert_eq!(tab.columns()[1].focused_index(), 0);
  }

  #[test]
  fn missing_folder_truncates_replay() {
    let store = store(5);
    store.remove_listing("f2");
    let mut tab = TabState::new();
    let report = block_on(restore_tab(&mut tab, &store, persisted(), "Home")).unwrap();

    assert_eq!(report.restored, 1);
    assert!(matches!(report.truncated, Some(FetchError::NotFound(_))));
    assert_eq!(tab.depth(), Some(1));
    assert_eq!(tab.label(), "First");
  }

  #[test]
  fn reordered_ancestor_listing_still_resolves_path() {
    let store = store(5).with_listing(None, vec![
      ListItem::note("x", "Inserted"),
      ListItem::folder("f1", "First"),
    ]);
    let persisted = PersistedPath {
      path:  vec!["f1".into()],
      focus: BTreeMap::from([("root".to_string(), 0)]),
    };
    let mut tab = TabState::new();
    let report = block_on(restore_tab(&mut tab, &store, persisted, "Home")).unwrap();

    assert_eq!(report.restored, 1);
    assert_eq!(tab.path(), vec![FolderId::from("f1")]);
    assert_eq!(tab.columns()[0].focused_index(), 0);
    assert_eq!(tab.label(), "First");
  }

  #[test]
  fn unremembered_ancestors_focus_the_path() {
    let store = store(5).with_listing(None, vec![
      ListItem::note("x", "Inserted"),
      ListItem::folder("f1", "First"),
    ]);
    let persisted = PersistedPath {
      path:  vec!["f1".into(), "f2".into()],
      focus: BTreeMap::new(),
    };
    let mut tab = TabState::new();
    block_on(restore_tab(&mut tab, &store, persisted, "Home")).unwrap();

    assert_eq!(tab.columns()[0].focused_index(), 1);
    assert_eq!(tab.columns()[1].focused_index(), 0);
    assert_eq!(tab.focus_memory().get(None), Some(1));

    let fetches = store.fetch_count();
    tab.go_shallower().unwrap();
    tab.go_shallower().unwrap();
    block_on(tab.go_deeper(&store, &FolderId::from("f1"))).unwrap();
    assert_eq!(store.fetch_count(), fetches);
  }

  #[test]
  fn unknown_path_segment_truncates_replay() {
    let store = store(5);
    let mut tab = TabState::new();
    let persisted = PersistedPath {
      path:  vec!["ghost".into(), "f2".into()],
      focus: BTreeMap::new(),
    };
    let report = block_on(restore_tab(&mut tab, &store, persisted, "Home")).unwrap();
    assert_eq!(report.restored, 0);
    assert_eq!(tab.depth(), Some(0));
  }

  #[test]
  fn root_failure_leaves_tab_untouched() {
    let store = store(5);
    store.fail(None);
    let mut tab = TabState::new();
    let err = block_on(restore_tab(&mut tab, &store, persisted(), "Home")).unwrap_err();
    assert!(matches!(err, RestoreError::Root(_)));
    assert!(!tab.is_initialized());
    assert!(!tab.is_navigating());
  }

  #[test]
  fn malformed_and_old_slots_are_ignored() {
    let mut kv = MemoryKeyValueStore::new();
    kv.set("finder.tab.1.v1", "{not json".into());
    kv.set("finder.tab.1.v0", r#"{"path": ["f1"], "focus": {}}"#.into());
    assert_eq!(load::<PersistedPath>(&kv, "finder.tab.1.v1"), None);
    assert_eq!(load::<PersistedPath>(&kv, &SlotKeys::new("finder").tab(TabId::new(2))), None);
  }

  #[test]
  fn capture_skips_uninitialized_tabs() {
    assert_eq!(PersistedPath::capture(&TabState::new()), None);
  }
}

use std::{
  fmt,
  time::Duration,
};

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  animation::{
    COLUMN_WIDTH,
    Easing,
    SLIDE_DURATION,
    SlideOutcome,
    TrackAnimator,
  },
  item::FolderId,
  navigation::{
    DepthChange,
    NavigationError,
  },
  preview::{
    PREVIEW_DEBOUNCE,
    PreviewCoordinator,
  },
  store::FolderStore,
  tab::{
    DEFAULT_RETAINED_COLUMNS,
    TabState,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(u64);

impl TabId {
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for TabId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "tab#{}", self.0)
  }
}

/// Parameters every new tab is built with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TabSettings {
  pub column_width:     f32,
  pub slide_duration:   Duration,
  pub easing:           Easing,
  pub reduced_motion:   bool,
  pub retained_columns: usize,
  pub preview_debounce: Duration,
}

impl Default for TabSettings {
  fn default() -> Self {
    Self {
      column_width:     COLUMN_WIDTH,
      slide_duration:   SLIDE_DURATION,
      easing:           Easing::default(),
      reduced_motion:   false,
      retained_columns: DEFAULT_RETAINED_COLUMNS,
      preview_debounce: PREVIEW_DEBOUNCE,
    }
  }
}

/// One browser tab: navigation state plus its own track and preview.
#[derive(Debug)]
pub struct Tab {
  id:      TabId,
  state:   TabState,
  track:   TrackAnimator,
  preview: PreviewCoordinator,
}

impl Tab {
  fn new(id: TabId, settings: &TabSettings) -> Self {
    Self {
      id,
      state: TabState::with_retention(settings.retained_columns),
      track: TrackAnimator::new(settings.column_width, settings.slide_duration, settings.easing)
        .with_reduced_motion(settings.reduced_motion),
      preview: PreviewCoordinator::new(settings.preview_debounce),
    }
  }

  pub fn id(&self) -> TabId {
    self.id
  }

  pub fn state(&self) -> &TabState {
    &self.state
  }

  pub fn state_mut(&mut self) -> &mut TabState {
    &mut self.state
  }

  pub fn track(&self) -> &TrackAnimator {
    &self.track
  }

  pub fn track_mut(&mut self) -> &mut TrackAnimator {
    &mut self.track
  }

  pub fn preview(&self) -> &PreviewCoordinator {
    &self.preview
  }

  /// Disjoint borrows of the three per-tab components.
  pub fn parts_mut(&mut self) -> (&mut TabState, &mut TrackAnimator, &mut PreviewCoordinator) {
    (&mut self.state, &mut self.track, &mut self.preview)
  }

  pub fn label(&self) -> &str {
    self.state.label()
  }

  /// Moves the track to follow a settled depth change.
  pub fn follow(&mut self, change: DepthChange) -> SlideOutcome {
    self.track.request_slide(change.from, change.to)
  }
}

/// Ordered set of tabs with one active tab. Never empty.
#[derive(Debug)]
pub struct TabManager {
  tabs:     Vec<Tab>,
  active:   usize,
  next_id:  u64,
  settings: TabSettings,
}

impl Default for TabManager {
  fn default() -> Self {
    Self::new(TabSettings::default())
  }
}

impl TabManager {
  pub fn new(settings: TabSettings) -> Self {
    let mut manager = Self {
      tabs: Vec::new(),
      active: 0,
      next_id: 1,
      settings,
    };
    manager.open();
    manager
  }

  pub fn settings(&self) -> &TabSettings {
    &self.settings
  }

  pub fn len(&self) -> usize {
    self.tabs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tabs.is_empty()
  }

  pub fn active_index(&self) -> usize {
    self.active
  }

  pub fn active(&self) -> &Tab {
    &self.tabs[self.active]
  }

  pub fn active_mut(&mut self) -> &mut Tab {
    &mut self.tabs[self.active]
  }

  pub fn active_id(&self) -> TabId {
    self.active().id
  }

  pub fn tabs(&self) -> &[Tab] {
    &self.tabs
  }

  pub fn tabs_mut(&mut self) -> &mut [Tab] {
    &mut self.tabs
  }

  pub fn position(&self, id: TabId) -> Option<usize> {
    self.tabs.iter().position(|tab| tab.id == id)
  }

  pub fn get(&self, id: TabId) -> Option<&Tab> {
    self.tabs.iter().find(|tab| tab.id == id)
  }

  pub fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
    self.tabs.iter_mut().find(|tab| tab.id == id)
  }

  pub fn ids(&self) -> Vec<TabId> {
    self.tabs.iter().map(Tab::id).collect()
  }

  pub fn labels(&self) -> Vec<(TabId, &str)> {
    self.tabs.iter().map(|tab| (tab.id, tab.label())).collect()
  }

  fn allocate_id(&mut self) -> TabId {
    let id = TabId(self.next_id);
    self.next_id += 1;
    id
  }

  /// Appends an uninitialized tab and activates it.
  pub fn open(&mut self) -> TabId {
    let id = self.allocate_id();
    self.tabs.push(Tab::new(id, &self.settings));
    self.active = self.tabs.len() - 1;
    tracing::debug!(%id, "tab opened");
    id
  }

  /// Replaces every tab with fresh ones carrying `ids`, used when rebuilding
  /// a persisted tab set. Duplicate ids are skipped.
  pub fn rebuild(&mut self, ids: &[TabId], active: usize) {
    self.tabs.clear();
    for &id in ids {
      if self.position(id).is_none() {
        self.tabs.push(Tab::new(id, &self.settings));
      }
    }
    self.next_id = self
      .tabs
      .iter()
      .map(|tab| tab.id.0 + 1)
      .max()
      .unwrap_or(1)
      .max(self.next_id);
    if self.tabs.is_empty() {
      self.open();
      return;
    }
    self.active = active.min(self.tabs.len() - 1);
  }

  /// Removes tab `id`. Closing the active tab activates its left neighbour,
  /// or the right one when it was leftmost; closing the last tab leaves a
  /// single fresh tab behind.
  pub fn close(&mut self, id: TabId) -> Option<Tab> {
    let index = self.position(id)?;
    let closed = self.tabs.remove(index);

    if self.tabs.is_empty() {
      self.active = 0;
      self.open();
    } else if index < self.active || (index == self.active && index > 0) {
      self.active -= 1;
    }
    tracing::debug!(%id, active = %self.active_id(), "tab closed");
    Some(closed)
  }

  pub fn close_active(&mut self) -> Option<Tab> {
    self.close(self.active_id())
  }

  pub fn switch_to(&mut self, id: TabId) -> bool {
    match self.position(id) {
      Some(index) => self.switch_to_index(index),
      None => false,
    }
  }

  pub fn switch_to_index(&mut self, index: usize) -> bool {
    if index >= self.tabs.len() || index == self.active {
      return false;
    }
    self.active = index;
    true
  }

  pub fn next_tab(&mut self) -> bool {
    let len = self.tabs.len();
    if len <= 1 {
      return false;
    }
    self.switch_to_index((self.active + 1) % len)
  }

  pub fn prev_tab(&mut self) -> bool {
    let len = self.tabs.len();
    if len <= 1 {
      return false;
    }
    self.switch_to_index((self.active + len - 1) % len)
  }

  /// Reorders tab `from` to position `to`; the active tab stays active.
  pub fn move_tab(&mut self, from: usize, to: usize) -> bool {
    let len = self.tabs.len();
    if from >= len || to >= len || from == to {
      return false;
    }
    let active_id = self.active_id();
    let tab = self.tabs.remove(from);
    self.tabs.insert(to, tab);
    self.active = self.position(active_id).unwrap_or(0);
    true
  }

  /// Opens a tab already positioned at `path`, focusing `leaf_index` in the
  /// last column. The track snaps straight to the final depth. If the path
  /// cannot be resolved the new tab is discarded and the previously active
  /// tab stays active.
  pub async fn open_from_jump<S>(
    &mut self,
    store: &S,
    path: Vec<FolderId>,
    leaf_index: usize,
    root_title: &str,
  ) -> Result<TabId, NavigationError>
  where
    S: FolderStore + ?Sized,
  {
    let previous = self.active;
    let id = self.open();
    let tab = self.active_mut();
    match tab.state.jump_to_selection(store, path, leaf_index, root_title).await {
      Ok(change) => {
        tab.track.snap_to(change.to);
        Ok(id)
      },
      Err(err) => {
        self.tabs.pop();
        self.active = previous;
        Err(err)
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use futures_executor::block_on;

  use super::*;
  use crate::{
    item::ListItem,
    store::MemoryFolderStore,
  };

  fn store() -> MemoryFolderStore {
    MemoryFolderStore::new()
      .with_listing(None, vec![ListItem::folder("a", "Alpha")])
      .with_listing(Some("a"), vec![
        ListItem::note("a-1", "One"),
        ListItem::note("a-2", "Two"),
      ])
  }

  fn manager_with(count: usize) -> TabManager {
    let mut manager = TabManager::default();
    for _ in 1..count {
      manager.open();
    }
    manager
  }

  #[test]
  fn starts_with_one_fresh_tab() {
    let manager = TabManager::default();
    assert_eq!(manager.len(), 1);
    assert!(!manager.active().state().is_initialized());
    assert_eq!(manager.active().label(), "New tab");
  }

  #[test]
  fn closing_active_prefers_left_neighbour() {
    let mut manager = manager_with(3);
    let ids = manager.ids();
    manager.switch_to(ids[1]);
    manager.close(ids[1]);
    assert_eq!(manager.active_id(), ids[0]);

    manager.switch_to(ids[0]);
    manager.close(ids[0]);
    assert_eq!(manager.active_id(), ids[2]);
  }

  #[test]
  fn closing_inactive_tab_keeps_active() {
    let mut manager = manager_with(3);
    let ids = manager.ids();
    manager.switch_to(ids[2]);
    manager.close(ids[0]);
    assert_eq!(manager.active_id(), ids[2]);
    assert_eq!(manager.active_index(), 1);
  }

  #[test]
  fn closing_only_tab_leaves_fresh_tab() {
    let mut manager = TabManager::default();
    let only = manager.active_id();
    manager.close_active();
    assert_eq!(manager.len(), 1);
    assert_ne!(manager.active_id(), only);
    assert_eq!(manager.active().state().depth_index(), -1);
  }

  #[test]
  fn close_active_follows_neighbour_rule() {
    let mut manager = manager_with(3);
    let ids = manager.ids();
    manager.switch_to(ids[1]);
    assert_eq!(manager.close_active().map(|tab| tab.id()), Some(ids[1]));
    assert_eq!(manager.active_id(), ids[0]);
    manager.close_active();
    assert_eq!(manager.active_id(), ids[2]);
  }

  #[test]
  fn next_and_prev_wrap() {
    let mut manager = manager_with(3);
    let ids = manager.ids();
    assert!(manager.next_tab());
    assert_eq!(manager.active_id(), ids[0]);
    assert!(manager.prev_tab());
    assert_eq!(manager.active_id(), ids[2]);
    assert!(!TabManager::default().next_tab());
  }

  #[test]
  fn move_tab_keeps_active_tab() {
    let mut manager = manager_with(3);
    let ids = manager.ids();
    manager.switch_to(ids[0]);
    assert!(manager.move_tab(0, 2));
    assert_eq!(manager.ids(), vec![ids[1], ids[2], ids[0]]);
    assert_eq!(manager.active_index(), 2);
  }

  #[test]
  fn rebuild_keeps_ids_unique() {
    let mut manager = TabManager::default();
    manager.rebuild(&[TabId::new(4), TabId::new(9), TabId::new(4)], 5);
    assert_eq!(manager.ids(), vec![TabId::new(4), TabId::new(9)]);
    assert_eq!(manager.active_index(), 1);
    assert_eq!(manager.open(), TabId::new(10));
  }

  #[test]
  fn open_from_jump_snaps_to_leaf() {
    let store = store();
    let mut manager = TabManager::default();
    let id = block_on(manager.open_from_jump(&store, vec![FolderId::from("a")], 1, "Home")).unwrap();

    let tab = manager.active();
    assert_eq!(tab.id(), id);
    assert_eq!(manager.len(), 2);
    assert_eq!(tab.state().depth(), Some(1));
    assert_eq!(tab.state().active_column().unwrap().focused_index(), 1);
    assert!(!tab.track().is_sliding());
    assert_eq!(tab.track().rendered_track_x(), -COLUMN_WIDTH);
    assert_eq!(tab.label(), "Alpha");
  }

  #[test]
  fn failed_jump_discards_new_tab() {
    let store = store();
    let mut manager = TabManager::default();
    let before = manager.active_id();
    let result = block_on(manager.open_from_jump(&store, vec![FolderId::from("zzz")], 0, "Home"));
    assert!(result.is_err());
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.active_id(), before);
  }
}

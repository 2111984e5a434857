use std::sync::Arc;

use crate::{
  column::ColumnEntry,
  focus::FocusMemory,
  item::{
    FolderId,
    ListItem,
  },
  store::PreviewData,
};

/// Label shown for a tab that has not loaded anything yet.
pub const NEW_TAB_LABEL: &str = "New tab";

/// Default number of columns kept past the active depth.
pub const DEFAULT_RETAINED_COLUMNS: usize = 8;

/// Navigation state of a single tab.
///
/// `depth == None` is the uninitialized state of a freshly opened tab. Once
/// a root listing is installed, `depth < columns.len()` always holds and
/// `columns[..=depth]` is the visible slice; columns past `depth` are retained
/// for forward re-entry.
#[derive(Debug, Clone)]
pub struct TabState {
  pub(crate) columns:       Vec<ColumnEntry>,
  pub(crate) depth:         Option<usize>,
  pub(crate) focus_memory:  FocusMemory,
  pub(crate) preview_items: Option<Arc<[ListItem]>>,
  pub(crate) preview:       Option<PreviewData>,
  pub(crate) is_navigating: bool,
  pub(crate) nav_serial:    u64,
  pub(crate) retain_limit:  usize,
}

impl Default for TabState {
  fn default() -> Self {
    Self::with_retention(DEFAULT_RETAINED_COLUMNS)
  }
}

impl TabState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Empty tab keeping at most `retain_limit` columns past the active depth.
  pub fn with_retention(retain_limit: usize) -> Self {
    Self {
      columns: Vec::new(),
      depth: None,
      focus_memory: FocusMemory::new(),
      preview_items: None,
      preview: None,
      is_navigating: false,
      nav_serial: 0,
      retain_limit,
    }
  }

  pub fn retain_limit(&self) -> usize {
    self.retain_limit
  }

  pub fn columns(&self) -> &[ColumnEntry] {
    &self.columns
  }

  pub fn depth(&self) -> Option<usize> {
    self.depth
  }

  /// Depth with the uninitialized state encoded as `-1`.
  pub fn depth_index(&self) -> isize {
    self.depth.map_or(-1, |depth| depth as isize)
  }

  pub fn is_initialized(&self) -> bool {
    self.depth.is_some()
  }

  pub fn is_navigating(&self) -> bool {
    self.is_navigating
  }

  pub fn focus_memory(&self) -> &FocusMemory {
    &self.focus_memory
  }

  pub fn preview_items(&self) -> Option<&Arc<[ListItem]>> {
    self.preview_items.as_ref()
  }

  pub fn preview(&self) -> Option<&PreviewData> {
    self.preview.as_ref()
  }

  /// Columns currently on screen, root first.
  pub fn visible_columns(&self) -> &[ColumnEntry] {
    match self.depth {
      Some(depth) => &self.columns[..=depth],
      None => &[],
    }
  }

  pub fn active_column(&self) -> Option<&ColumnEntry> {
    self.depth.and_then(|depth| self.columns.get(depth))
  }

  pub(crate) fn active_column_mut(&mut self) -> Option<&mut ColumnEntry> {
    self.depth.and_then(|depth| self.columns.get_mut(depth))
  }

  pub fn focused_item(&self) -> Option<&ListItem> {
    self.active_column().and_then(ColumnEntry::focused_item)
  }

  /// Folder ids from the root's first child down to the active column.
  pub fn path(&self) -> Vec<FolderId> {
    self
      .visible_columns()
      .iter()
      .filter_map(|column| column.folder_id().cloned())
      .collect()
  }

  /// Derived display label; never stored.
  pub fn label(&self) -> &str {
    if let Some(column) = self.active_column() {
      return column.title();
    }
    self
      .columns
      .iter()
      .rev()
      .find(|column| !column.title().is_empty())
      .map_or(NEW_TAB_LABEL, ColumnEntry::title)
  }

  /// Drops everything, returning to the uninitialized state.
  pub fn reset(&mut self) {
    *self = Self::with_retention(self.retain_limit);
  }

  #[cfg(debug_assertions)]
  pub(crate) fn check_invariants(&self) {
    match self.depth {
      Some(depth) => debug_assert!(depth < self.columns.len(), "depth past column stack"),
      None => debug_assert!(self.columns.is_empty(), "uninitialized tab with columns"),
    }
    for column in &self.columns {
      debug_assert!(column.is_empty() || column.focused_index() < column.len());
    }
  }

  #[cfg(not(debug_assertions))]
  pub(crate) fn check_invariants(&self) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_tab_is_uninitialized() {
    let tab = TabState::new();
    assert_eq!(tab.depth_index(), -1);
    assert_eq!(tab.label(), NEW_TAB_LABEL);
    assert!(tab.visible_columns().is_empty());
    assert!(tab.path().is_empty());
  }

  #[test]
  fn label_follows_active_column() {
    let mut tab = TabState::new();
    tab.columns = vec![
      ColumnEntry::new(None, vec![ListItem::folder("1", "Docs")], 0, "Home"),
      ColumnEntry::new(Some(FolderId::from("1")), Vec::new(), 0, "Docs"),
    ];
    tab.depth = Some(0);
    assert_eq!(tab.label(), "Home");
    tab.depth = Some(1);
    assert_eq!(tab.label(), "Docs");
    assert_eq!(tab.path(), vec![FolderId::from("1")]);
  }
}

use std::sync::Arc;

use crate::{
  focus::clamp_index,
  item::{
    FolderId,
    ListItem,
  },
};

/// One level of the displayed path: a folder and its children.
///
/// `items` is shared so that a column retained past the active depth can be
/// re-entered without copying or re-fetching its listing.
#[derive(Debug, Clone)]
pub struct ColumnEntry {
  folder_id:     Option<FolderId>,
  items:         Arc<[ListItem]>,
  focused_index: usize,
  title:         String,
}

impl ColumnEntry {
  pub fn new(
    folder_id: Option<FolderId>,
    items: impl Into<Arc<[ListItem]>>,
    focused_index: usize,
    title: impl Into<String>,
  ) -> Self {
    let items = items.into();
    Self {
      focused_index: clamp_index(focused_index, items.len()),
      folder_id,
      items,
      title: title.into(),
    }
  }

  pub fn folder_id(&self) -> Option<&FolderId> {
    self.folder_id.as_ref()
  }

  pub fn items(&self) -> &Arc<[ListItem]> {
    &self.items
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn focused_index(&self) -> usize {
    self.focused_index
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn focused_item(&self) -> Option<&ListItem> {
    self.items.get(self.focused_index)
  }

  /// Sets focus, clamped to the listing. Returns the index actually stored.
  pub(crate) fn set_focus(&mut self, index: usize) -> usize {
    self.focused_index = clamp_index(index, self.items.len());
    self.focused_index
  }

  /// Swaps in a fresh listing and re-clamps focus.
  pub(crate) fn replace_items(&mut self, items: impl Into<Arc<[ListItem]>>) {
    self.items = items.into();
    self.focused_index = clamp_index(self.focused_index, self.items.len());
  }

  pub(crate) fn contains_folder(&self, id: &FolderId) -> bool {
    self.items.iter().any(|item| item.folder_id() == Some(id))
  }

  pub(crate) fn shares_items(&self, other: &ColumnEntry) -> bool {
    Arc::ptr_eq(&self.items, &other.items)
  }
}

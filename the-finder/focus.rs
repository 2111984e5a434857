//! Per-folder focus memory.

use std::collections::BTreeMap;

use crate::item::FolderId;

/// Key used for the root folder in focus memory and persisted state.
pub const ROOT_KEY: &str = "root";

/// Persisted/stored form of a folder id: the id itself, or [`ROOT_KEY`].
pub fn folder_key(folder: Option<&FolderId>) -> String {
  folder.map_or_else(|| ROOT_KEY.to_string(), |id| id.as_str().to_string())
}

/// Clamps `index` into `[0, len - 1]`; empty lists always yield 0.
pub fn clamp_index(index: usize, len: usize) -> usize {
  index.min(len.saturating_sub(1))
}

/// Last focused index per folder. Entries are created lazily and never
/// removed for the lifetime of a tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusMemory {
  entries: BTreeMap<String, usize>,
}

impl FocusMemory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_entries(entries: BTreeMap<String, usize>) -> Self {
    Self { entries }
  }

  pub fn remember(&mut self, folder: Option<&FolderId>, index: usize) {
    self.entries.insert(folder_key(folder), index);
  }

  pub fn get(&self, folder: Option<&FolderId>) -> Option<usize> {
    self.entries.get(&folder_key(folder)).copied()
  }

  /// Remembered index for `folder` clamped to a list of `len` items.
  pub fn restore(&self, folder: Option<&FolderId>, len: usize) -> usize {
    clamp_index(self.get(folder).unwrap_or(0), len)
  }

  pub fn entries(&self) -> &BTreeMap<String, usize> {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn root_uses_literal_key() {
    let mut memory = FocusMemory::new();
    memory.remember(None, 3);
    assert_eq!(memory.entries().get(ROOT_KEY), Some(&3));
  }

  #[test]
  fn restore_clamps_to_current_length() {
    let mut memory = FocusMemory::new();
    let folder = FolderId::from("f1");
    memory.remember(Some(&folder), 4);

    assert_eq!(memory.restore(Some(&folder), 10), 4);
    assert_eq!(memory.restore(Some(&folder), 2), 1);
    assert_eq!(memory.restore(Some(&folder), 0), 0);
    assert_eq!(memory.restore(None, 5), 0);
  }
}

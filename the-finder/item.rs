//! Read-only item snapshots as delivered by the folder store.

use std::{
  borrow::Borrow,
  fmt,
  sync::Arc,
};

use serde::{
  Deserialize,
  Serialize,
};

/// Identifier of a folder. The root folder has no id and is modelled as
/// `Option<FolderId>::None` throughout the crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(Arc<str>);

impl FolderId {
  pub fn new(id: impl Into<Arc<str>>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for FolderId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl Borrow<str> for FolderId {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl From<&str> for FolderId {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<String> for FolderId {
  fn from(value: String) -> Self {
    Self::new(value)
  }
}

/// Identifier of a leaf item (note).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Arc<str>);

impl ItemId {
  pub fn new(id: impl Into<Arc<str>>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ItemId {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<&FolderId> for ItemId {
  fn from(value: &FolderId) -> Self {
    Self(value.0.clone())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
  #[default]
  Markdown,
  Pandoc,
  Plain,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ListItem {
  Folder {
    id:    FolderId,
    title: String,
  },
  Note {
    id:            ItemId,
    title:         String,
    #[serde(default)]
    syntax:        Syntax,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at:    Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at:    Option<String>,
  },
}

impl ListItem {
  pub fn folder(id: impl Into<FolderId>, title: impl Into<String>) -> Self {
    Self::Folder {
      id:    id.into(),
      title: title.into(),
    }
  }

  pub fn note(id: impl Into<ItemId>, title: impl Into<String>) -> Self {
    Self::Note {
      id:            id.into(),
      title:         title.into(),
      syntax:        Syntax::default(),
      abstract_text: None,
      created_at:    None,
      updated_at:    None,
    }
  }

  pub fn title(&self) -> &str {
    match self {
      Self::Folder { title, .. } | Self::Note { title, .. } => title,
    }
  }

  pub fn id_str(&self) -> &str {
    match self {
      Self::Folder { id, .. } => id.as_str(),
      Self::Note { id, .. } => id.as_str(),
    }
  }

  pub fn folder_id(&self) -> Option<&FolderId> {
    match self {
      Self::Folder { id, .. } => Some(id),
      Self::Note { .. } => None,
    }
  }

  pub fn is_folder(&self) -> bool {
    matches!(self, Self::Folder { .. })
  }
}

/// Position of the folder with `id` inside `items`, if it is listed there.
pub fn position_of_folder(items: &[ListItem], id: &FolderId) -> Option<usize> {
  items.iter().position(|item| item.folder_id() == Some(id))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn list_items_use_kind_tag() {
    let json = r#"[
      {"kind": "folder", "id": "1", "title": "Documents"},
      {"kind": "note", "id": "n1", "title": "Readme", "abstract": "hi"}
    ]"#;
    let items: Vec<ListItem> = serde_json::from_str(json).unwrap();

    assert_eq!(items[0], ListItem::folder("1", "Documents"));
    match &items[1] {
      ListItem::Note {
        syntax,
        abstract_text,
        ..
      } => {
        assert_eq!(*syntax, Syntax::Markdown);
        assert_eq!(abstract_text.as_deref(), Some("hi"));
      },
      other => panic!("expected note, got {other:?}"),
    }
  }

  #[test]
  fn position_of_folder_ignores_notes_with_same_id() {
    let items = vec![ListItem::note("a", "note"), ListItem::folder("a", "folder")];
    assert_eq!(position_of_folder(&items, &FolderId::from("a")), Some(1));
    assert_eq!(position_of_folder(&items, &FolderId::from("b")), None);
  }
}

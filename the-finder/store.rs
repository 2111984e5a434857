//! Collaborator seams for the external data store.
//!
//! The finder never owns folder contents: every listing and preview is
//! fetched through these traits and treated as a read-only snapshot. Hosts
//! provide concrete implementations; [`MemoryFolderStore`] backs tests and the
//! headless driver.

use std::{
  cell::{
    Cell,
    RefCell,
  },
  collections::{
    HashMap,
    HashSet,
  },
};

use async_trait::async_trait;
use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::item::{
  FolderId,
  ItemId,
  ListItem,
  Syntax,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("folder store unavailable: {0}")]
  Unavailable(String),
  #[error("folder '{0}' does not exist")]
  NotFound(String),
  #[error("fetch failed: {0}")]
  Other(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Rendered-ready preview payload for a leaf item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewData {
  pub item_id: ItemId,
  pub title:   String,
  pub syntax:  Syntax,
  pub body:    String,
}

#[async_trait(?Send)]
pub trait FolderStore {
  /// Ordered children of `folder`; `None` lists the root.
  async fn list_children(&self, folder: Option<&FolderId>) -> FetchResult<Vec<ListItem>>;

  /// Representative leaf of a folder, used for breadcrumb click-through.
  fn index_item(&self, _folder: &FolderId) -> Option<ItemId> {
    None
  }
}

#[async_trait(?Send)]
pub trait PreviewSource {
  async fn fetch_preview(&self, item: &ItemId) -> FetchResult<PreviewData>;
}

/// Node of a nested folder fixture. Nodes with `children` (even an empty
/// list) are folders, nodes without are notes.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
  pub id:            String,
  pub title:         String,
  #[serde(default, rename = "abstract")]
  pub abstract_text: Option<String>,
  #[serde(default)]
  pub syntax:        Syntax,
  #[serde(default)]
  pub body:          Option<String>,
  #[serde(default)]
  pub children:      Option<Vec<TreeNode>>,
}

/// In-memory folder store with fetch accounting and failure injection.
#[derive(Debug, Default)]
pub struct MemoryFolderStore {
  listings:     RefCell<HashMap<Option<FolderId>, Vec<ListItem>>>,
  bodies:       HashMap<ItemId, String>,
  index_items:  HashMap<FolderId, ItemId>,
  failing:      RefCell<HashSet<Option<FolderId>>>,
  fetches:      Cell<usize>,
  preview_hits: Cell<usize>,
}

impl MemoryFolderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a store from a nested fixture whose top-level nodes are the
  /// root's children.
  pub fn from_tree(roots: Vec<TreeNode>) -> Self {
    let mut store = Self::new();
    store.insert_nodes(None, roots);
    store
  }

  fn insert_nodes(&mut self, parent: Option<FolderId>, nodes: Vec<TreeNode>) {
    let mut items = Vec::with_capacity(nodes.len());
    for node in nodes {
      match node.children {
        Some(children) => {
          let id = FolderId::from(node.id);
          items.push(ListItem::folder(id.clone(), node.title));
          if let Some(first_note) = children.iter().find(|child| child.children.is_none()) {
            self
              .index_items
              .insert(id.clone(), ItemId::from(first_note.id.as_str()));
          }
          self.insert_nodes(Some(id), children);
        },
        None => {
          let id = ItemId::from(node.id.as_str());
          if let Some(body) = node.body {
            self.bodies.insert(id.clone(), body);
          }
          items.push(ListItem::Note {
            id,
            title: node.title,
            syntax: node.syntax,
            abstract_text: node.abstract_text,
            created_at: None,
            updated_at: None,
          });
        },
      }
    }
    self.listings.get_mut().insert(parent, items);
  }

  pub fn with_listing(self, folder: Option<&str>, items: Vec<ListItem>) -> Self {
    self.set_listing(folder, items);
    self
  }

  /// Replaces a listing, simulating an external mutation.
  pub fn set_listing(&self, folder: Option<&str>, items: Vec<ListItem>) {
    self
      .listings
      .borrow_mut()
      .insert(folder.map(FolderId::from), items);
  }

  pub fn remove_listing(&self, folder: &str) {
    self.listings.borrow_mut().remove(&Some(FolderId::from(folder)));
  }

  /// Makes every subsequent fetch of `folder` fail until [`Self::heal`].
  pub fn fail(&self, folder: Option<&str>) {
    self.failing.borrow_mut().insert(folder.map(FolderId::from));
  }

  pub fn heal(&self, folder: Option<&str>) {
    self.failing.borrow_mut().remove(&folder.map(FolderId::from));
  }

  /// Number of `list_children` calls served so far.
  pub fn fetch_count(&self) -> usize {
    self.fetches.get()
  }

  pub fn preview_count(&self) -> usize {
    self.preview_hits.get()
  }

  fn find_note(&self, item: &ItemId) -> Option<ListItem> {
    self
      .listings
      .borrow()
      .values()
      .flatten()
      .find(|candidate| matches!(candidate, ListItem::Note { id, .. } if id == item))
      .cloned()
  }
}

#[async_trait(?Send)]
impl FolderStore for MemoryFolderStore {
  async fn list_children(&self, folder: Option<&FolderId>) -> FetchResult<Vec<ListItem>> {
    self.fetches.set(self.fetches.get() + 1);
    let key = folder.cloned();
    if self.failing.borrow().contains(&key) {
      return Err(FetchError::Unavailable(format!(
        "listing of {} is failing",
        folder.map_or("root", FolderId::as_str)
      )));
    }
    self
      .listings
      .borrow()
      .get(&key)
      .cloned()
      .ok_or_else(|| FetchError::NotFound(folder.map_or("root", FolderId::as_str).to_string()))
  }

  fn index_item(&self, folder: &FolderId) -> Option<ItemId> {
    self.index_items.get(folder).cloned()
  }
}

#[async_trait(?Send)]
impl PreviewSource for MemoryFolderStore {
  async fn fetch_preview(&self, item: &ItemId) -> FetchResult<PreviewData> {
    self.preview_hits.set(self.preview_hits.get() + 1);
    let Some(ListItem::Note {
      id,
      title,
      syntax,
      abstract_text,
      ..
    }) = self.find_note(item)
    else {
      return Err(FetchError::NotFound(item.to_string()));
    };
    let body = self
      .bodies
      .get(&id)
      .cloned()
      .or(abstract_text)
      .unwrap_or_default();
    Ok(PreviewData {
      item_id: id,
      title,
      syntax,
      body,
    })
  }
}

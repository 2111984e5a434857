//! Engine of a multi-tab, column-based folder browser.
//!
//! Each tab shows a horizontal stack of columns, one per folder level, and
//! slides that stack as the user drills in and out. Navigation state lives
//! in [`tab::TabState`]; [`finder::Finder`] wires input, animation, preview
//! and persistence around it.

pub mod animation;
pub mod column;
pub mod config;
pub mod finder;
pub mod focus;
pub mod input;
pub mod item;
pub mod navigation;
pub mod persist;
pub mod preview;
pub mod store;
pub mod tab;
pub mod tabs;

pub use crate::{
  config::FinderConfig,
  finder::{
    Finder,
    FinderEvent,
  },
  item::{
    FolderId,
    ItemId,
    ListItem,
  },
  store::{
    FetchError,
    FolderStore,
    PreviewSource,
  },
};

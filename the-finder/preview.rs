//! Preview of the focused item.
//!
//! Focus changes only arm a deadline; nothing is fetched until the deadline
//! has passed *and* no slide is in flight, since a preview fetch and fade
//! compete with the slide for the same frames. Every request carries a
//! generation so a slow response for an item the user already moved past
//! is dropped instead of replacing the current preview.

use std::time::{
  Duration,
  Instant,
};

use crate::{
  item::{
    FolderId,
    ItemId,
    ListItem,
  },
  store::{
    FetchResult,
    FolderStore,
    PreviewData,
    PreviewSource,
  },
  tab::TabState,
};

/// Default quiet period after a focus change before a preview is fetched.
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreviewTarget {
  Folder(FolderId),
  Note(ItemId),
}

impl PreviewTarget {
  pub fn of(item: &ListItem) -> Self {
    match item {
      ListItem::Folder { id, .. } => Self::Folder(id.clone()),
      ListItem::Note { id, .. } => Self::Note(id.clone()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
  generation: u64,
  target:     PreviewTarget,
}

impl PreviewRequest {
  pub fn target(&self) -> &PreviewTarget {
    &self.target
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewPayload {
  Children(Vec<ListItem>),
  Note(PreviewData),
}

#[derive(Debug)]
pub struct PreviewCoordinator {
  debounce:   Duration,
  wanted:     Option<PreviewTarget>,
  deadline:   Option<Instant>,
  generation: u64,
  shown:      Option<PreviewTarget>,
}

impl Default for PreviewCoordinator {
  fn default() -> Self {
    Self::new(PREVIEW_DEBOUNCE)
  }
}

impl PreviewCoordinator {
  pub fn new(debounce: Duration) -> Self {
    Self {
      debounce,
      wanted: None,
      deadline: None,
      generation: 0,
      shown: None,
    }
  }

  /// Target currently on display.
  pub fn shown(&self) -> Option<&PreviewTarget> {
    self.shown.as_ref()
  }

  pub fn is_pending(&self) -> bool {
    self.deadline.is_some()
  }

  /// Records the newly focused item of the active column.
  pub fn focus_changed(&mut self, tab: &mut TabState, target: Option<PreviewTarget>, now: Instant) {
    if target == self.wanted && (self.deadline.is_some() || target == self.shown) {
      return;
    }
    self.generation += 1;
    self.wanted = target;
    match self.wanted {
      Some(_) => self.deadline = Some(now + self.debounce),
      None => {
        self.deadline = None;
        self.shown = None;
        tab.preview_items = None;
        tab.preview = None;
      },
    }
  }

  /// Re-reads the focused item of `tab`.
  pub fn sync(&mut self, tab: &mut TabState, now: Instant) {
    let target = tab.focused_item().map(PreviewTarget::of);
    self.focus_changed(tab, target, now);
  }

  /// Hands out the pending request once its deadline passed, unless a slide
  /// is in flight.
  pub fn poll(&mut self, now: Instant, is_sliding: bool) -> Option<PreviewRequest> {
    let deadline = self.deadline?;
    if is_sliding || now < deadline {
      return None;
    }
    self.deadline = None;
    let target = self.wanted.clone()?;
    tracing::trace!(?target, generation = self.generation, "preview requested");
    Some(PreviewRequest {
      generation: self.generation,
      target,
    })
  }

  /// Applies a fetched preview. Returns `false` for stale responses.
  pub fn finish(
    &mut self,
    tab: &mut TabState,
    request: PreviewRequest,
    result: FetchResult<PreviewPayload>,
  ) -> bool {
    if request.generation != self.generation {
      tracing::trace!(target = ?request.target, "stale preview dropped");
      return false;
    }
    match result {
      Ok(PreviewPayload::Children(items)) => {
        tab.preview_items = Some(items.into());
        tab.preview = None;
      },
      Ok(PreviewPayload::Note(data)) => {
        tab.preview_items = None;
        tab.preview = Some(data);
      },
      Err(err) => {
        tracing::warn!(target = ?request.target, %err, "preview fetch failed");
        tab.preview_items = None;
        tab.preview = None;
      },
    }
    self.shown = Some(request.target);
    true
  }
}

/// Fetches the payload for `request`: children for folders, preview data for
/// notes.
pub async fn load_preview<F, P>(
  folders: &F,
  previews: &P,
  request: &PreviewRequest,
) -> FetchResult<PreviewPayload>
where
  F: FolderStore + ?Sized,
  P: PreviewSource + ?Sized,
{
  match &request.target {
    PreviewTarget::Folder(id) => {
      folders
        .list_children(Some(id))
        .await
        .map(PreviewPayload::Children)
    },
    PreviewTarget::Note(id) => previews.fetch_preview(id).await.map(PreviewPayload::Note),
  }
}

//! Navigation state machine for a single tab.
//!
//! Every operation is a transition on [`TabState`] that either completes
//! synchronously or hands the caller a ticket describing the fetch it needs.
//! Fetching operations are split in two halves:
//!
//! * `begin_*` validates the request, raises the tab's `is_navigating` guard
//!   and returns a ticket. While the guard is up every other depth-changing
//!   call is rejected with [`NavigationError::Busy`]; requests are dropped,
//!   never queued.
//! * `finish_*` consumes the ticket together with the fetch result and
//!   applies the whole change (truncate, append, depth, focus memory) in one
//!   step, or rolls back to the previous state on failure.
//!
//! The `async` helpers compose both halves for hosts that await fetches
//! inline. Animation, persistence and preview are not triggered here: the
//! returned [`DepthChange`] and [`FocusChange`] values tell the caller what
//! moved.

use std::sync::Arc;

use thiserror::Error;

use crate::{
  column::ColumnEntry,
  focus::clamp_index,
  item::{
    FolderId,
    ListItem,
    position_of_folder,
  },
  store::{
    FetchError,
    FolderStore,
  },
  tab::TabState,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
  #[error("another navigation is still in flight")]
  Busy,
  #[error("tab has no columns yet")]
  Uninitialized,
  #[error("'{0}' is not a folder in the active column")]
  NotAFolder(FolderId),
  #[error("navigation ticket does not belong to the pending navigation")]
  StaleTicket,
  #[error(transparent)]
  Fetch(#[from] FetchError),
}

pub type Result<T> = std::result::Result<T, NavigationError>;

/// A settled change of the active depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthChange {
  /// Depth before the change; `None` when the tab was uninitialized.
  pub from: Option<usize>,
  pub to:   usize,
}

impl DepthChange {
  /// Number of columns the track has to travel.
  pub fn magnitude(&self) -> usize {
    self.from.map_or(0, |from| from.abs_diff(self.to))
  }

  pub fn is_forward(&self) -> bool {
    self.from.is_some_and(|from| self.to > from)
  }
}

/// A change of the focused row in some column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChange {
  pub column: usize,
  pub index:  usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TicketKind {
  Root {
    title: String,
  },
  Deeper {
    target:       FolderId,
    title:        String,
    parent_depth: usize,
  },
}

/// Outstanding single-listing fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
  serial: u64,
  kind:   TicketKind,
}

impl FetchTicket {
  /// Folder whose children must be listed; `None` for the root.
  pub fn folder(&self) -> Option<&FolderId> {
    match &self.kind {
      TicketKind::Root { .. } => None,
      TicketKind::Deeper { target, .. } => Some(target),
    }
  }
}

/// Outcome of [`TabState::begin_go_deeper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeeperStep {
  /// A retained column was re-entered; nothing to fetch.
  Entered(DepthChange),
  /// The listing must be fetched and passed to [`TabState::finish_fetch`].
  Fetch(FetchTicket),
}

/// Outstanding jump to an arbitrary path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTicket {
  serial:     u64,
  root_title: String,
  path:       Vec<FolderId>,
  leaf_index: usize,
}

impl JumpTicket {
  pub fn path(&self) -> &[FolderId] {
    &self.path
  }

  pub fn leaf_index(&self) -> usize {
    self.leaf_index
  }
}

/// Columns resolved from a folder path, root first.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
  pub columns: Vec<ColumnEntry>,
  /// First failure; the columns before it are still usable.
  pub error:   Option<FetchError>,
}

/// Lists the root and then every folder of `path` in order.
///
/// Resolution stops at the first folder that cannot be listed or is not a
/// folder child of the previous level. `focus` picks the focused row of each
/// resolved level given its depth, folder and items.
pub async fn resolve_path<S, F>(
  store: &S,
  root_title: &str,
  path: &[FolderId],
  mut focus: F,
) -> ResolvedPath
where
  S: FolderStore + ?Sized,
  F: FnMut(usize, Option<&FolderId>, &[ListItem]) -> usize,
{
  let mut columns = Vec::with_capacity(path.len() + 1);

  let root = match store.list_children(None).await {
    Ok(items) => items,
    Err(err) => {
      return ResolvedPath {
        columns,
        error: Some(err),
      };
    },
  };
  let index = focus(0, None, &root);
  columns.push(ColumnEntry::new(None, root, index, root_title));

  for (level, folder) in path.iter().enumerate() {
    let parent = &columns[level];
    let Some(position) = position_of_folder(parent.items(), folder) else {
      return ResolvedPath {
        columns,
        error: Some(FetchError::NotFound(folder.to_string())),
      };
    };
    let title = parent.items()[position].title().to_string();

    let items = match store.list_children(Some(folder)).await {
      Ok(items) => items,
      Err(err) => {
        return ResolvedPath {
          columns,
          error: Some(err),
        };
      },
    };
    let index = focus(level + 1, Some(folder), &items);
    columns.push(ColumnEntry::new(Some(folder.clone()), items, index, title));
  }

  ResolvedPath {
    columns,
    error: None,
  }
}

impl TabState {
  pub(crate) fn ensure_idle(&self) -> Result<()> {
    if self.is_navigating {
      tracing::debug!("navigation rejected: fetch in flight");
      return Err(NavigationError::Busy);
    }
    Ok(())
  }

  pub(crate) fn raise_guard(&mut self) -> u64 {
    self.is_navigating = true;
    self.nav_serial += 1;
    self.nav_serial
  }

  pub(crate) fn lower_guard(&mut self, serial: u64) -> Result<()> {
    if !self.is_navigating || serial != self.nav_serial {
      return Err(NavigationError::StaleTicket);
    }
    self.is_navigating = false;
    Ok(())
  }

  fn active_depth(&self) -> Result<usize> {
    self.depth.ok_or(NavigationError::Uninitialized)
  }

  /// Focuses `index` in column `column` and records it in focus memory.
  pub(crate) fn focus_at(&mut self, column: usize, index: usize) -> Option<FocusChange> {
    let entry = self.columns.get_mut(column)?;
    let previous = entry.focused_index();
    let index = entry.set_focus(index);
    let folder = entry.folder_id().cloned();
    self.focus_memory.remember(folder.as_ref(), index);
    if previous == index {
      return None;
    }
    self.prune_forward();
    Some(FocusChange { column, index })
  }

  /// Evicts retained columns that no longer hang off the focused path or
  /// exceed the retention limit.
  pub(crate) fn prune_forward(&mut self) {
    let Some(depth) = self.depth else {
      return;
    };
    let mut keep = depth + 1;
    while keep < self.columns.len() && keep - depth <= self.retain_limit {
      let parent = self.columns[keep - 1]
        .focused_item()
        .and_then(ListItem::folder_id);
      if parent.is_none() || parent != self.columns[keep].folder_id() {
        break;
      }
      keep += 1;
    }
    if keep < self.columns.len() {
      tracing::trace!(evicted = self.columns.len() - keep, "pruning retained columns");
      self.columns.truncate(keep);
    }
  }

  /// Starts loading the root listing of an uninitialized tab.
  pub fn begin_open_root(&mut self, root_title: &str) -> Result<FetchTicket> {
    self.ensure_idle()?;
    let serial = self.raise_guard();
    Ok(FetchTicket {
      serial,
      kind: TicketKind::Root {
        title: root_title.to_string(),
      },
    })
  }

  /// Starts drilling into `target`, which must be a folder of the active
  /// column.
  pub fn begin_go_deeper(&mut self, target: &FolderId) -> Result<DeeperStep> {
    self.ensure_idle()?;
    let depth = self.active_depth()?;
    let column = &self.columns[depth];
    let Some(parent_index) = position_of_folder(column.items(), target) else {
      return Err(NavigationError::NotAFolder(target.clone()));
    };
    let title = column.items()[parent_index].title().to_string();

    let retained = self
      .columns
      .get(depth + 1)
      .is_some_and(|next| next.folder_id() == Some(target));
    if retained {
      self.focus_at(depth, parent_index);
      if self.columns.len() > depth + 1 {
        self.depth = Some(depth + 1);
        self.prune_forward();
        self.check_invariants();
        tracing::debug!(%target, depth = depth + 1, "re-entered retained column");
        return Ok(DeeperStep::Entered(DepthChange {
          from: Some(depth),
          to:   depth + 1,
        }));
      }
    }

    let serial = self.raise_guard();
    tracing::debug!(%target, "fetching folder listing");
    Ok(DeeperStep::Fetch(FetchTicket {
      serial,
      kind: TicketKind::Deeper {
        target: target.clone(),
        title,
        parent_depth: depth,
      },
    }))
  }

  /// Applies a fetched listing for a ticket from [`Self::begin_open_root`] or
  /// [`Self::begin_go_deeper`].
  pub fn finish_fetch(
    &mut self,
    ticket: FetchTicket,
    result: std::result::Result<Vec<ListItem>, FetchError>,
  ) -> Result<DepthChange> {
    self.lower_guard(ticket.serial)?;
    let items = result.inspect_err(|err| {
      tracing::warn!(folder = ?ticket.folder(), %err, "folder listing failed");
    })?;
    let from = self.depth;

    let change = match ticket.kind {
      TicketKind::Root { title } => {
        let focused = self.focus_memory.restore(None, items.len());
        self.columns = vec![ColumnEntry::new(None, items, focused, title)];
        self.depth = Some(0);
        DepthChange { from, to: 0 }
      },
      TicketKind::Deeper {
        target,
        title,
        parent_depth,
      } => {
        // An external refresh may have cut the path or moved the target
        // while the fetch ran.
        let Some(parent_index) = self
          .columns
          .get(parent_depth)
          .and_then(|parent| position_of_folder(parent.items(), &target))
        else {
          tracing::debug!(%target, "drill-down target vanished during fetch");
          return Err(NavigationError::StaleTicket);
        };
        self.columns.truncate(parent_depth + 1);
        let focused = self.focus_memory.restore(Some(&target), items.len());
        self
          .columns
          .push(ColumnEntry::new(Some(target), items, focused, title));
        self.columns[parent_depth].set_focus(parent_index);
        let folder = self.columns[parent_depth].folder_id().cloned();
        let index = self.columns[parent_depth].focused_index();
        self.focus_memory.remember(folder.as_ref(), index);
        self.depth = Some(parent_depth + 1);
        DepthChange {
          from,
          to: parent_depth + 1,
        }
      },
    };

    self.check_invariants();
    Ok(change)
  }

  /// Loads the root listing and makes it the only column.
  pub async fn open_root<S>(&mut self, store: &S, root_title: &str) -> Result<DepthChange>
  where
    S: FolderStore + ?Sized,
  {
    let ticket = self.begin_open_root(root_title)?;
    let result = store.list_children(None).await;
    self.finish_fetch(ticket, result)
  }

  /// Drills into `target`, fetching its children unless a retained column
  /// already shows it.
  pub async fn go_deeper<S>(&mut self, store: &S, target: &FolderId) -> Result<DepthChange>
  where
    S: FolderStore + ?Sized,
  {
    match self.begin_go_deeper(target)? {
      DeeperStep::Entered(change) => Ok(change),
      DeeperStep::Fetch(ticket) => {
        let result = store.list_children(ticket.folder()).await;
        self.finish_fetch(ticket, result)
      },
    }
  }

  /// Steps one level up. Deeper columns stay retained.
  pub fn go_shallower(&mut self) -> Result<Option<DepthChange>> {
    self.ensure_idle()?;
    let depth = self.active_depth()?;
    if depth == 0 {
      return Ok(None);
    }
    self.depth = Some(depth - 1);
    self.prune_forward();
    self.check_invariants();
    Ok(Some(DepthChange {
      from: Some(depth),
      to:   depth - 1,
    }))
  }

  /// Moves straight to column `target`, clamped to the existing stack.
  pub fn go_to_depth(&mut self, target: usize) -> Result<Option<DepthChange>> {
    self.ensure_idle()?;
    let depth = self.active_depth()?;
    let target = clamp_index(target, self.columns.len());
    if target == depth {
      return Ok(None);
    }
    self.depth = Some(target);
    self.prune_forward();
    self.check_invariants();
    Ok(Some(DepthChange {
      from: Some(depth),
      to:   target,
    }))
  }

  /// Starts a jump to `path` (folder ids below the root), focusing
  /// `leaf_index` in the last resolved column.
  pub fn begin_jump(
    &mut self,
    path: Vec<FolderId>,
    leaf_index: usize,
    root_title: &str,
  ) -> Result<JumpTicket> {
    self.ensure_idle()?;
    let serial = self.raise_guard();
    tracing::debug!(levels = path.len(), "jumping to selection");
    Ok(JumpTicket {
      serial,
      root_title: root_title.to_string(),
      path,
      leaf_index,
    })
  }

  /// Swaps in the columns resolved for a jump. Any resolution failure
  /// leaves the tab exactly as it was.
  pub fn finish_jump(&mut self, ticket: JumpTicket, resolved: ResolvedPath) -> Result<DepthChange> {
    self.lower_guard(ticket.serial)?;
    if let Some(err) = resolved.error {
      tracing::warn!(%err, "jump target could not be resolved");
      return Err(err.into());
    }
    let from = self.depth;
    let to = resolved.columns.len() - 1;

    for column in &resolved.columns {
      self
        .focus_memory
        .remember(column.folder_id(), column.focused_index());
    }
    self.columns = resolved.columns;
    self.depth = Some(to);
    self.check_invariants();
    Ok(DepthChange { from, to })
  }

  /// Jumps to `path`, rebuilding the column stack from the root.
  pub async fn jump_to_selection<S>(
    &mut self,
    store: &S,
    path: Vec<FolderId>,
    leaf_index: usize,
    root_title: &str,
  ) -> Result<DepthChange>
  where
    S: FolderStore + ?Sized,
  {
    let ticket = self.begin_jump(path, leaf_index, root_title)?;
    let resolved = resolve_jump(store, &ticket).await;
    self.finish_jump(ticket, resolved)
  }

  /// Focuses `index` in the active column.
  pub fn set_focus(&mut self, index: usize) -> Option<FocusChange> {
    let depth = self.depth?;
    self.focus_at(depth, index)
  }

  /// Moves focus by `delta` rows, stopping at either end.
  pub fn move_focus(&mut self, delta: isize) -> Option<FocusChange> {
    let current = self.active_column()?.focused_index();
    self.set_focus(current.saturating_add_signed(delta))
  }

  pub fn focus_first(&mut self) -> Option<FocusChange> {
    self.set_focus(0)
  }

  pub fn focus_last(&mut self) -> Option<FocusChange> {
    let len = self.active_column()?.len();
    self.set_focus(len.saturating_sub(1))
  }

  /// Installs a fresh listing for `folder` after an external mutation.
  ///
  /// Focus is re-clamped, and the column stack is cut where a folder has
  /// vanished from its parent's listing. Returns the depth change if the
  /// active column was cut away.
  pub fn apply_listing(
    &mut self,
    folder: Option<&FolderId>,
    items: Vec<ListItem>,
  ) -> Option<DepthChange> {
    let items: Arc<[ListItem]> = items.into();
    for column in &mut self.columns {
      if column.folder_id() == folder {
        column.replace_items(items.clone());
      }
    }

    let cut = (1..self.columns.len()).find(|&level| {
      match self.columns[level].folder_id() {
        Some(id) => !self.columns[level - 1].contains_folder(id),
        None => true,
      }
    });

    let mut change = None;
    if let Some(cut) = cut {
      self.columns.truncate(cut);
      if let Some(depth) = self.depth.filter(|depth| *depth >= cut) {
        tracing::debug!(depth, cut, "active path vanished, stepping back");
        self.depth = Some(cut - 1);
        change = Some(DepthChange {
          from: Some(depth),
          to:   cut - 1,
        });
      }
    }
    self.prune_forward();
    self.check_invariants();
    change
  }
}

/// Resolves a jump ticket without touching the tab, so the tab stays free
/// for other (rejected) input while the fetches are outstanding.
pub async fn resolve_jump<S>(store: &S, ticket: &JumpTicket) -> ResolvedPath
where
  S: FolderStore + ?Sized,
{
  let last = ticket.path.len();
  let path = &ticket.path;
  resolve_path(store, &ticket.root_title, path, |level, _, items| {
    if level == last {
      return clamp_index(ticket.leaf_index, items.len());
    }
    position_of_folder(items, &path[level]).unwrap_or(0)
  })
  .await
}

#[cfg(test)]
mod tests {
  use futures_executor::block_on;
  use quickcheck::{
    Arbitrary,
    Gen,
  };

  use super::*;
  use crate::store::MemoryFolderStore;

  fn store() -> MemoryFolderStore {
    MemoryFolderStore::new()
      .with_listing(None, vec![
        ListItem::folder("a", "Alpha"),
        ListItem::folder("b", "Beta"),
        ListItem::note("n", "Note"),
      ])
      .with_listing(Some("a"), vec![
        ListItem::folder("a1", "Alpha One"),
        ListItem::note("a-n1", "First"),
        ListItem::note("a-n2", "Second"),
      ])
      .with_listing(Some("a1"), vec![ListItem::note("a1-n", "Deep")])
      .with_listing(Some("b"), vec![])
  }

  fn opened(store: &MemoryFolderStore) -> TabState {
    let mut tab = TabState::new();
    block_on(tab.open_root(store, "Home")).unwrap();
    tab
  }

  fn id(raw: &str) -> FolderId {
    FolderId::from(raw)
  }

  #[test]
  fn open_root_initializes_depth() {
    let store = store();
    let tab = opened(&store);
    assert_eq!(tab.depth(), Some(0));
    assert_eq!(tab.columns().len(), 1);
    assert_eq!(tab.label(), "Home");
  }

  #[test]
  fn go_deeper_appends_column_and_focuses_parent() {
    let store = store();
    let mut tab = opened(&store);

    let change = block_on(tab.go_deeper(&store, &id("b"))).unwrap();
    assert_eq!(change, DepthChange {
      from: Some(0),
      to:   1,
    });
    assert_eq!(tab.columns().len(), 2);
    assert_eq!(tab.columns()[0].focused_index(), 1);
    assert_eq!(tab.focus_memory().get(None), Some(1));
    assert_eq!(tab.label(), "Beta");
  }

  #[test]
  fn go_deeper_rejects_notes_and_unknown_ids() {
    let store = store();
    let mut tab = opened(&store);
    assert_eq!(
      block_on(tab.go_deeper(&store, &id("n"))),
      Err(NavigationError::NotAFolder(id("n")))
    );
    assert_eq!(
      block_on(tab.go_deeper(&store, &id("zzz"))),
      Err(NavigationError::NotAFolder(id("zzz")))
    );
    assert!(!tab.is_navigating());
  }

  #[test]
  fn second_go_deeper_while_fetching_is_dropped() {
    let store = store();
    let mut tab = opened(&store);

    let DeeperStep::Fetch(first) = tab.begin_go_deeper(&id("a")).unwrap() else {
      panic!("expected a fetch");
    };
    assert_eq!(tab.begin_go_deeper(&id("b")), Err(NavigationError::Busy));
    assert_eq!(tab.go_shallower(), Err(NavigationError::Busy));

    let items = block_on(store.list_children(first.folder())).unwrap();
    tab.finish_fetch(first, Ok(items)).unwrap();
    assert_eq!(tab.columns().len(), 2);
    assert_eq!(tab.depth(), Some(1));
  }

  #[test]
  fn fetch_failure_leaves_state_unchanged_and_is_retryable() {
    let store = store();
    let mut tab = opened(&store);
    store.fail(Some("a"));

    let err = block_on(tab.go_deeper(&store, &id("a"))).unwrap_err();
    assert!(matches!(err, NavigationError::Fetch(FetchError::Unavailable(_))));
    assert_eq!(tab.depth(), Some(0));
    assert_eq!(tab.columns().len(), 1);
    assert!(!tab.is_navigating());

    store.heal(Some("a"));
    assert!(block_on(tab.go_deeper(&store, &id("a"))).is_ok());
  }

  #[test]
  fn stale_ticket_is_refused() {
    let store = store();
    let mut tab = opened(&store);
    let DeeperStep::Fetch(ticket) = tab.begin_go_deeper(&id("a")).unwrap() else {
      panic!("expected a fetch");
    };
    let replay = ticket.clone();
    tab.finish_fetch(ticket, Ok(vec![])).unwrap();
    assert_eq!(
      tab.finish_fetch(replay, Ok(vec![])),
      Err(NavigationError::StaleTicket)
    );
  }

  #[test]
  fn refresh_removing_target_mid_fetch_refuses_ticket() {
    let store = store();
    let mut tab = opened(&store);
    let DeeperStep::Fetch(ticket) = tab.begin_go_deeper(&id("a")).unwrap() else {
      panic!("expected a fetch");
    };
    let items = block_on(store.list_children(ticket.folder())).unwrap();

    tab.apply_listing(None, vec![ListItem::folder("b", "Beta")]);
    assert_eq!(tab.finish_fetch(ticket, Ok(items)), Err(NavigationError::StaleTicket));
    assert_eq!(tab.columns().len(), 1);
    assert_eq!(tab.depth(), Some(0));
    assert!(tab.path().is_empty());
    assert!(!tab.is_navigating());
    assert!(block_on(tab.go_deeper(&store, &id("b"))).is_ok());
  }

  #[test]
  fn refresh_reordering_target_mid_fetch_focuses_its_new_row() {
    let store = store();
    let mut tab = opened(&store);
    let DeeperStep::Fetch(ticket) = tab.begin_go_deeper(&id("a")).unwrap() else {
      panic!("expected a fetch");
    };
    let items = block_on(store.list_children(ticket.folder())).unwrap();

    tab.apply_listing(None, vec![
      ListItem::folder("b", "Beta"),
      ListItem::note("n", "Note"),
      ListItem::folder("a", "Alpha"),
    ]);
    tab.finish_fetch(ticket, Ok(items)).unwrap();
    assert_eq!(tab.path(), vec![id("a")]);
    assert_eq!(tab.columns()[0].focused_index(), 2);
    assert_eq!(tab.focus_memory().get(None), Some(2));
  }

  #[test]
  fn shallower_then_deeper_reuses_retained_column() {
    let store = store();
    let mut tab = opened(&store);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    let before = tab.columns()[1].clone();
    let fetches = store.fetch_count();

    tab.go_shallower().unwrap();
    assert_eq!(tab.depth(), Some(0));
    assert_eq!(tab.columns().len(), 2);

    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    assert_eq!(store.fetch_count(), fetches);
    assert!(tab.columns()[1].shares_items(&before));
    assert_eq!(tab.columns()[1].focused_index(), before.focused_index());
  }

  #[test]
  fn moving_focus_evicts_unrelated_retained_columns() {
    let store = store();
    let mut tab = opened(&store);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    tab.go_shallower().unwrap();

    tab.move_focus(1);
    assert_eq!(tab.columns().len(), 1);
  }

  #[test]
  fn retention_limit_bounds_forward_columns() {
    let store = store();
    let mut tab = TabState::with_retention(1);
    block_on(tab.open_root(&store, "Home")).unwrap();
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    block_on(tab.go_deeper(&store, &id("a1"))).unwrap();

    tab.go_to_depth(0).unwrap();
    assert_eq!(tab.columns().len(), 2);
  }

  #[test]
  fn go_shallower_at_root_is_noop() {
    let store = store();
    let mut tab = opened(&store);
    assert_eq!(tab.go_shallower(), Ok(None));
    assert_eq!(TabState::new().go_shallower(), Err(NavigationError::Uninitialized));
  }

  #[test]
  fn go_to_depth_clamps_and_reports_magnitude() {
    let store = store();
    let mut tab = opened(&store);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    block_on(tab.go_deeper(&store, &id("a1"))).unwrap();

    let change = tab.go_to_depth(0).unwrap().unwrap();
    assert_eq!(change.magnitude(), 2);
    let change = tab.go_to_depth(99).unwrap().unwrap();
    assert_eq!(change.to, 2);
    assert!(change.is_forward());
  }

  #[test]
  fn focus_is_remembered_across_reentry() {
    let store = store();
    let mut tab = opened(&store);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    tab.set_focus(2);
    tab.go_shallower().unwrap();
    tab.move_focus(1);
    tab.move_focus(-1);

    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    assert_eq!(tab.active_column().unwrap().focused_index(), 2);
  }

  #[test]
  fn remembered_focus_clamps_when_listing_shrinks() {
    let store = store();
    let mut tab = opened(&store);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    tab.focus_last();
    tab.go_shallower().unwrap();
    tab.move_focus(1);

    store.set_listing(Some("a"), vec![ListItem::note("only", "Only")]);
    tab.move_focus(-1);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    assert_eq!(tab.active_column().unwrap().focused_index(), 0);
  }

  #[test]
  fn jump_rebuilds_stack_and_focuses_leaf() {
    let store = store();
    let mut tab = TabState::new();
    let change = block_on(tab.jump_to_selection(&store, vec![id("a"), id("a1")], 5, "Home")).unwrap();

    assert_eq!(change, DepthChange { from: None, to: 2 });
    assert_eq!(tab.columns()[0].focused_index(), 0);
    assert_eq!(tab.columns()[1].focused_index(), 0);
    assert_eq!(tab.columns()[2].focused_index(), 0);
    assert_eq!(tab.focus_memory().get(Some(&id("a1"))), Some(0));
  }

  #[test]
  fn failed_jump_keeps_previous_path() {
    let store = store();
    let mut tab = opened(&store);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();

    let err = block_on(tab.jump_to_selection(&store, vec![id("b"), id("ghost")], 0, "Home"));
    assert!(matches!(err, Err(NavigationError::Fetch(FetchError::NotFound(_)))));
    assert_eq!(tab.depth(), Some(1));
    assert_eq!(tab.label(), "Alpha");
    assert!(!tab.is_navigating());
  }

  #[test]
  fn apply_listing_cuts_vanished_path() {
    let store = store();
    let mut tab = opened(&store);
    block_on(tab.go_deeper(&store, &id("a"))).unwrap();
    block_on(tab.go_deeper(&store, &id("a1"))).unwrap();

    let change = tab.apply_listing(Some(&id("a")), vec![ListItem::note("x", "X")]);
    assert_eq!(change, Some(DepthChange {
      from: Some(2),
      to:   1,
    }));
    assert_eq!(tab.columns().len(), 2);
    assert_eq!(tab.active_column().unwrap().focused_index(), 0);
  }

  #[derive(Debug, Clone)]
  enum Op {
    Deeper(u8),
    Shallower,
    ToDepth(u8),
    Focus(i8),
  }

  impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
      match u8::arbitrary(g) % 4 {
        0 => Op::Deeper(u8::arbitrary(g)),
        1 => Op::Shallower,
        2 => Op::ToDepth(u8::arbitrary(g)),
        _ => Op::Focus(i8::arbitrary(g)),
      }
    }
  }

  quickcheck::quickcheck! {
    fn depth_stays_inside_column_stack(ops: Vec<Op>) -> bool {
      let store = store();
      let mut tab = opened(&store);
      for op in ops {
        match op {
          Op::Deeper(pick) => {
            let folders: Vec<FolderId> = tab
              .active_column()
              .map(|column| column.items().iter().filter_map(ListItem::folder_id).cloned().collect())
              .unwrap_or_default();
            if let Some(target) = folders.get(pick as usize % folders.len().max(1)) {
              let _ = block_on(tab.go_deeper(&store, target));
            }
          },
          Op::Shallower => {
            let _ = tab.go_shallower();
          },
          Op::ToDepth(depth) => {
            let _ = tab.go_to_depth(depth as usize);
          },
          Op::Focus(delta) => {
            tab.move_focus(delta as isize);
          },
        }
        let Some(depth) = tab.depth() else {
          return false;
        };
        if depth >= tab.columns().len() || tab.is_navigating() {
          return false;
        }
      }
      true
    }
  }
}

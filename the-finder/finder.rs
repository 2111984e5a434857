//! The finder facade: routes input into navigation and keeps every tab's
//! track, preview and persisted slot in step with its navigation state.
//!
//! State flows one way. An event is routed, applied to the active
//! [`TabState`], and the settled change is then handed to the track (which
//! animates or snaps), the preview coordinator (which re-arms its debounce)
//! and the key-value store (which mirrors path and focus).

use std::time::{
  Duration,
  Instant,
};

use crate::{
  animation::{
    DeferredEffects,
    Frame,
    SlideId,
    SlideOutcome,
  },
  column::ColumnEntry,
  config::{
    ConfigError,
    FinderConfig,
  },
  input::{
    FinderAction,
    InputContext,
    InputRouter,
    KeyEvent,
    KeyRoute,
    PointerEvent,
    PointerRoute,
    Suppressed,
  },
  item::{
    FolderId,
    ItemId,
    ListItem,
  },
  navigation::{
    self,
    DepthChange,
    FocusChange,
    NavigationError,
  },
  persist::{
    self,
    KeyValueStore,
    PersistedPath,
    PersistedTabs,
    RestoreReport,
    SlotKeys,
    restore_tab,
  },
  preview::{
    PreviewTarget,
    load_preview,
  },
  store::{
    FetchResult,
    FolderStore,
    PreviewSource,
  },
  tab::TabState,
  tabs::{
    Tab,
    TabId,
    TabManager,
  },
};

/// Rows skipped by page up/down.
const PAGE_STEP: isize = 10;

/// What handling an event did, for the host to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum FinderEvent {
  /// Nothing changed.
  None,
  Ignored(Suppressed),
  /// The first keys of a sequence were seen.
  Pending,
  Focus(FocusChange),
  Navigated {
    change: DepthChange,
    slide:  SlideOutcome,
  },
  Rejected(NavigationError),
  /// A note was activated; the host shows its detail view.
  OpenItem(ItemId),
  OpenPalette,
  /// Tabs were opened, closed, reordered or switched.
  Tabs,
}

pub struct Finder<S> {
  store:      S,
  tabs:       TabManager,
  router:     InputRouter,
  kv:         Box<dyn KeyValueStore>,
  keys:       SlotKeys,
  root_title: String,
}

impl<S> Finder<S>
where
  S: FolderStore + PreviewSource,
{
  pub fn new(store: S, kv: Box<dyn KeyValueStore>, config: &FinderConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    let keymap = config.keymap()?;
    Ok(Self {
      store,
      tabs: TabManager::new(config.tab_settings()),
      router: InputRouter::new(keymap, config.chord_timeout()),
      kv,
      keys: SlotKeys::new(config.storage_prefix.clone()),
      root_title: config.root_title.clone(),
    })
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn tabs(&self) -> &TabManager {
    &self.tabs
  }

  pub fn tabs_mut(&mut self) -> &mut TabManager {
    &mut self.tabs
  }

  pub fn kv(&self) -> &dyn KeyValueStore {
    &*self.kv
  }

  pub fn into_kv(self) -> Box<dyn KeyValueStore> {
    self.kv
  }

  pub fn active_tab(&self) -> &Tab {
    self.tabs.active()
  }

  pub fn state(&self) -> &TabState {
    self.tabs.active().state()
  }

  pub fn columns(&self) -> &[ColumnEntry] {
    self.state().columns()
  }

  pub fn depth(&self) -> Option<usize> {
    self.state().depth()
  }

  pub fn rendered_track_x(&self) -> f32 {
    self.tabs.active().track().rendered_track_x()
  }

  pub fn is_sliding(&self) -> bool {
    self.tabs.active().track().is_sliding()
  }

  pub fn preview_items(&self) -> Option<&[ListItem]> {
    self.state().preview_items().map(|items| &items[..])
  }

  pub fn labels(&self) -> Vec<(TabId, &str)> {
    self.tabs.labels()
  }

  /// Rebuilds the persisted tab set and replays each tab's path. Tabs
  /// without a usable slot start from the root.
  pub async fn mount(&mut self, now: Instant) -> Vec<(TabId, RestoreReport)> {
    if let Some(saved) = persist::load::<PersistedTabs>(&*self.kv, &self.keys.tabs()) {
      let ids: Vec<TabId> = saved.tabs.into_iter().map(TabId::new).collect();
      self.tabs.rebuild(&ids, saved.active);
    }

    let mut reports = Vec::new();
    for index in 0..self.tabs.len() {
      let tab = &mut self.tabs.tabs_mut()[index];
      let id = tab.id();
      let Some(persisted) = persist::load::<PersistedPath>(&*self.kv, &self.keys.tab(id)) else {
        continue;
      };
      let (state, track, _) = tab.parts_mut();
      match restore_tab(state, &self.store, persisted, &self.root_title).await {
        Ok(report) => {
          if let Some(depth) = state.depth() {
            track.snap_to(depth);
          }
          tracing::debug!(%id, restored = report.restored, "tab restored");
          reports.push((id, report));
          self.persist_tab_at(index);
        },
        Err(err) => tracing::warn!(%id, %err, "tab restore failed"),
      }
    }

    if let Err(err) = self.ensure_active_root(now).await {
      tracing::warn!(%err, "root listing unavailable");
    }
    self.sync_preview(now);
    self.persist_tabs();
    reports
  }

  pub async fn handle_key(&mut self, event: &KeyEvent, context: InputContext, now: Instant) -> FinderEvent {
    match self.router.route_key(event, context, now) {
      KeyRoute::Ignored(reason) => FinderEvent::Ignored(reason),
      KeyRoute::Pending => FinderEvent::Pending,
      KeyRoute::Cancelled | KeyRoute::Unbound => FinderEvent::None,
      KeyRoute::Action(action) => self.perform(action, now).await,
    }
  }

  pub async fn handle_pointer(
    &mut self,
    event: &PointerEvent,
    context: InputContext,
    now: Instant,
  ) -> FinderEvent {
    match self.router.route_pointer(event, context) {
      PointerRoute::Ignored(reason) => FinderEvent::Ignored(reason),
      PointerRoute::Unbound => FinderEvent::None,
      PointerRoute::GoToDepth(depth) => self.breadcrumb(depth, now),
      PointerRoute::Row {
        column,
        index,
        activate,
      } => self.click_row(column, index, activate, now).await,
    }
  }

  pub async fn perform(&mut self, action: FinderAction, now: Instant) -> FinderEvent {
    match action {
      FinderAction::FocusNext => self.move_focus(1, now),
      FinderAction::FocusPrev => self.move_focus(-1, now),
      FinderAction::PageDown => self.move_focus(PAGE_STEP, now),
      FinderAction::PageUp => self.move_focus(-PAGE_STEP, now),
      FinderAction::FocusFirst => {
        let change = self.tabs.active_mut().state_mut().focus_first();
        self.focus_moved(change, now)
      },
      FinderAction::FocusLast => {
        let change = self.tabs.active_mut().state_mut().focus_last();
        self.focus_moved(change, now)
      },
      FinderAction::Activate => self.activate(now).await,
      FinderAction::Shallower => self.go_shallower(now),
      FinderAction::NewTab => {
        self.open_tab(now).await;
        FinderEvent::Tabs
      },
      FinderAction::CloseTab => {
        let id = self.tabs.active_id();
        self.close_tab(id, now).await
      },
      FinderAction::NextTab => {
        let switched = self.tabs.next_tab();
        self.tab_switched(switched, now).await
      },
      FinderAction::PrevTab => {
        let switched = self.tabs.prev_tab();
        self.tab_switched(switched, now).await
      },
      FinderAction::SwitchTab(index) => {
        let switched = self.tabs.switch_to_index(index as usize);
        self.tab_switched(switched, now).await
      },
      FinderAction::OpenPalette => FinderEvent::OpenPalette,
    }
  }

  pub fn move_focus(&mut self, delta: isize, now: Instant) -> FinderEvent {
    let change = self.tabs.active_mut().state_mut().move_focus(delta);
    self.focus_moved(change, now)
  }

  pub fn set_focus(&mut self, index: usize, now: Instant) -> FinderEvent {
    let change = self.tabs.active_mut().state_mut().set_focus(index);
    self.focus_moved(change, now)
  }

  /// Enters the focused folder or reports the focused note.
  pub async fn activate(&mut self, now: Instant) -> FinderEvent {
    let Some(item) = self.state().focused_item().cloned() else {
      return FinderEvent::None;
    };
    match item {
      ListItem::Folder { id, .. } => self.go_deeper(&id, now).await,
      ListItem::Note { id, .. } => FinderEvent::OpenItem(id),
    }
  }

  pub async fn go_deeper(&mut self, target: &FolderId, now: Instant) -> FinderEvent {
    let tab = self.tabs.active_mut();
    let result = tab.state_mut().go_deeper(&self.store, target).await;
    self.navigated(result, now)
  }

  pub fn go_shallower(&mut self, now: Instant) -> FinderEvent {
    let result = self.tabs.active_mut().state_mut().go_shallower();
    self.maybe_navigated(result, now)
  }

  pub fn go_to_depth(&mut self, depth: usize, now: Instant) -> FinderEvent {
    let result = self.tabs.active_mut().state_mut().go_to_depth(depth);
    self.maybe_navigated(result, now)
  }

  pub async fn jump_to_selection(
    &mut self,
    path: Vec<FolderId>,
    leaf_index: usize,
    now: Instant,
  ) -> FinderEvent {
    let tab = self.tabs.active_mut();
    let result = tab
      .state_mut()
      .jump_to_selection(&self.store, path, leaf_index, &self.root_title)
      .await;
    self.navigated(result, now)
  }

  pub async fn open_tab(&mut self, now: Instant) -> TabId {
    let id = self.tabs.open();
    if let Err(err) = self.ensure_active_root(now).await {
      tracing::warn!(%id, %err, "new tab has no root listing yet");
    }
    self.persist_tabs();
    id
  }

  /// Opens a tab straight at `path`, without intermediate slides.
  pub async fn open_tab_at(
    &mut self,
    path: Vec<FolderId>,
    leaf_index: usize,
    now: Instant,
  ) -> Result<TabId, NavigationError> {
    let id = self
      .tabs
      .open_from_jump(&self.store, path, leaf_index, &self.root_title)
      .await?;
    self.sync_preview(now);
    self.persist_active();
    self.persist_tabs();
    Ok(id)
  }

  pub async fn close_tab(&mut self, id: TabId, now: Instant) -> FinderEvent {
    let Some(closed) = self.tabs.close(id) else {
      return FinderEvent::None;
    };
    self.kv.remove(&self.keys.tab(closed.id()));
    if let Err(err) = self.ensure_active_root(now).await {
      tracing::warn!(%err, "root listing unavailable");
    }
    self.sync_preview(now);
    self.persist_tabs();
    FinderEvent::Tabs
  }

  pub async fn switch_tab(&mut self, id: TabId, now: Instant) -> FinderEvent {
    let switched = self.tabs.switch_to(id);
    self.tab_switched(switched, now).await
  }

  pub fn move_tab(&mut self, from: usize, to: usize) -> bool {
    let moved = self.tabs.move_tab(from, to);
    if moved {
      self.persist_tabs();
    }
    moved
  }

  /// Installs a fresh listing of `folder` into every tab showing it.
  /// Returns the active tab's depth change if its path was cut.
  pub fn apply_listing(
    &mut self,
    folder: Option<&FolderId>,
    items: Vec<ListItem>,
    now: Instant,
  ) -> Option<DepthChange> {
    let active = self.tabs.active_index();
    let mut active_change = None;
    for index in 0..self.tabs.len() {
      let tab = &mut self.tabs.tabs_mut()[index];
      let change = tab.state_mut().apply_listing(folder, items.clone());
      let (state, track, preview) = tab.parts_mut();
      if let Some(folder) = folder
        && preview.shown() == Some(&PreviewTarget::Folder(folder.clone()))
      {
        state.preview_items = Some(items.clone().into());
      }
      match change {
        Some(change) if index == active => {
          track.request_slide(change.from, change.to);
          active_change = Some(change);
        },
        Some(change) => {
          track.snap_to(change.to);
        },
        None => {},
      }
      if index == active {
        preview.sync(state, now);
      }
      self.persist_tab_at(index);
    }
    active_change
  }

  /// Re-fetches `folder` and applies the result.
  pub async fn refresh(&mut self, folder: Option<&FolderId>, now: Instant) -> FetchResult<Option<DepthChange>> {
    let items = self.store.list_children(folder).await?;
    Ok(self.apply_listing(folder, items, now))
  }

  pub fn set_column_width(&mut self, column_width: f32) {
    for tab in self.tabs.tabs_mut() {
      let depth = tab.state().depth();
      tab.track_mut().set_column_width(column_width, depth);
    }
  }

  pub fn set_reduced_motion(&mut self, reduced_motion: bool) {
    for tab in self.tabs.tabs_mut() {
      tab.track_mut().set_reduced_motion(reduced_motion);
    }
  }

  /// Advances the active tab's slide by one frame.
  pub fn tick(&mut self, dt: Duration) -> Frame {
    self.tabs.active_mut().track_mut().tick(dt)
  }

  /// Completion reported by a host that runs the slide itself.
  pub fn complete_slide(&mut self, id: SlideId) -> Option<DeferredEffects> {
    self.tabs.active_mut().track_mut().complete(id)
  }

  /// Fetches the active tab's preview if its debounce elapsed and no slide
  /// is running. Returns whether a preview was applied.
  pub async fn poll_preview(&mut self, now: Instant) -> bool {
    let tab = self.tabs.active_mut();
    let (state, track, preview) = tab.parts_mut();
    let Some(request) = preview.poll(now, track.is_sliding()) else {
      return false;
    };
    let payload = load_preview(&self.store, &self.store, &request).await;
    preview.finish(state, request, payload)
  }

  fn breadcrumb(&mut self, depth: usize, now: Instant) -> FinderEvent {
    let state = self.state();
    if state.depth() == Some(depth) {
      let index_item = state
        .active_column()
        .and_then(ColumnEntry::folder_id)
        .and_then(|folder| self.store.index_item(folder));
      return match index_item {
        Some(item) => FinderEvent::OpenItem(item),
        None => FinderEvent::None,
      };
    }
    self.go_to_depth(depth, now)
  }

  async fn click_row(&mut self, column: usize, index: usize, activate: bool, now: Instant) -> FinderEvent {
    let Some(from) = self.depth() else {
      return FinderEvent::None;
    };
    if column > from {
      return FinderEvent::None;
    }

    let state = self.tabs.active_mut().state_mut();
    if column < from
      && let Err(err) = state.go_to_depth(column)
    {
      return FinderEvent::Rejected(err);
    }
    let focus = state.set_focus(index);
    let item = state.focused_item().cloned();
    let moved = DepthChange {
      from: Some(from),
      to:   column,
    };

    let enter = activate || column < from;
    match item {
      Some(ListItem::Folder { id, .. }) if enter => {
        let tab = self.tabs.active_mut();
        match tab.state_mut().go_deeper(&self.store, &id).await {
          Ok(change) => {
            self.settle(
              DepthChange {
                from: Some(from),
                to:   change.to,
              },
              now,
            )
          },
          Err(err) => {
            if column != from {
              self.settle(moved, now);
            }
            FinderEvent::Rejected(err)
          },
        }
      },
      Some(ListItem::Note { id, .. }) if activate => {
        if column != from {
          self.settle(moved, now);
        }
        FinderEvent::OpenItem(id)
      },
      _ if column != from => self.settle(moved, now),
      _ => self.focus_moved(focus, now),
    }
  }

  async fn tab_switched(&mut self, switched: bool, now: Instant) -> FinderEvent {
    if !switched {
      return FinderEvent::None;
    }
    if let Err(err) = self.ensure_active_root(now).await {
      tracing::warn!(%err, "root listing unavailable");
    }
    self.sync_preview(now);
    self.persist_tabs();
    FinderEvent::Tabs
  }

  async fn ensure_active_root(&mut self, now: Instant) -> navigation::Result<()> {
    let tab = self.tabs.active_mut();
    if tab.state().is_initialized() {
      return Ok(());
    }
    let change = tab
      .state_mut()
      .open_root(&self.store, &self.root_title)
      .await?;
    tab.follow(change);
    self.sync_preview(now);
    self.persist_active();
    Ok(())
  }

  fn navigated(&mut self, result: navigation::Result<DepthChange>, now: Instant) -> FinderEvent {
    match result {
      Ok(change) => self.settle(change, now),
      Err(err) => {
        tracing::debug!(%err, "navigation rejected");
        FinderEvent::Rejected(err)
      },
    }
  }

  fn maybe_navigated(&mut self, result: navigation::Result<Option<DepthChange>>, now: Instant) -> FinderEvent {
    match result {
      Ok(Some(change)) => self.settle(change, now),
      Ok(None) => FinderEvent::None,
      Err(err) => {
        tracing::debug!(%err, "navigation rejected");
        FinderEvent::Rejected(err)
      },
    }
  }

  /// Hands a settled depth change to the track, preview and store.
  fn settle(&mut self, change: DepthChange, now: Instant) -> FinderEvent {
    let tab = self.tabs.active_mut();
    let slide = tab.follow(change);
    let (state, track, preview) = tab.parts_mut();
    preview.sync(state, now);
    if let SlideOutcome::Animating(_) = slide {
      track.defer(DeferredEffects {
        preview:          true,
        scroll_into_view: true,
      });
    }
    tracing::debug!(from = ?change.from, to = change.to, "depth settled");
    self.persist_active();
    FinderEvent::Navigated { change, slide }
  }

  fn focus_moved(&mut self, change: Option<FocusChange>, now: Instant) -> FinderEvent {
    let Some(change) = change else {
      return FinderEvent::None;
    };
    self.sync_preview(now);
    self.persist_active();
    FinderEvent::Focus(change)
  }

  fn sync_preview(&mut self, now: Instant) {
    let (state, _, preview) = self.tabs.active_mut().parts_mut();
    preview.sync(state, now);
  }

  fn persist_active(&mut self) {
    let index = self.tabs.active_index();
    self.persist_tab_at(index);
  }

  fn persist_tab_at(&mut self, index: usize) {
    let Some(tab) = self.tabs.tabs().get(index) else {
      return;
    };
    let key = self.keys.tab(tab.id());
    match PersistedPath::capture(tab.state()) {
      Some(path) => persist::save(&mut *self.kv, &key, &path),
      None => self.kv.remove(&key),
    }
  }

  fn persist_tabs(&mut self) {
    let saved = PersistedTabs {
      tabs:   self.tabs.ids().into_iter().map(TabId::get).collect(),
      active: self.tabs.active_index(),
    };
    persist::save(&mut *self.kv, &self.keys.tabs(), &saved);
  }
}

use std::{
  cell::RefCell,
  collections::BTreeMap,
  rc::Rc,
  time::Duration,
};

use futures_executor::block_on;
use the_finder::{
  FolderId,
  ListItem,
  animation::{
    Easing,
    SlideOutcome,
    TrackAnimator,
  },
  navigation::{
    DeeperStep,
    NavigationError,
  },
  persist::{
    self,
    KeyValueStore,
    MemoryKeyValueStore,
    PersistedPath,
    restore_tab,
  },
  store::{
    FolderStore,
    MemoryFolderStore,
  },
  tab::TabState,
  tabs::TabManager,
};

const WIDTH: f32 = 100.0;

fn chain(depth: usize) -> MemoryFolderStore {
  let mut store = MemoryFolderStore::new().with_listing(None, vec![ListItem::folder("d1", "Level 1")]);
  for level in 1..=depth {
    let mut items = Vec::new();
    if level < depth {
      items.push(ListItem::folder(format!("d{}", level + 1), format!("Level {}", level + 1)));
    }
    items.push(ListItem::note(format!("n{level}").as_str(), "Note"));
    store = store.with_listing(Some(format!("d{level}").as_str()), items);
  }
  store
}

fn drilled(store: &MemoryFolderStore, levels: usize) -> TabState {
  let mut tab = TabState::new();
  block_on(tab.open_root(store, "Home")).unwrap();
  for level in 1..=levels {
    block_on(tab.go_deeper(store, &FolderId::from(format!("d{level}")))).unwrap();
  }
  tab
}

#[test]
fn stale_completion_never_overwrites_second_target() {
  let store = chain(4);
  let mut tab = drilled(&store, 4);
  let painted = Rc::new(RefCell::new(Vec::new()));
  let mut track = TrackAnimator::new(WIDTH, Duration::from_millis(200), Easing::EaseOutCubic);
  track.snap_to(4);
  let sink = painted.clone();
  track.set_sink(move |x: f32| sink.borrow_mut().push(x));

  let first = tab.go_to_depth(1).unwrap().unwrap();
  let first_slide = track.request_slide(first.from, first.to);
  track.tick(Duration::from_millis(50));

  let second = tab.go_to_depth(3).unwrap().unwrap();
  let second_slide = track.request_slide(second.from, second.to);
  assert!(matches!(second_slide, SlideOutcome::Animating(_)));

  // The first slide's completion arrives late and must be ignored.
  assert_eq!(track.complete(first_slide.id()), None);
  assert!(track.is_sliding());

  track.tick(Duration::from_secs(1));
  assert_eq!(track.rendered_track_x(), -3.0 * WIDTH);
  assert_eq!(track.complete(first_slide.id()), None);
  assert_eq!(track.rendered_track_x(), -3.0 * WIDTH);
  assert_eq!(painted.borrow().last().copied(), Some(-3.0 * WIDTH));
  assert_eq!(tab.depth(), Some(3));
}

#[test]
fn two_go_deeper_calls_before_fetch_append_one_column() {
  let store = chain(2);
  let mut tab = drilled(&store, 0);

  let DeeperStep::Fetch(ticket) = tab.begin_go_deeper(&FolderId::from("d1")).unwrap() else {
    panic!("first entry must fetch");
  };
  assert_eq!(
    tab.begin_go_deeper(&FolderId::from("d1")),
    Err(NavigationError::Busy)
  );

  let items = block_on(store.list_children(ticket.folder())).unwrap();
  tab.finish_fetch(ticket, Ok(items)).unwrap();
  assert_eq!(tab.columns().len(), 2);
  assert_eq!(tab.depth(), Some(1));
}

#[test]
fn shallower_then_deeper_reuses_column_without_fetch() {
  let store = chain(3);
  let mut tab = drilled(&store, 2);
  let before = tab.columns()[2].clone();
  let fetches = store.fetch_count();

  tab.go_shallower().unwrap();
  block_on(tab.go_deeper(&store, &FolderId::from("d2"))).unwrap();

  assert_eq!(store.fetch_count(), fetches);
  assert!(std::sync::Arc::ptr_eq(tab.columns()[2].items(), before.items()));
}

#[test]
fn depth_stays_in_range_over_mixed_navigation() {
  let store = chain(5);
  let mut tab = drilled(&store, 3);
  let steps: [fn(&mut TabState, &MemoryFolderStore); 5] = [
    |tab, _| {
      let _ = tab.go_shallower();
    },
    |tab, store| {
      let next = tab
        .focused_item()
        .and_then(ListItem::folder_id)
        .cloned();
      if let Some(next) = next {
        let _ = block_on(tab.go_deeper(store, &next));
      }
    },
    |tab, _| {
      let _ = tab.go_to_depth(99);
    },
    |tab, _| {
      tab.move_focus(1);
    },
    |tab, _| {
      let _ = tab.go_to_depth(0);
    },
  ];
  for round in 0..50 {
    steps[round * 7 % steps.len()](&mut tab, &store);
    let depth = tab.depth().unwrap();
    assert!(depth < tab.columns().len());
  }
}

#[test]
fn persisted_focus_round_trips_and_clamps() {
  let persisted = PersistedPath {
    path:  vec!["f1".into(), "f2".into()],
    focus: BTreeMap::from([("f1".to_string(), 2), ("f2".to_string(), 0)]),
  };
  let mut kv = MemoryKeyValueStore::new();
  persist::save(&mut kv, "finder.tab.1.v1", &persisted);
  assert!(kv.get("finder.tab.1.v1").is_some());
  let loaded: PersistedPath = persist::load(&kv, "finder.tab.1.v1").unwrap();

  let f1 = |count: usize| {
    let mut items = vec![ListItem::folder("f2", "F2")];
    items.extend((1..count).map(|i| ListItem::note(format!("n{i}").as_str(), "Note")));
    items
  };
  let store = |count: usize| {
    MemoryFolderStore::new()
      .with_listing(None, vec![ListItem::folder("f1", "F1")])
      .with_listing(Some("f1"), f1(count))
      .with_listing(Some("f2"), vec![ListItem::note("leaf", "Leaf")])
  };

  let mut tab = TabState::new();
  block_on(restore_tab(&mut tab, &store(5), loaded.clone(), "Home")).unwrap();
  assert_eq!(tab.columns()[1].focused_index(), 2);
  assert_eq!(tab.columns()[2].focused_index(), 0);

  let mut tab = TabState::new();
  block_on(restore_tab(&mut tab, &store(1), loaded, "Home")).unwrap();
  assert_eq!(tab.columns()[1].focused_index(), 0);
}

#[test]
fn closing_only_tab_leaves_one_uninitialized_tab() {
  let store = chain(1);
  let mut manager = TabManager::default();
  block_on(manager.active_mut().state_mut().open_root(&store, "Home")).unwrap();

  let only = manager.active_id();
  manager.close(only);
  assert_eq!(manager.len(), 1);
  assert!(!manager.active().state().is_initialized());
  assert_eq!(manager.active().state().depth_index(), -1);
}

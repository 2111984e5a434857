//! Key and pointer routing.
//!
//! Events pass the suppression checks first (text entry, open overlay) and
//! only then reach the keymap. Multi-key sequences such as `g g` are kept
//! pending until they resolve, are broken by an unrelated key, or time out.

use std::{
  collections::HashMap,
  fmt,
  str::FromStr,
  time::{
    Duration,
    Instant,
  },
};

use serde::Deserialize;
use smallvec::SmallVec;
use thiserror::Error;

/// Default window for completing a key sequence.
pub const CHORD_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
  bits: u8,
}

impl Modifiers {
  pub const CTRL: u8 = 0b0000_0001;
  pub const ALT: u8 = 0b0000_0010;
  pub const SHIFT: u8 = 0b0000_0100;

  #[must_use]
  pub const fn empty() -> Self {
    Self { bits: 0 }
  }

  #[must_use]
  pub const fn is_empty(self) -> bool {
    self.bits == 0
  }

  #[must_use]
  pub const fn ctrl(self) -> bool {
    (self.bits & Self::CTRL) != 0
  }

  #[must_use]
  pub const fn alt(self) -> bool {
    (self.bits & Self::ALT) != 0
  }

  #[must_use]
  pub const fn shift(self) -> bool {
    (self.bits & Self::SHIFT) != 0
  }

  pub fn insert(&mut self, bits: u8) {
    self.bits |= bits;
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
  Char(char),
  Enter,
  Escape,
  Backspace,
  Tab,
  Home,
  End,
  PageUp,
  PageDown,
  Left,
  Right,
  Up,
  Down,
  Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
  pub key:       Key,
  pub modifiers: Modifiers,
}

impl KeyEvent {
  pub const fn plain(key: Key) -> Self {
    Self {
      key,
      modifiers: Modifiers::empty(),
    }
  }
}

impl FromStr for KeyEvent {
  type Err = ParseKeyBindingError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    KeyBinding::from_str(s).map(|binding| binding.to_key_event())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
  pub code:  Key,
  pub shift: bool,
  pub ctrl:  bool,
  pub alt:   bool,
}

impl KeyBinding {
  pub const fn new(code: Key) -> Self {
    Self {
      code,
      shift: false,
      ctrl: false,
      alt: false,
    }
  }

  pub const fn with_modifiers(mut self, shift: bool, ctrl: bool, alt: bool) -> Self {
    self.shift = shift;
    self.ctrl = ctrl;
    self.alt = alt;
    self
  }

  /// Uppercase characters already carry the shift, so it is dropped from
  /// the binding to let `G` match both `G` and `S-G` events.
  pub fn from_key_event(event: &KeyEvent) -> Self {
    let shift = match event.key {
      Key::Char(c) if c.is_uppercase() => false,
      _ => event.modifiers.shift(),
    };
    Self {
      code: event.key,
      shift,
      ctrl: event.modifiers.ctrl(),
      alt: event.modifiers.alt(),
    }
  }

  #[must_use]
  pub fn to_key_event(&self) -> KeyEvent {
    let mut modifiers = Modifiers::empty();
    if self.ctrl {
      modifiers.insert(Modifiers::CTRL);
    }
    if self.alt {
      modifiers.insert(Modifiers::ALT);
    }
    if self.shift {
      modifiers.insert(Modifiers::SHIFT);
    }
    KeyEvent {
      key: self.code,
      modifiers,
    }
  }
}

impl fmt::Display for KeyBinding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.ctrl {
      f.write_str("C-")?;
    }
    if self.alt {
      f.write_str("A-")?;
    }
    if self.shift {
      f.write_str("S-")?;
    }
    match self.code {
      Key::Char(' ') => f.write_str("space"),
      Key::Char(c) => write!(f, "{c}"),
      Key::Enter => f.write_str("ret"),
      Key::Escape => f.write_str("esc"),
      Key::Backspace => f.write_str("bs"),
      Key::Tab => f.write_str("tab"),
      Key::Home => f.write_str("home"),
      Key::End => f.write_str("end"),
      Key::PageUp => f.write_str("pgup"),
      Key::PageDown => f.write_str("pgdown"),
      Key::Left => f.write_str("left"),
      Key::Right => f.write_str("right"),
      Key::Up => f.write_str("up"),
      Key::Down => f.write_str("down"),
      Key::Other => f.write_str("other"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseKeyBindingError(pub String);

impl FromStr for KeyBinding {
  type Err = ParseKeyBindingError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(ParseKeyBindingError("empty key literal".into()));
    }
    if trimmed == "-" {
      return Ok(KeyBinding::new(Key::Char('-')));
    }

    let mut tokens: Vec<_> = trimmed.split('-').collect();
    let key_token = tokens
      .pop()
      .ok_or_else(|| ParseKeyBindingError("missing key token".into()))?;

    let mut binding = KeyBinding::new(parse_key_token(key_token)?);
    for token in tokens {
      let modifier = token.trim();
      let slot = match modifier.to_ascii_uppercase().as_str() {
        "S" | "SHIFT" => &mut binding.shift,
        "C" | "CTRL" | "CONTROL" => &mut binding.ctrl,
        "A" | "ALT" => &mut binding.alt,
        _ => {
          return Err(ParseKeyBindingError(format!(
            "invalid key modifier '{modifier}-'"
          )));
        },
      };
      if *slot {
        return Err(ParseKeyBindingError(format!(
          "repeated key modifier '{modifier}-'"
        )));
      }
      *slot = true;
    }
    Ok(binding)
  }
}

fn parse_key_token(token: &str) -> Result<Key, ParseKeyBindingError> {
  let mut chars = token.chars();
  if let (Some(c), None) = (chars.next(), chars.next()) {
    return Ok(Key::Char(c));
  }

  match token.to_ascii_lowercase().as_str() {
    "space" => Ok(Key::Char(' ')),
    "minus" => Ok(Key::Char('-')),
    "slash" => Ok(Key::Char('/')),
    "enter" | "ret" | "return" => Ok(Key::Enter),
    "esc" | "escape" => Ok(Key::Escape),
    "backspace" | "bs" => Ok(Key::Backspace),
    "tab" => Ok(Key::Tab),
    "home" => Ok(Key::Home),
    "end" => Ok(Key::End),
    "pageup" | "pgup" => Ok(Key::PageUp),
    "pagedown" | "pgdown" => Ok(Key::PageDown),
    "left" => Ok(Key::Left),
    "right" => Ok(Key::Right),
    "up" => Ok(Key::Up),
    "down" => Ok(Key::Down),
    invalid => Err(ParseKeyBindingError(format!("unknown key '{invalid}'"))),
  }
}

/// Parses a space separated key sequence such as `"g g"` or `"C-t"`.
pub fn parse_sequence(sequence: &str) -> Result<SmallVec<[KeyBinding; 2]>, ParseKeyBindingError> {
  let keys = sequence
    .split_whitespace()
    .map(KeyBinding::from_str)
    .collect::<Result<SmallVec<[KeyBinding; 2]>, _>>()?;
  if keys.is_empty() {
    return Err(ParseKeyBindingError("empty key sequence".into()));
  }
  Ok(keys)
}

/// What a bound key asks the finder to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinderAction {
  FocusNext,
  FocusPrev,
  FocusFirst,
  FocusLast,
  PageDown,
  PageUp,
  /// Enter the focused folder, or open the focused note.
  Activate,
  Shallower,
  NewTab,
  CloseTab,
  NextTab,
  PrevTab,
  /// Activate the tab at this zero-based index.
  SwitchTab(u8),
  OpenPalette,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyTrie {
  Action(FinderAction),
  Node(HashMap<KeyBinding, KeyTrie>),
}

fn insert_sequence(map: &mut HashMap<KeyBinding, KeyTrie>, keys: &[KeyBinding], action: FinderAction) {
  match keys {
    [] => {},
    [last] => {
      map.insert(*last, KeyTrie::Action(action));
    },
    [first, rest @ ..] => {
      let child = map
        .entry(*first)
        .or_insert_with(|| KeyTrie::Node(HashMap::new()));
      if matches!(child, KeyTrie::Action(_)) {
        *child = KeyTrie::Node(HashMap::new());
      }
      if let KeyTrie::Node(children) = child {
        insert_sequence(children, rest, action);
      }
    },
  }
}

/// Key sequence to action map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
  root: HashMap<KeyBinding, KeyTrie>,
}

impl Keymap {
  pub fn empty() -> Self {
    Self {
      root: HashMap::new(),
    }
  }

  /// Binds `sequence`, replacing any binding that shares its prefix.
  pub fn bind(&mut self, sequence: &str, action: FinderAction) -> Result<(), ParseKeyBindingError> {
    let keys = parse_sequence(sequence)?;
    insert_sequence(&mut self.root, &keys, action);
    Ok(())
  }

  fn lookup(&self, keys: &[KeyBinding]) -> Option<&KeyTrie> {
    let (first, rest) = keys.split_first()?;
    let mut trie = self.root.get(first)?;
    for key in rest {
      trie = match trie {
        KeyTrie::Node(map) => map.get(key)?,
        KeyTrie::Action(_) => return None,
      };
    }
    Some(trie)
  }
}

impl Default for Keymap {
  fn default() -> Self {
    use FinderAction::*;

    let mut keymap = Self::empty();
    let bindings = [
      ("j", FocusNext),
      ("down", FocusNext),
      ("k", FocusPrev),
      ("up", FocusPrev),
      ("g g", FocusFirst),
      ("home", FocusFirst),
      ("G", FocusLast),
      ("end", FocusLast),
      ("pgdown", PageDown),
      ("pgup", PageUp),
      ("l", Activate),
      ("right", Activate),
      ("ret", Activate),
      ("h", Shallower),
      ("left", Shallower),
      ("bs", Shallower),
      ("C-t", NewTab),
      ("C-w", CloseTab),
      ("tab", NextTab),
      ("S-tab", PrevTab),
      ("/", OpenPalette),
      ("C-k", OpenPalette),
    ];
    for (sequence, action) in bindings {
      if let Err(err) = keymap.bind(sequence, action) {
        tracing::error!(sequence, %err, "invalid default binding");
      }
    }
    for digit in 1..=9u8 {
      let sequence = format!("A-{digit}");
      if let Err(err) = keymap.bind(&sequence, SwitchTab(digit - 1)) {
        tracing::error!(%sequence, %err, "invalid default binding");
      }
    }
    keymap
  }
}

/// Host state consulted before any key is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputContext {
  /// The event target is a text entry control.
  pub text_input_focused: bool,
  /// The jump/search palette (or another modal overlay) is open.
  pub overlay_open:       bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppressed {
  TextInput,
  Overlay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRoute {
  /// The event belongs to something else and must not be handled.
  Ignored(Suppressed),
  /// Waiting for the next key of a sequence.
  Pending,
  /// A pending sequence was abandoned with escape.
  Cancelled,
  Action(FinderAction),
  Unbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
  Primary,
  Secondary,
  Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
  /// A row of a column.
  Row { column: usize, index: usize },
  /// Breadcrumb segment for the column at `depth`.
  Breadcrumb { depth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
  pub target:      PointerTarget,
  pub button:      PointerButton,
  pub click_count: u8,
}

impl PointerEvent {
  pub const fn click(target: PointerTarget) -> Self {
    Self {
      target,
      button: PointerButton::Primary,
      click_count: 1,
    }
  }

  pub const fn double_click(target: PointerTarget) -> Self {
    Self {
      target,
      button: PointerButton::Primary,
      click_count: 2,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerRoute {
  Ignored(Suppressed),
  /// Focus (and with `activate`, enter or open) a row.
  Row {
    column:   usize,
    index:    usize,
    activate: bool,
  },
  GoToDepth(usize),
  Unbound,
}

#[derive(Debug, Clone)]
pub struct InputRouter {
  keymap:        Keymap,
  pending:       SmallVec<[KeyBinding; 2]>,
  pending_since: Option<Instant>,
  chord_timeout: Duration,
}

impl Default for InputRouter {
  fn default() -> Self {
    Self::new(Keymap::default(), CHORD_TIMEOUT)
  }
}

impl InputRouter {
  pub fn new(keymap: Keymap, chord_timeout: Duration) -> Self {
    Self {
      keymap,
      pending: SmallVec::new(),
      pending_since: None,
      chord_timeout,
    }
  }

  pub fn keymap_mut(&mut self) -> &mut Keymap {
    &mut self.keymap
  }

  pub fn pending(&self) -> &[KeyBinding] {
    &self.pending
  }

  pub fn reset(&mut self) {
    self.pending.clear();
    self.pending_since = None;
  }

  fn suppression(context: InputContext) -> Option<Suppressed> {
    if context.text_input_focused {
      Some(Suppressed::TextInput)
    } else if context.overlay_open {
      Some(Suppressed::Overlay)
    } else {
      None
    }
  }

  pub fn route_key(&mut self, event: &KeyEvent, context: InputContext, now: Instant) -> KeyRoute {
    if let Some(reason) = Self::suppression(context) {
      self.reset();
      return KeyRoute::Ignored(reason);
    }

    let expired = self
      .pending_since
      .is_some_and(|since| now.saturating_duration_since(since) > self.chord_timeout);
    if expired {
      tracing::trace!(pending = self.pending.len(), "key sequence timed out");
      self.reset();
    }

    let binding = KeyBinding::from_key_event(event);
    if binding.code == Key::Escape && !self.pending.is_empty() {
      self.reset();
      return KeyRoute::Cancelled;
    }

    if !self.pending.is_empty() {
      self.pending.push(binding);
      match self.keymap.lookup(&self.pending) {
        Some(KeyTrie::Action(action)) => {
          let action = *action;
          self.reset();
          return KeyRoute::Action(action);
        },
        Some(KeyTrie::Node(_)) => return KeyRoute::Pending,
        // Unrelated key: drop the sequence and treat the key on its own.
        None => self.reset(),
      }
    }

    match self.keymap.lookup(&[binding]) {
      Some(KeyTrie::Action(action)) => KeyRoute::Action(*action),
      Some(KeyTrie::Node(_)) => {
        self.pending.push(binding);
        self.pending_since = Some(now);
        KeyRoute::Pending
      },
      None => KeyRoute::Unbound,
    }
  }

  pub fn route_pointer(&mut self, event: &PointerEvent, context: InputContext) -> PointerRoute {
    if let Some(reason) = Self::suppression(context) {
      return PointerRoute::Ignored(reason);
    }
    if event.button != PointerButton::Primary {
      return PointerRoute::Unbound;
    }
    self.reset();
    match event.target {
      PointerTarget::Row { column, index } => {
        PointerRoute::Row {
          column,
          index,
          activate: event.click_count >= 2,
        }
      },
      PointerTarget::Breadcrumb { depth } => PointerRoute::GoToDepth(depth),
    }
  }
}

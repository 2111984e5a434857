//! Replays a key script against a finder with a virtual clock.

use std::time::{
  Duration,
  Instant,
};

use anyhow::{
  Context,
  Result,
  bail,
};
use the_finder::{
  Finder,
  FinderEvent,
  FolderStore,
  PreviewSource,
  input::{
    InputContext,
    KeyEvent,
    PointerEvent,
    PointerTarget,
  },
};

/// One frame at 60 Hz.
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
  Key(KeyEvent),
  Pointer(PointerEvent),
}

/// Parses a script token. Plain tokens are key literals (`j`, `C-t`, `ret`);
/// `click:COLUMN:ROW`, `open:COLUMN:ROW` and `crumb:DEPTH` are pointer
/// events.
pub fn parse_step(token: &str) -> Result<Step> {
  let mut parts = token.split(':');
  let head = parts.next().unwrap_or_default();
  let numbers = parts
    .map(|part| {
      part
        .parse::<usize>()
        .with_context(|| format!("bad number in '{token}'"))
    })
    .collect::<Result<Vec<_>>>()?;

  let step = match (head, numbers.as_slice()) {
    ("click", &[column, index]) => {
      Step::Pointer(PointerEvent::click(PointerTarget::Row { column, index }))
    },
    ("open", &[column, index]) => {
      Step::Pointer(PointerEvent::double_click(PointerTarget::Row { column, index }))
    },
    ("crumb", &[depth]) => Step::Pointer(PointerEvent::click(PointerTarget::Breadcrumb { depth })),
    (_, []) => {
      Step::Key(
        token
          .parse()
          .with_context(|| format!("bad key '{token}'"))?,
      )
    },
    _ => bail!("unrecognised step '{token}'"),
  };
  Ok(step)
}

pub struct Replay {
  clock:            Instant,
  preview_debounce: Duration,
  pub events:       Vec<FinderEvent>,
}

impl Replay {
  pub fn new(preview_debounce: Duration) -> Self {
    Self {
      clock: Instant::now(),
      preview_debounce,
      events: Vec::new(),
    }
  }

  pub fn now(&self) -> Instant {
    self.clock
  }

  /// Applies one step, lets any slide run to completion and then gives the
  /// preview a chance to load.
  pub async fn step<S>(&mut self, finder: &mut Finder<S>, step: &Step) -> FinderEvent
  where
    S: FolderStore + PreviewSource,
  {
    let cx = InputContext::default();
    let event = match step {
      Step::Key(key) => finder.handle_key(key, cx, self.clock).await,
      Step::Pointer(pointer) => finder.handle_pointer(pointer, cx, self.clock).await,
    };
    log::debug!("{step:?} -> {event:?}");

    while finder.is_sliding() {
      self.clock += FRAME;
      finder.tick(FRAME);
    }
    self.clock += self.preview_debounce;
    finder.poll_preview(self.clock).await;

    self.events.push(event.clone());
    event
  }

  pub async fn run<S>(&mut self, finder: &mut Finder<S>, tokens: &[String]) -> Result<()>
  where
    S: FolderStore + PreviewSource,
  {
    let steps = tokens
      .iter()
      .map(|token| parse_step(token))
      .collect::<Result<Vec<_>>>()?;
    for step in &steps {
      self.step(finder, step).await;
    }
    Ok(())
  }
}

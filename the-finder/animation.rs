//! Horizontal track animation for the column stack.
//!
//! The track is the strip holding every column; sliding it left or right is
//! the only animation the finder runs. [`TrackAnimator`] owns the painted
//! offset (`rendered_track_x`) and is the only writer of it. Each slide
//! request allocates a fresh [`SlideId`]; completions carrying an older id are
//! ignored, so a slow first slide can never overwrite the resting position of
//! a faster second one.

use std::{
  fmt,
  time::Duration,
};

use serde::Deserialize;

/// Default slide duration.
pub const SLIDE_DURATION: Duration = Duration::from_millis(220);

/// Default column width in logical pixels.
pub const COLUMN_WIDTH: f32 = 280.0;

/// Curve applied to slide progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
  Linear,
  EaseOutQuad,
  #[default]
  EaseOutCubic,
  EaseOutQuart,
  EaseInOutCubic,
}

impl Easing {
  /// Maps linear progress in `[0, 1]` onto the curve.
  pub fn apply(self, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match self {
      Easing::Linear => t,
      Easing::EaseOutQuad => t * (2.0 - t),
      Easing::EaseOutCubic => {
        let t = t - 1.0;
        t * t * t + 1.0
      },
      Easing::EaseOutQuart => {
        let t = t - 1.0;
        1.0 - t * t * t * t
      },
      Easing::EaseInOutCubic => {
        if t < 0.5 {
          4.0 * t * t * t
        } else {
          let t = 2.0 * t - 2.0;
          1.0 + t * t * t / 2.0
        }
      },
    }
  }
}

/// Values a slide can interpolate.
pub trait Animatable: Clone {
  fn lerp(&self, target: &Self, t: f32) -> Self;
}

impl Animatable for f32 {
  fn lerp(&self, target: &Self, t: f32) -> Self {
    self + (target - self) * t
  }
}

/// Interpolation from `start` to `target` over a fixed duration.
#[derive(Debug, Clone)]
pub struct Animation<T: Animatable> {
  start:    T,
  target:   T,
  current:  T,
  /// Seconds.
  duration: f32,
  elapsed:  f32,
  easing:   Easing,
}

impl<T: Animatable> Animation<T> {
  pub fn new(start: T, target: T, duration: Duration, easing: Easing) -> Self {
    Self {
      current: start.clone(),
      start,
      target,
      duration: duration.as_secs_f32(),
      elapsed: 0.0,
      easing,
    }
  }

  /// Advances by `dt` seconds; `true` once the target is reached.
  pub fn update(&mut self, dt: f32) -> bool {
    self.elapsed += dt;

    if self.elapsed >= self.duration {
      self.current = self.target.clone();
      true
    } else {
      let t = self.elapsed / self.duration;
      self.current = self.start.lerp(&self.target, self.easing.apply(t));
      false
    }
  }

  pub fn current(&self) -> &T {
    &self.current
  }

  pub fn target(&self) -> &T {
    &self.target
  }

  pub fn is_complete(&self) -> bool {
    self.elapsed >= self.duration
  }
}

/// Generation id of a slide request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SlideId(u64);

impl SlideId {
  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for SlideId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "slide#{}", self.0)
  }
}

/// Receives every write of the track offset. Rendering backends subscribe
/// through this to apply the transform.
pub trait TransformSink {
  fn apply_transform(&mut self, track_x: f32);
}

impl<F: FnMut(f32)> TransformSink for F {
  fn apply_transform(&mut self, track_x: f32) {
    self(track_x)
  }
}

/// Work that competes with a slide for frame budget and therefore waits for
/// it to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeferredEffects {
  pub preview:          bool,
  pub scroll_into_view: bool,
}

impl DeferredEffects {
  pub fn is_empty(&self) -> bool {
    !self.preview && !self.scroll_into_view
  }

  fn merge(&mut self, other: DeferredEffects) {
    self.preview |= other.preview;
    self.scroll_into_view |= other.scroll_into_view;
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideOutcome {
  /// The offset was written directly; deferred effects may run now.
  Snapped {
    id:       SlideId,
    released: DeferredEffects,
  },
  /// A slide is in flight until `id` completes.
  Animating(SlideId),
}

impl SlideOutcome {
  pub fn id(&self) -> SlideId {
    match self {
      Self::Snapped { id, .. } | Self::Animating(id) => *id,
    }
  }
}

/// Result of advancing the animation by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
  pub track_x:  f32,
  /// Set on the frame that finished the slide, with the effects it released.
  pub finished: Option<DeferredEffects>,
}

/// Offset of column `index` relative to the viewport when `depth` is active.
pub fn column_offset(index: usize, depth: usize, column_width: f32) -> f32 {
  (index as f32 - depth as f32) * column_width
}

/// Track offset that left-aligns the column at `depth`.
pub fn track_offset(depth: usize, column_width: f32) -> f32 {
  column_offset(0, depth, column_width)
}

struct ActiveSlide {
  id:        SlideId,
  animation: Animation<f32>,
}

pub struct TrackAnimator {
  column_width:     f32,
  rendered_track_x: f32,
  current_id:       SlideId,
  active:           Option<ActiveSlide>,
  painted:          bool,
  reduced_motion:   bool,
  suspended:        usize,
  duration:         Duration,
  easing:           Easing,
  deferred:         DeferredEffects,
  sink:             Option<Box<dyn TransformSink>>,
}

impl fmt::Debug for TrackAnimator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TrackAnimator")
      .field("column_width", &self.column_width)
      .field("rendered_track_x", &self.rendered_track_x)
      .field("current_id", &self.current_id)
      .field("sliding", &self.active.is_some())
      .field("painted", &self.painted)
      .field("reduced_motion", &self.reduced_motion)
      .field("suspended", &self.suspended)
      .finish()
  }
}

impl Default for TrackAnimator {
  fn default() -> Self {
    Self::new(COLUMN_WIDTH, SLIDE_DURATION, Easing::default())
  }
}

impl TrackAnimator {
  pub fn new(column_width: f32, duration: Duration, easing: Easing) -> Self {
    Self {
      column_width,
      rendered_track_x: 0.0,
      current_id: SlideId::default(),
      active: None,
      painted: false,
      reduced_motion: false,
      suspended: 0,
      duration,
      easing,
      deferred: DeferredEffects::default(),
      sink: None,
    }
  }

  pub fn with_reduced_motion(mut self, reduced_motion: bool) -> Self {
    self.reduced_motion = reduced_motion;
    self
  }

  pub fn set_sink(&mut self, sink: impl TransformSink + 'static) {
    let mut sink: Box<dyn TransformSink> = Box::new(sink);
    sink.apply_transform(self.rendered_track_x);
    self.sink = Some(sink);
  }

  pub fn rendered_track_x(&self) -> f32 {
    self.rendered_track_x
  }

  pub fn is_sliding(&self) -> bool {
    self.active.is_some()
  }

  pub fn current_id(&self) -> SlideId {
    self.current_id
  }

  pub fn column_width(&self) -> f32 {
    self.column_width
  }

  pub fn set_reduced_motion(&mut self, reduced_motion: bool) {
    self.reduced_motion = reduced_motion;
  }

  /// Target offset of the slide in flight, if any.
  pub fn target_x(&self) -> Option<f32> {
    self
      .active
      .as_ref()
      .map(|slide| *slide.animation.target())
  }

  /// The single write path for the painted offset.
  fn write_track_x(&mut self, track_x: f32) {
    self.rendered_track_x = track_x;
    self.painted = true;
    if let Some(sink) = self.sink.as_mut() {
      sink.apply_transform(track_x);
    }
  }

  fn next_id(&mut self) -> SlideId {
    self.current_id = SlideId(self.current_id.0 + 1);
    if let Some(previous) = self.active.take() {
      tracing::trace!(cancelled = %previous.id, "slide superseded");
    }
    self.current_id
  }

  /// Animations stay off until every `suspend` is matched by a `resume`.
  pub fn suspend(&mut self) {
    self.suspended += 1;
  }

  pub fn resume(&mut self) {
    self.suspended = self.suspended.saturating_sub(1);
  }

  /// Runs `f` with animations suspended, so any slide it requests snaps.
  pub fn suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
    self.suspend();
    let result = f(self);
    self.resume();
    result
  }

  /// Places the track at `depth` without animating (first paint,
  /// rehydration).
  pub fn snap_to(&mut self, depth: usize) -> SlideOutcome {
    let id = self.next_id();
    self.write_track_x(track_offset(depth, self.column_width));
    SlideOutcome::Snapped {
      id,
      released: std::mem::take(&mut self.deferred),
    }
  }

  /// Slides the track from wherever it is painted to `to_depth`.
  ///
  /// `from_depth` is `None` when the tab had nothing on screen; such
  /// requests snap like first paint does.
  pub fn request_slide(&mut self, from_depth: Option<usize>, to_depth: usize) -> SlideOutcome {
    let snap = !self.painted || from_depth.is_none() || self.reduced_motion || self.suspended > 0;
    if snap {
      return self.snap_to(to_depth);
    }

    let id = self.next_id();
    let to_x = track_offset(to_depth, self.column_width);
    let from_x = self.rendered_track_x;
    if (from_x - to_x).abs() < f32::EPSILON {
      self.write_track_x(to_x);
      return SlideOutcome::Snapped {
        id,
        released: std::mem::take(&mut self.deferred),
      };
    }

    tracing::trace!(%id, from_x, to_x, "slide started");
    self.active = Some(ActiveSlide {
      id,
      animation: Animation::new(from_x, to_x, self.duration, self.easing),
    });
    SlideOutcome::Animating(id)
  }

  /// Applies a new column width. Any slide is dropped and the track snaps
  /// to the offset for `depth` under the new width.
  pub fn set_column_width(&mut self, column_width: f32, depth: Option<usize>) -> Option<SlideOutcome> {
    if (self.column_width - column_width).abs() < f32::EPSILON {
      return None;
    }
    self.column_width = column_width;
    depth.map(|depth| self.snap_to(depth))
  }

  /// Advances the slide in flight by `dt`.
  pub fn tick(&mut self, dt: Duration) -> Frame {
    let Some(slide) = self.active.as_mut() else {
      return Frame {
        track_x:  self.rendered_track_x,
        finished: None,
      };
    };
    let done = slide.animation.update(dt.as_secs_f32());
    let track_x = *slide.animation.current();
    let id = slide.id;
    self.write_track_x(track_x);

    let finished = if done { self.complete(id) } else { None };
    Frame {
      track_x: self.rendered_track_x,
      finished,
    }
  }

  /// Completion of slide `id`. Stale ids are ignored and return `None`;
  /// the current one lands the track on its target and releases deferred
  /// effects.
  pub fn complete(&mut self, id: SlideId) -> Option<DeferredEffects> {
    if id != self.current_id {
      tracing::trace!(%id, current = %self.current_id, "stale slide completion ignored");
      return None;
    }
    let slide = self.active.take()?;
    self.write_track_x(*slide.animation.target());
    tracing::trace!(%id, "slide finished");
    Some(std::mem::take(&mut self.deferred))
  }

  /// Queues `effects` if a slide is in flight. Returns the effects that may
  /// run right away.
  pub fn defer(&mut self, effects: DeferredEffects) -> DeferredEffects {
    if self.is_sliding() {
      self.deferred.merge(effects);
      DeferredEffects::default()
    } else {
      effects
    }
  }

  pub fn pending_effects(&self) -> DeferredEffects {
    self.deferred
  }
}

#![forbid(unsafe_code)]

//! Touch gesture listener: turns raw touch sequences into taps and pinches.
//!
//! [`GestureListener`] is a stateful processor fed every touch event of a
//! gesture. It runs three detectors side by side:
//!
//! - **Tap detector**: a single finger that goes down and up without moving
//!   beyond the tap slop emits `SingleTap`; a second tap close in time and
//!   space emits `DoubleTap` instead.
//! - **Long-press detector**: a finger held stationary beyond the threshold
//!   emits `LongPress` once, from [`check_long_press`](GestureListener::check_long_press).
//! - **Pinch detector**: a second finger going down starts a pinch; moves
//!   while two fingers are down emit `PinchScale`; lifting either ends it.
//!
//! # Invariants
//!
//! 1. A tap and a pinch never both emit for one gesture. Once a second
//!    finger lands, the tap candidate is discarded.
//! 2. A gesture that fired `LongPress` does not also emit a tap.
//! 3. `PinchStart` is always followed by exactly one `PinchEnd` (or a
//!    `reset()`).
//! 4. After `reset()`, all detectors return to idle.
//!
//! # Failure Modes
//!
//! - Touch-cancel ends a pinch and drops the tap candidate without emitting
//!   a tap.
//! - Touch points beyond the second are tracked but do not affect the pinch.

use std::time::Duration;

use smallvec::SmallVec;
use web_time::Instant;

use crate::event::{MultiTouchInput, SingleTouch, TouchKind};
use crate::geometry::ScreenPoint;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds and timeouts for gesture detection.
#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Time window between taps for double-tap detection (default: 300ms).
    pub double_tap_timeout: Duration,
    /// Hold time before a stationary touch is a long press (default: 500ms).
    pub long_press_threshold: Duration,
    /// Longest touch that still counts as a tap (default: 400ms).
    pub max_tap_duration: Duration,
    /// Movement (screen px) that turns a touch from a tap into a pan (default: 10).
    pub tap_slop: f32,
    /// Distance (screen px) between two taps that still makes a double tap (default: 40).
    pub double_tap_slop: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_tap_timeout: Duration::from_millis(300),
            long_press_threshold: Duration::from_millis(500),
            max_tap_duration: Duration::from_millis(400),
            tap_slop: 10.0,
            double_tap_slop: 40.0,
        }
    }
}

/// Gestures recognized from touch input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    SingleTap {
        point: ScreenPoint,
    },
    DoubleTap {
        point: ScreenPoint,
    },
    LongPress {
        point: ScreenPoint,
        duration: Duration,
    },
    PinchStart {
        focus: ScreenPoint,
        span: f32,
    },
    PinchScale {
        focus: ScreenPoint,
        span: f32,
        previous_span: f32,
    },
    PinchEnd {
        focus: ScreenPoint,
        span: f32,
    },
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct TapCandidate {
    start: ScreenPoint,
    time: Instant,
}

#[derive(Debug, Clone, Copy)]
struct PinchTracker {
    focus: ScreenPoint,
    span: f32,
}

// ---------------------------------------------------------------------------
// GestureListener
// ---------------------------------------------------------------------------

/// Stateful touch gesture listener.
///
/// Call [`process`](GestureListener::process) for each touch event and
/// [`check_long_press`](GestureListener::check_long_press) periodically.
pub struct GestureListener {
    config: GestureConfig,
    touches: SmallVec<[SingleTouch; 4]>,
    tap: Option<TapCandidate>,
    last_tap: Option<(ScreenPoint, Instant)>,
    long_press: Option<(ScreenPoint, Instant)>,
    long_press_fired: bool,
    pinch: Option<PinchTracker>,
}

impl std::fmt::Debug for GestureListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureListener")
            .field("touches", &self.touches.len())
            .field("pinching", &self.is_pinching())
            .finish()
    }
}

impl Default for GestureListener {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

fn span_and_focus(a: ScreenPoint, b: ScreenPoint) -> (f32, ScreenPoint) {
    ((b - a).length(), a.lerp(b, 0.5))
}

impl GestureListener {
    /// Create a listener with the given configuration.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            touches: SmallVec::new(),
            tap: None,
            last_tap: None,
            long_press: None,
            long_press_fired: false,
            pinch: None,
        }
    }

    /// Process a touch event, returning the gestures it completes.
    pub fn process(
        &mut self,
        event: &MultiTouchInput,
        now: Instant,
    ) -> SmallVec<[GestureEvent; 2]> {
        let mut out = SmallVec::new();
        match event.kind {
            TouchKind::Start => self.on_start(event, now, &mut out),
            TouchKind::Move => self.on_move(event, &mut out),
            TouchKind::End => self.on_end(event, now, false, &mut out),
            TouchKind::Cancel => self.on_end(event, now, true, &mut out),
        }
        out
    }

    /// Emit `LongPress` once the single touch has been held long enough.
    pub fn check_long_press(&mut self, now: Instant) -> Option<GestureEvent> {
        if self.long_press_fired {
            return None;
        }
        let (point, down) = self.long_press?;
        let duration = now.saturating_duration_since(down);
        if duration < self.config.long_press_threshold {
            return None;
        }
        self.long_press_fired = true;
        self.tap = None;
        Some(GestureEvent::LongPress { point, duration })
    }

    /// Drop the pending tap, e.g. because the touch started a pan.
    pub fn cancel_tap(&mut self) {
        self.tap = None;
        self.long_press = None;
    }

    #[inline]
    #[must_use]
    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    #[inline]
    #[must_use]
    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }

    /// Return every detector to idle.
    pub fn reset(&mut self) {
        self.touches.clear();
        self.tap = None;
        self.last_tap = None;
        self.long_press = None;
        self.long_press_fired = false;
        self.pinch = None;
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GestureConfig) {
        self.config = config;
    }
}

// ---------------------------------------------------------------------------
// Internal event handlers
// ---------------------------------------------------------------------------

impl GestureListener {
    fn upsert(&mut self, touch: SingleTouch) {
        match self
            .touches
            .iter_mut()
            .find(|t| t.identifier == touch.identifier)
        {
            Some(existing) => existing.point = touch.point,
            None => self.touches.push(touch),
        }
    }

    fn pinch_pair(&self) -> Option<(f32, ScreenPoint)> {
        match self.touches.as_slice() {
            [a, b, ..] => Some(span_and_focus(a.point, b.point)),
            _ => None,
        }
    }

    fn on_start(&mut self, event: &MultiTouchInput, now: Instant, out: &mut SmallVec<[GestureEvent; 2]>) {
        for touch in &event.touches {
            self.upsert(*touch);
        }
        match self.touches.len() {
            0 => {}
            1 => {
                let point = self.touches[0].point;
                self.tap = Some(TapCandidate { start: point, time: now });
                self.long_press = Some((point, now));
                self.long_press_fired = false;
            }
            _ => {
                self.tap = None;
                self.long_press = None;
                if self.pinch.is_none()
                    && let Some((span, focus)) = self.pinch_pair()
                {
                    self.pinch = Some(PinchTracker { focus, span });
                    out.push(GestureEvent::PinchStart { focus, span });
                }
            }
        }
    }

    fn on_move(&mut self, event: &MultiTouchInput, out: &mut SmallVec<[GestureEvent; 2]>) {
        for touch in &event.touches {
            if let Some(existing) = self
                .touches
                .iter_mut()
                .find(|t| t.identifier == touch.identifier)
            {
                existing.point = touch.point;
            }
        }

        if let (Some(tap), Some(first)) = (self.tap, self.touches.first())
            && (first.point - tap.start).length() > self.config.tap_slop
        {
            self.tap = None;
            self.long_press = None;
        }

        if let Some(prev) = self.pinch
            && let Some((span, focus)) = self.pinch_pair()
            && ((span - prev.span).abs() > f32::EPSILON || focus != prev.focus)
        {
            out.push(GestureEvent::PinchScale {
                focus,
                span,
                previous_span: prev.span,
            });
            self.pinch = Some(PinchTracker { focus, span });
        }
    }

    fn on_end(
        &mut self,
        event: &MultiTouchInput,
        now: Instant,
        cancelled: bool,
        out: &mut SmallVec<[GestureEvent; 2]>,
    ) {
        if cancelled {
            self.touches.clear();
        } else {
            for touch in &event.touches {
                self.touches.retain(|t| t.identifier != touch.identifier);
            }
        }

        if self.touches.len() < 2
            && let Some(pinch) = self.pinch.take()
        {
            out.push(GestureEvent::PinchEnd {
                focus: pinch.focus,
                span: pinch.span,
            });
            self.tap = None;
        }

        if !self.touches.is_empty() {
            return;
        }
        self.long_press = None;
        let fired = std::mem::replace(&mut self.long_press_fired, false);
        let Some(tap) = self.tap.take() else {
            return;
        };
        if cancelled || fired || now.saturating_duration_since(tap.time) > self.config.max_tap_duration {
            return;
        }

        let point = event.first_point().unwrap_or(tap.start);
        let is_double = self.last_tap.is_some_and(|(prev, at)| {
            now.saturating_duration_since(at) <= self.config.double_tap_timeout
                && (point - prev).length() <= self.config.double_tap_slop
        });
        if is_double {
            self.last_tap = None;
            out.push(GestureEvent::DoubleTap { point });
        } else {
            self.last_tap = Some((point, now));
            out.push(GestureEvent::SingleTap { point });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#![forbid(unsafe_code)]

//! Animation primitives driven by explicit time steps.
//!
//! Nothing here reads a clock: callers pass the elapsed `Duration` (or the
//! current `Instant` for curve-based animations), so sampling is
//! deterministic under test.
//!
//! - [`spring::Spring`]: damped oscillator used for overscroll snap-back.
//! - [`fling::FlingCurve`]: friction-decayed velocity used for flings.
//! - [`Tween`]: fixed-duration progress with an easing curve, used for smooth
//!   scrolls and animated zooms.

pub mod fling;
pub mod spring;

use std::time::Duration;

use web_time::Instant;

/// A time-stepped animation producing a normalized value.
pub trait Animation {
    /// Advance by `dt`.
    fn tick(&mut self, dt: Duration);
    /// Whether the animation has finished.
    fn is_complete(&self) -> bool;
    /// Current value, normalized to `[0.0, 1.0]`.
    fn value(&self) -> f32;
    /// Return to the initial state.
    fn reset(&mut self);
}

/// Maps linear progress in `[0, 1]` to eased progress.
pub type EasingFn = fn(f32) -> f32;

#[must_use]
pub fn linear(t: f32) -> f32 {
    t.clamp(0.0, 1.0)
}

#[must_use]
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

#[must_use]
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

// ---------------------------------------------------------------------------
// Tween
// ---------------------------------------------------------------------------

/// Fixed-duration eased progress anchored at a start instant.
#[derive(Debug, Clone, Copy)]
pub struct Tween {
    start: Instant,
    duration: Duration,
    elapsed: Duration,
    easing: EasingFn,
}

impl Tween {
    /// A tween that starts at `start` and lasts `duration`.
    #[must_use]
    pub fn new(start: Instant, duration: Duration) -> Self {
        Self {
            start,
            duration,
            elapsed: Duration::ZERO,
            easing: ease_out_cubic,
        }
    }

    /// Set the easing function (builder pattern).
    #[must_use]
    pub fn easing(mut self, easing: EasingFn) -> Self {
        self.easing = easing;
        self
    }

    /// Move the tween to the state it has at `now`.
    pub fn seek(&mut self, now: Instant) {
        self.elapsed = now.saturating_duration_since(self.start);
    }

    /// Instant the tween started.
    #[inline]
    #[must_use]
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Raw progress in `[0, 1]` before easing.
    #[must_use]
    pub fn linear_progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }
}

impl Animation for Tween {
    fn tick(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);
    }

    fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    fn value(&self) -> f32 {
        (self.easing)(self.linear_progress())
    }

    fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

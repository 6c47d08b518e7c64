#![forbid(unsafe_code)]

//! Damped spring used to release overscroll.
//!
//! The spring pulls a displaced value back to its target:
//!
//!   a = -stiffness × (position - target) - damping × velocity
//!
//! Overscroll uses target `0.0` and starts either at the current overscroll
//! amount (finger lifted while stretched) or at zero with an initial velocity
//! (a fling that hit the edge and bounces).
//!
//! # Invariants
//!
//! 1. Once at rest, `advance` is a no-op until `set_target` or `impulse`.
//! 2. At rest, `position() == target()` exactly and `velocity() == 0.0`.
//! 3. Stiffness is never below [`MIN_STIFFNESS`]; damping is never negative.
//!
//! # Failure Modes
//!
//! - Large `dt` is subdivided into steps of at most 4ms, so a stalled sampler
//!   cannot make the spring explode.

use std::time::Duration;

use super::Animation;

/// Longest single integration step, in seconds.
const MAX_STEP_SECS: f32 = 0.004;

/// Stiffness floor. Below this the spring would not converge in practice.
pub const MIN_STIFFNESS: f32 = 0.1;

const DEFAULT_REST_DISTANCE: f32 = 0.1;
const DEFAULT_REST_SPEED: f32 = 1.0;

/// A damped harmonic oscillator in pixel units (pixels, pixels per second).
#[derive(Debug, Clone, Copy)]
pub struct Spring {
    position: f32,
    velocity: f32,
    target: f32,
    initial: f32,
    initial_velocity: f32,
    stiffness: f32,
    damping: f32,
    rest_distance: f32,
    rest_speed: f32,
    at_rest: bool,
}

impl Spring {
    /// Spring at `position` pulled toward `target`, with stiffness 120 and
    /// damping 22 (slightly underdamped).
    #[must_use]
    pub fn new(position: f32, target: f32) -> Self {
        Self {
            position,
            velocity: 0.0,
            target,
            initial: position,
            initial_velocity: 0.0,
            stiffness: 120.0,
            damping: 22.0,
            rest_distance: DEFAULT_REST_DISTANCE,
            rest_speed: DEFAULT_REST_SPEED,
            at_rest: false,
        }
    }

    /// Set stiffness (builder pattern).
    #[must_use]
    pub fn with_stiffness(mut self, k: f32) -> Self {
        self.stiffness = k.max(MIN_STIFFNESS);
        self
    }

    /// Set damping (builder pattern).
    #[must_use]
    pub fn with_damping(mut self, c: f32) -> Self {
        self.damping = c.max(0.0);
        self
    }

    /// Set the starting velocity in pixels per second (builder pattern).
    #[must_use]
    pub fn with_velocity(mut self, v: f32) -> Self {
        self.velocity = v;
        self.initial_velocity = v;
        self
    }

    /// Set the distance and speed below which the spring settles.
    #[must_use]
    pub fn with_rest_thresholds(mut self, distance: f32, speed: f32) -> Self {
        self.rest_distance = distance.abs();
        self.rest_speed = speed.abs();
        self
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> f32 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        self.at_rest
    }

    /// Move the target. Wakes the spring.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
        self.at_rest = false;
    }

    /// Add velocity. Wakes the spring.
    pub fn impulse(&mut self, dv: f32) {
        self.velocity += dv;
        self.at_rest = false;
    }

    fn step(&mut self, dt: f32) {
        let accel = -self.stiffness * (self.position - self.target) - self.damping * self.velocity;
        self.velocity += accel * dt;
        self.position += self.velocity * dt;
    }

    /// Integrate forward by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        if self.at_rest {
            return;
        }
        let mut remaining = dt.as_secs_f32();
        while remaining > 0.0 {
            let h = remaining.min(MAX_STEP_SECS);
            self.step(h);
            remaining -= h;
        }
        if (self.position - self.target).abs() < self.rest_distance
            && self.velocity.abs() < self.rest_speed
        {
            self.position = self.target;
            self.velocity = 0.0;
            self.at_rest = true;
        }
    }
}

impl Animation for Spring {
    fn tick(&mut self, dt: Duration) {
        self.advance(dt);
    }

    fn is_complete(&self) -> bool {
        self.at_rest
    }

    /// Fraction of the initial displacement still remaining, in `[0, 1]`.
    fn value(&self) -> f32 {
        let span = self.initial - self.target;
        if span.abs() < f32::EPSILON {
            return if self.at_rest { 0.0 } else { 1.0 };
        }
        ((self.position - self.target) / span).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.position = self.initial;
        self.velocity = self.initial_velocity;
        self.at_rest = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn run(spring: &mut Spring, frames: usize) {
        for _ in 0..frames {
            spring.advance(FRAME);
        }
    }

    #[test]
    fn settles_at_target() {
        let mut s = Spring::new(80.0, 0.0);
        run(&mut s, 240);
        assert!(s.is_at_rest());
        assert_eq!(s.position(), 0.0);
        assert_eq!(s.velocity(), 0.0);
    }

    #[test]
    fn rest_is_sticky() {
        let mut s = Spring::new(0.0, 0.0);
        s.advance(FRAME);
        assert!(s.is_at_rest());
        s.advance(Duration::from_secs(1));
        assert_eq!(s.position(), 0.0);
    }

    #[test]
    fn velocity_only_spring_bounces_out_and_back() {
        let mut s = Spring::new(0.0, 0.0).with_velocity(600.0);
        let mut peak = 0.0f32;
        for _ in 0..300 {
            s.advance(FRAME);
            peak = peak.max(s.position());
        }
        assert!(peak > 1.0, "spring never left the origin");
        assert!(s.is_at_rest());
    }

    #[test]
    fn huge_dt_is_stable() {
        let mut s = Spring::new(100.0, 0.0).with_stiffness(400.0);
        s.advance(Duration::from_secs(5));
        assert!(s.position().is_finite());
        assert!(s.position().abs() < 1.0);
    }

    #[test]
    fn builder_clamps_parameters() {
        let s = Spring::new(1.0, 0.0).with_stiffness(-5.0).with_damping(-1.0);
        assert_eq!(s.stiffness, MIN_STIFFNESS);
        assert_eq!(s.damping, 0.0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut s = Spring::new(50.0, 0.0).with_velocity(10.0);
        run(&mut s, 30);
        s.reset();
        assert_eq!(s.position(), 50.0);
        assert_eq!(s.velocity(), 10.0);
        assert_eq!(s.value(), 1.0);
    }
}

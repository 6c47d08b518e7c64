#![forbid(unsafe_code)]

//! Friction-decayed fling motion.
//!
//! Velocity (pixels per millisecond) decays exponentially:
//!
//!   v(t) = v₀ · (1 − friction)^t        (t in milliseconds)
//!
//! and the displacement over a step is the exact integral of `v` over that
//! step, so the total distance does not depend on the sampling rate.
//!
//! # Invariants
//!
//! 1. Each axis stops independently once its speed drops below the stop
//!    threshold; a stopped axis never restarts.
//! 2. `advance` never returns a displacement against the velocity direction.

use std::time::Duration;

use euclid::Vector2D;

use crate::geometry::Axis;

/// Default per-millisecond friction.
pub const DEFAULT_FRICTION: f32 = 0.002;

/// Default speed (px/ms) below which a fling axis is considered stopped.
pub const DEFAULT_STOP_THRESHOLD: f32 = 0.01;

/// Two-axis fling state.
#[derive(Debug, Clone, Copy)]
pub struct FlingCurve<U> {
    velocity: Vector2D<f32, U>,
    friction: f32,
    stop_threshold: f32,
}

impl<U> FlingCurve<U> {
    /// Fling with the given initial velocity in px/ms.
    #[must_use]
    pub fn new(velocity: Vector2D<f32, U>) -> Self {
        Self {
            velocity,
            friction: DEFAULT_FRICTION,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
        }
    }

    /// Set friction, clamped to `(0, 1)` (builder pattern).
    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.clamp(1e-6, 0.999);
        self
    }

    /// Set the stop threshold (builder pattern).
    #[must_use]
    pub fn with_stop_threshold(mut self, threshold: f32) -> Self {
        self.stop_threshold = threshold.abs();
        self
    }

    /// Current velocity in px/ms.
    #[inline]
    #[must_use]
    pub fn velocity(&self) -> Vector2D<f32, U> {
        self.velocity
    }

    /// Stop one axis, returning the velocity it had.
    pub fn stop_axis(&mut self, axis: Axis) -> f32 {
        let v = axis.of_vector(self.velocity);
        self.velocity = axis.set_vector(self.velocity, 0.0);
        v
    }

    /// Whether both axes have stopped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.velocity.x == 0.0 && self.velocity.y == 0.0
    }

    /// Advance by `dt`, returning the displacement travelled in pixels.
    pub fn advance(&mut self, dt: Duration) -> Vector2D<f32, U> {
        let ms = dt.as_secs_f32() * 1000.0;
        if ms <= 0.0 {
            return Vector2D::zero();
        }
        let keep = 1.0 - self.friction;
        let decay = keep.powf(ms);
        // ∫₀ᵗ kˢ ds = (kᵗ − 1) / ln k
        let distance_factor = (decay - 1.0) / keep.ln();
        let mut displacement = Vector2D::zero();
        for axis in Axis::BOTH {
            let v = axis.of_vector(self.velocity);
            if v == 0.0 {
                continue;
            }
            displacement = axis.set_vector(displacement, v * distance_factor);
            let next = v * decay;
            let next = if next.abs() < self.stop_threshold {
                0.0
            } else {
                next
            };
            self.velocity = axis.set_vector(self.velocity, next);
        }
        displacement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ScreenVector;

    const FRAME: Duration = Duration::from_millis(16);

    fn total_distance(mut curve: FlingCurve<crate::geometry::ScreenPixel>, step: Duration) -> f32 {
        let mut total = 0.0;
        for _ in 0..100_000 {
            if curve.is_complete() {
                break;
            }
            total += curve.advance(step).x;
        }
        total
    }

    #[test]
    fn fling_decays_to_a_stop() {
        let mut curve = FlingCurve::new(ScreenVector::new(2.0, 0.0));
        let mut frames = 0;
        while !curve.is_complete() && frames < 10_000 {
            curve.advance(FRAME);
            frames += 1;
        }
        assert!(curve.is_complete());
        assert!(frames > 10);
    }

    #[test]
    fn distance_is_frame_rate_independent() {
        let v = ScreenVector::new(3.0, 0.0);
        let coarse = total_distance(FlingCurve::new(v).with_stop_threshold(1e-4), FRAME);
        let fine = total_distance(
            FlingCurve::new(v).with_stop_threshold(1e-4),
            Duration::from_millis(4),
        );
        assert!((coarse - fine).abs() / fine < 0.01, "{coarse} vs {fine}");
    }

    #[test]
    fn displacement_follows_velocity_sign() {
        let mut curve = FlingCurve::new(ScreenVector::new(-1.0, 0.5));
        let d = curve.advance(FRAME);
        assert!(d.x < 0.0);
        assert!(d.y > 0.0);
    }

    #[test]
    fn stopped_axis_stays_stopped() {
        let mut curve = FlingCurve::new(ScreenVector::new(1.0, 1.0));
        assert_eq!(curve.stop_axis(Axis::Y), 1.0);
        let d = curve.advance(FRAME);
        assert_eq!(d.y, 0.0);
        assert_eq!(curve.velocity().y, 0.0);
        assert!(d.x > 0.0);
    }

    #[test]
    fn zero_dt_moves_nothing() {
        let mut curve = FlingCurve::new(ScreenVector::new(1.0, 1.0));
        assert_eq!(curve.advance(Duration::ZERO), ScreenVector::zero());
        assert_eq!(curve.velocity(), ScreenVector::new(1.0, 1.0));
    }
}

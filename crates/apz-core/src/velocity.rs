#![forbid(unsafe_code)]

//! Pointer velocity estimation.
//!
//! Positions are sampled as the pointer moves; the velocity is the
//! least-squares slope over the samples inside a trailing time window. A
//! pointer that has been held still longer than the window reports zero, so
//! lifting a finger after pausing does not start a fling.

use std::collections::VecDeque;
use std::time::Duration;

use euclid::{Point2D, Vector2D};
use web_time::Instant;

/// Default trailing window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(50);

const MAX_SAMPLES: usize = 20;

/// One-dimensional velocity tracker (pixels per millisecond).
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    samples: VecDeque<(Instant, f32)>,
    window: Duration,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl VelocityTracker {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            window,
        }
    }

    /// Record a position. Out-of-order samples are dropped.
    pub fn add_position(&mut self, time: Instant, position: f32) {
        if let Some(&(last, _)) = self.samples.back()
            && time < last
        {
            return;
        }
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back((time, position));
        self.trim(time);
    }

    fn trim(&mut self, now: Instant) {
        while let Some(&(t, _)) = self.samples.front() {
            if now.saturating_duration_since(t) > self.window && self.samples.len() > 2 {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Velocity as of `now`; zero when the newest sample is older than the
    /// window or fewer than two samples exist.
    #[must_use]
    pub fn velocity_at(&self, now: Instant) -> f32 {
        let Some(&(newest, _)) = self.samples.back() else {
            return 0.0;
        };
        if now.saturating_duration_since(newest) > self.window {
            return 0.0;
        }
        let recent: Vec<(f32, f32)> = self
            .samples
            .iter()
            .filter(|(t, _)| newest.saturating_duration_since(*t) <= self.window)
            .map(|&(t, p)| {
                let ms = newest.saturating_duration_since(t).as_secs_f32() * -1000.0;
                (ms, p)
            })
            .collect();
        if recent.len() < 2 {
            return 0.0;
        }
        let n = recent.len() as f32;
        let mean_t = recent.iter().map(|(t, _)| t).sum::<f32>() / n;
        let mean_p = recent.iter().map(|(_, p)| p).sum::<f32>() / n;
        let (num, den) = recent.iter().fold((0.0, 0.0), |(num, den), (t, p)| {
            let dt = t - mean_t;
            (num + dt * (p - mean_p), den + dt * dt)
        });
        if den <= f32::EPSILON { 0.0 } else { num / den }
    }

    /// Forget all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Two-dimensional tracker built from two axis trackers.
#[derive(Debug, Clone, Default)]
pub struct PointVelocityTracker {
    x: VelocityTracker,
    y: VelocityTracker,
}

impl PointVelocityTracker {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            x: VelocityTracker::new(window),
            y: VelocityTracker::new(window),
        }
    }

    pub fn add_point<U>(&mut self, time: Instant, point: Point2D<f32, U>) {
        self.x.add_position(time, point.x);
        self.y.add_position(time, point.y);
    }

    /// Velocity of the pointer (px/ms) as of `now`.
    #[must_use]
    pub fn velocity_at<U>(&self, now: Instant) -> Vector2D<f32, U> {
        Vector2D::new(self.x.velocity_at(now), self.y.velocity_at(now))
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ScreenPoint, ScreenVector};

    const MS_10: Duration = Duration::from_millis(10);

    #[test]
    fn constant_motion_yields_constant_velocity() {
        let t0 = Instant::now();
        let mut tr = VelocityTracker::default();
        for i in 0..5u32 {
            tr.add_position(t0 + MS_10 * i, i as f32 * 20.0);
        }
        let v = tr.velocity_at(t0 + MS_10 * 4);
        assert!((v - 2.0).abs() < 1e-3, "v = {v}");
    }

    #[test]
    fn pause_before_release_zeroes_velocity() {
        let t0 = Instant::now();
        let mut tr = VelocityTracker::default();
        tr.add_position(t0, 0.0);
        tr.add_position(t0 + MS_10, 30.0);
        assert!(tr.velocity_at(t0 + MS_10) > 0.0);
        assert_eq!(tr.velocity_at(t0 + Duration::from_millis(200)), 0.0);
    }

    #[test]
    fn single_sample_has_no_velocity() {
        let mut tr = VelocityTracker::default();
        let t0 = Instant::now();
        tr.add_position(t0, 5.0);
        assert_eq!(tr.velocity_at(t0), 0.0);
    }

    #[test]
    fn out_of_order_samples_are_dropped() {
        let t0 = Instant::now();
        let mut tr = VelocityTracker::default();
        tr.add_position(t0 + MS_10, 10.0);
        tr.add_position(t0, 0.0);
        assert_eq!(tr.sample_count(), 1);
    }

    #[test]
    fn sample_buffer_is_bounded() {
        let t0 = Instant::now();
        let mut tr = VelocityTracker::new(Duration::from_secs(10));
        for i in 0..100u32 {
            tr.add_position(t0 + Duration::from_millis(u64::from(i)), i as f32);
        }
        assert_eq!(tr.sample_count(), MAX_SAMPLES);
    }

    #[test]
    fn point_tracker_reports_both_axes() {
        let t0 = Instant::now();
        let mut tr = PointVelocityTracker::default();
        tr.add_point(t0, ScreenPoint::new(0.0, 0.0));
        tr.add_point(t0 + MS_10, ScreenPoint::new(10.0, -5.0));
        let v: ScreenVector = tr.velocity_at(t0 + MS_10);
        assert!((v.x - 1.0).abs() < 1e-3);
        assert!((v.y + 0.5).abs() < 1e-3);
    }
}

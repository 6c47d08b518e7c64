#![forbid(unsafe_code)]

//! Animations an APZC runs between input events.
//!
//! At most one animation runs per APZC. The sampler takes it out of the
//! state, samples it against the state, and puts it back if it continues.
//! An animation never locks another APZC; a fling that reaches an edge
//! returns a [`HandoffFling`] for the caller to run after unlocking. A fling
//! that reaches an edge nobody further down the chain can scroll past
//! returns the velocity it lost, which becomes an overscroll bounce.

use std::sync::Arc;

use apz_core::animation::Animation;
use apz_core::animation::Tween;
use apz_core::animation::fling::FlingCurve;
use apz_core::animation::spring::Spring;
use apz_core::geometry::{Axis, CssPoint, ScreenPixel, ScreenPoint, ScreenVector};
use web_time::Instant;

use super::{ApzcState, PanZoomState};
use crate::config::ApzConfig;
use crate::handoff::{HandoffFling, OverscrollHandoffChain};

/// Whether an animation keeps running after a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AnimationStep {
    Continue,
    Done,
}

#[derive(Debug)]
pub(crate) struct SampleOutcome {
    pub step: AnimationStep,
    pub handoff: Option<HandoffFling>,
    /// Fling velocity (px/ms, screen) lost at an edge with no handoff.
    pub bounce: Option<ScreenVector>,
}

impl SampleOutcome {
    fn of(step: AnimationStep) -> Self {
        Self {
            step,
            handoff: None,
            bounce: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FlingAnimation {
    pub curve: FlingCurve<ScreenPixel>,
    pub chain: Arc<OverscrollHandoffChain>,
    /// This APZC's position in `chain`.
    pub index: usize,
    pub last: Instant,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScrollTween {
    pub from: CssPoint,
    pub to: CssPoint,
    pub tween: Tween,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ZoomTween {
    pub from_offset: CssPoint,
    pub to_offset: CssPoint,
    pub from_zoom: f32,
    pub to_zoom: f32,
    pub tween: Tween,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct OverscrollSprings {
    pub x: Spring,
    pub y: Spring,
    pub last: Instant,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct AutoscrollAnimation {
    pub anchor: ScreenPoint,
    pub cursor: ScreenPoint,
    pub last: Instant,
}

#[derive(Debug)]
pub(crate) enum ApzcAnimation {
    Fling(FlingAnimation),
    SmoothScroll(ScrollTween),
    Wheel(ScrollTween),
    Zoom(ZoomTween),
    Overscroll(OverscrollSprings),
    Autoscroll(AutoscrollAnimation),
}

impl ApzcAnimation {
    /// State an APZC is in while running this animation.
    pub(crate) fn state(&self) -> PanZoomState {
        match self {
            Self::Fling(_) => PanZoomState::Fling,
            Self::SmoothScroll(_) => PanZoomState::SmoothScroll,
            Self::Wheel(_) => PanZoomState::WheelScroll,
            Self::Zoom(_) => PanZoomState::AnimatingZoom,
            Self::Overscroll(_) => PanZoomState::OverscrollAnimation,
            Self::Autoscroll(_) => PanZoomState::Autoscroll,
        }
    }

    /// Overscroll snap-back from the state's current overscroll.
    pub(crate) fn snap_back(st: &ApzcState, cfg: &ApzConfig, now: Instant) -> Self {
        let spring = |from: f32| {
            Spring::new(from, 0.0)
                .with_stiffness(cfg.overscroll.spring_stiffness)
                .with_damping(cfg.overscroll.spring_damping)
        };
        Self::Overscroll(OverscrollSprings {
            x: spring(st.overscroll.x),
            y: spring(st.overscroll.y),
            last: now,
        })
    }

    /// Overscroll bounce for a fling that hit an edge with `velocity`
    /// (px/ms, screen) left. Starts from the current overscroll.
    pub(crate) fn bounce(st: &ApzcState, velocity: ScreenVector, cfg: &ApzConfig, now: Instant) -> Self {
        let v = st.screen_to_parent(velocity) * (1000.0 * cfg.overscroll.stretch_factor);
        let spring = |from: f32, speed: f32| {
            Spring::new(from, 0.0)
                .with_stiffness(cfg.overscroll.spring_stiffness)
                .with_damping(cfg.overscroll.spring_damping)
                .with_velocity(speed)
        };
        Self::Overscroll(OverscrollSprings {
            x: spring(st.overscroll.x, v.x),
            y: spring(st.overscroll.y, v.y),
            last: now,
        })
    }

    /// Retarget a smooth or wheel scroll, keeping the current position as
    /// the new start.
    pub(crate) fn scroll_tween(from: CssPoint, to: CssPoint, now: Instant, duration_ms: u64) -> ScrollTween {
        ScrollTween {
            from,
            to,
            tween: Tween::new(now, std::time::Duration::from_millis(duration_ms)),
        }
    }

    pub(crate) fn sample(&mut self, st: &mut ApzcState, now: Instant, cfg: &ApzConfig) -> SampleOutcome {
        match self {
            Self::Fling(fling) => sample_fling(fling, st, now, cfg),
            Self::SmoothScroll(t) | Self::Wheel(t) => {
                t.tween.seek(now);
                let p = t.tween.value();
                let offset = t.from.lerp(t.to, p);
                st.set_scroll_offset(offset);
                SampleOutcome::of(if t.tween.is_complete() {
                    AnimationStep::Done
                } else {
                    AnimationStep::Continue
                })
            }
            Self::Zoom(z) => {
                z.tween.seek(now);
                let p = z.tween.value();
                let zoom = z.from_zoom + (z.to_zoom - z.from_zoom) * p;
                st.set_zoom(zoom);
                st.set_scroll_offset(z.from_offset.lerp(z.to_offset, p));
                SampleOutcome::of(if z.tween.is_complete() {
                    AnimationStep::Done
                } else {
                    AnimationStep::Continue
                })
            }
            Self::Overscroll(s) => {
                let dt = now.saturating_duration_since(s.last);
                s.last = now;
                s.x.advance(dt);
                s.y.advance(dt);
                let size = st.metrics.composition_bounds.size;
                let max_x = cfg.overscroll.max_fraction * size.width;
                let max_y = cfg.overscroll.max_fraction * size.height;
                st.overscroll = euclid::Vector2D::new(
                    s.x.position().clamp(-max_x, max_x),
                    s.y.position().clamp(-max_y, max_y),
                );
                SampleOutcome::of(if s.x.is_at_rest() && s.y.is_at_rest() {
                    AnimationStep::Done
                } else {
                    AnimationStep::Continue
                })
            }
            Self::Autoscroll(a) => {
                let ms = now.saturating_duration_since(a.last).as_secs_f32() * 1000.0;
                a.last = now;
                let v = autoscroll_velocity(a.anchor, a.cursor, cfg);
                if v != ScreenVector::zero() {
                    st.attempt_scroll(v * ms);
                }
                SampleOutcome::of(AnimationStep::Continue)
            }
        }
    }
}

fn sample_fling(
    fling: &mut FlingAnimation,
    st: &mut ApzcState,
    now: Instant,
    cfg: &ApzConfig,
) -> SampleOutcome {
    let dt = now.saturating_duration_since(fling.last);
    fling.last = now;
    let displacement = fling.curve.advance(dt);
    let residual = st.attempt_scroll(displacement);

    let mut leftover = ScreenVector::zero();
    for axis in Axis::BOTH {
        if axis.of_vector(residual) != 0.0 {
            leftover = axis.set_vector(leftover, fling.curve.stop_axis(axis));
        }
    }

    let handoff = (leftover != ScreenVector::zero()
        && cfg.fling.handoff
        && fling.index + 1 < fling.chain.len())
    .then(|| HandoffFling {
        chain: Arc::clone(&fling.chain),
        from_index: fling.index + 1,
        velocity: leftover,
    });
    let complete = fling.curve.is_complete();
    let mut bounce = None;
    if handoff.is_none() && leftover != ScreenVector::zero() {
        if complete {
            bounce = Some(leftover);
        } else {
            // The other axis is still flinging: stretch by this frame's share
            // and leave the rest to the snap-back once the fling ends.
            let ms = dt.as_secs_f32() * 1000.0;
            st.apply_overscroll(leftover * ms, cfg);
        }
    }

    SampleOutcome {
        step: if complete {
            AnimationStep::Done
        } else {
            AnimationStep::Continue
        },
        handoff,
        bounce,
    }
}

/// Autoscroll speed (px/ms) for a cursor at `cursor` around `anchor`.
pub(crate) fn autoscroll_velocity(anchor: ScreenPoint, cursor: ScreenPoint, cfg: &ApzConfig) -> ScreenVector {
    let a = &cfg.autoscroll;
    let d = cursor - anchor;
    let speed = |c: f32| {
        let beyond = c.abs() - a.dead_zone;
        if beyond <= 0.0 {
            0.0
        } else {
            (beyond * a.speed_per_pixel).min(a.max_speed) * c.signum()
        }
    };
    ScreenVector::new(speed(d.x), speed(d.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_zone_suppresses_autoscroll() {
        let cfg = ApzConfig::default();
        let anchor = ScreenPoint::new(100.0, 100.0);
        assert_eq!(
            autoscroll_velocity(anchor, ScreenPoint::new(105.0, 95.0), &cfg),
            ScreenVector::zero()
        );
        let v = autoscroll_velocity(anchor, ScreenPoint::new(100.0, 160.0), &cfg);
        assert_eq!(v.x, 0.0);
        assert!((v.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn autoscroll_speed_is_capped() {
        let cfg = ApzConfig::default();
        let v = autoscroll_velocity(
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(-10_000.0, 0.0),
            &cfg,
        );
        assert_eq!(v.x, -cfg.autoscroll.max_speed);
    }
}

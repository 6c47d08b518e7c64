//! Property-based invariant tests for the motion primitives.
//!
//! 1. A fling never travels against its initial velocity and always stops
//! 2. A released spring always settles exactly on its target
//! 3. The gesture listener never emits a tap for a gesture that pinched
//! 4. Velocity estimates of uniform motion match the motion

use std::time::Duration;

use apz_core::animation::fling::FlingCurve;
use apz_core::animation::spring::Spring;
use apz_core::event::{MultiTouchInput, TouchKind};
use apz_core::geometry::{ScreenPoint, ScreenVector};
use apz_core::gesture::{GestureEvent, GestureListener};
use apz_core::velocity::VelocityTracker;
use proptest::prelude::*;
use web_time::Instant;

// ── Strategies ──────────────────────────────────────────────────────────

fn velocity_strategy() -> impl Strategy<Value = (f32, f32)> {
    (-8.0f32..8.0, -8.0f32..8.0)
}

fn frame_strategy() -> impl Strategy<Value = u64> {
    1u64..50
}

#[derive(Debug, Clone)]
enum TouchOp {
    SecondFingerDown,
    Move(f32, f32),
    SecondFingerUp,
}

fn touch_op_strategy() -> impl Strategy<Value = TouchOp> {
    prop_oneof![
        Just(TouchOp::SecondFingerDown),
        (-50.0f32..50.0, -50.0f32..50.0).prop_map(|(x, y)| TouchOp::Move(x, y)),
        Just(TouchOp::SecondFingerUp),
    ]
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Fling direction and termination
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn fling_moves_with_velocity_and_stops(
        (vx, vy) in velocity_strategy(),
        frame_ms in frame_strategy(),
    ) {
        let mut curve = FlingCurve::new(ScreenVector::new(vx, vy));
        let step = Duration::from_millis(frame_ms);
        let mut steps = 0;
        while !curve.is_complete() {
            let d = curve.advance(step);
            prop_assert!(d.x * vx >= 0.0);
            prop_assert!(d.y * vy >= 0.0);
            steps += 1;
            prop_assert!(steps < 200_000, "fling never stopped");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Spring settles on target
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn spring_settles_on_target(
        start in -500.0f32..500.0,
        velocity in -3000.0f32..3000.0,
        frame_ms in frame_strategy(),
    ) {
        let mut spring = Spring::new(start, 0.0).with_velocity(velocity);
        let step = Duration::from_millis(frame_ms);
        for _ in 0..100_000 {
            if spring.is_at_rest() {
                break;
            }
            spring.advance(step);
        }
        prop_assert!(spring.is_at_rest());
        prop_assert_eq!(spring.position(), 0.0);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Pinch gestures never tap
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn pinched_gesture_never_taps(ops in prop::collection::vec(touch_op_strategy(), 1..20)) {
        let mut gl = GestureListener::default();
        let t0 = Instant::now();
        let mut t = t0;
        let mut second_down = false;
        let mut pinched = false;
        let mut events = Vec::new();
        events.extend(gl.process(
            &MultiTouchInput::new(TouchKind::Start, t).with_touch(1, ScreenPoint::new(100.0, 100.0)),
            t,
        ));
        for op in ops {
            t += Duration::from_millis(5);
            let ev = match op {
                TouchOp::SecondFingerDown if !second_down => {
                    second_down = true;
                    pinched = true;
                    MultiTouchInput::new(TouchKind::Start, t).with_touch(2, ScreenPoint::new(200.0, 100.0))
                }
                TouchOp::SecondFingerUp if second_down => {
                    second_down = false;
                    MultiTouchInput::new(TouchKind::End, t).with_touch(2, ScreenPoint::new(200.0, 100.0))
                }
                TouchOp::Move(dx, dy) => MultiTouchInput::new(TouchKind::Move, t)
                    .with_touch(1, ScreenPoint::new(100.0 + dx / 10.0, 100.0 + dy / 10.0)),
                _ => continue,
            };
            events.extend(gl.process(&ev, t));
        }
        t += Duration::from_millis(5);
        events.extend(gl.process(
            &MultiTouchInput::new(TouchKind::Cancel, t),
            t,
        ));
        if pinched {
            let tapped = events.iter().any(|e| matches!(
                e,
                GestureEvent::SingleTap { .. } | GestureEvent::DoubleTap { .. }
            ));
            prop_assert!(!tapped);
        }
        let starts = events.iter().filter(|e| matches!(e, GestureEvent::PinchStart { .. })).count();
        let ends = events.iter().filter(|e| matches!(e, GestureEvent::PinchEnd { .. })).count();
        prop_assert_eq!(starts, ends);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Velocity of uniform motion
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn uniform_motion_velocity(speed in -5.0f32..5.0, samples in 2usize..10) {
        let t0 = Instant::now();
        let mut tracker = VelocityTracker::default();
        for i in 0..samples {
            let ms = (i * 5) as u64;
            tracker.add_position(t0 + Duration::from_millis(ms), speed * ms as f32);
        }
        let last = t0 + Duration::from_millis(((samples - 1) * 5) as u64);
        let v = tracker.velocity_at(last);
        prop_assert!((v - speed).abs() < 1e-2, "expected {speed}, got {v}");
    }
}

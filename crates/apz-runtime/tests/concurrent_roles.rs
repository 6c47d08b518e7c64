//! Updater, controller and sampler threads driving one tree manager at once.
//!
//! Debug builds check the lock order on every acquisition, so an inversion
//! in any of these paths panics the offending thread and fails the test.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use apz_core::event::{InputData, MultiTouchInput, ScrollWheelInput, TouchKind};
use apz_core::guid::{LayersId, ScrollableLayerGuid};
use apz_runtime::{
    ApzConfig, ApzTreeManager, FrameMetrics, RecordingController, SceneNode, SceneSnapshot,
    ScrollFrameDescriptor, TouchAction, TreeManagerRegistry,
};
use euclid::{point2, rect, vec2};
use web_time::Instant;

const L1: LayersId = LayersId(1);
const ROUNDS: u64 = 300;

fn guid(id: u64) -> ScrollableLayerGuid {
    ScrollableLayerGuid::new(L1, 0, id)
}

fn frame(depth: u32, id: u64, size: f32) -> SceneNode {
    SceneNode::scroll_frame(
        depth,
        ScrollFrameDescriptor::new(
            guid(id),
            FrameMetrics::new(rect(0.0, 0.0, size, 4000.0), rect(0.0, 0.0, size, size)),
        ),
    )
}

/// Alternates between two frames and three, so the inner frame is created
/// and destroyed while gestures target it.
fn scene(seq: u64) -> SceneSnapshot {
    let s = SceneSnapshot::new(L1, seq).with_node(frame(0, 1, 500.0));
    let s = s.with_node(frame(1, 2, 300.0).with_touch_action(if seq % 3 == 0 {
        TouchAction::Unknown
    } else {
        TouchAction::Auto
    }));
    if seq % 2 == 0 { s.with_node(frame(2, 3, 150.0)) } else { s }
}

fn touch(kind: TouchKind, t: Instant, y: f32) -> InputData {
    MultiTouchInput::new(kind, t).with_touch(1, point2(100.0, y)).into()
}

#[test]
fn three_roles_run_concurrently() {
    let recorder = Arc::new(RecordingController::new());
    let tm = Arc::new(ApzTreeManager::new(L1, recorder.clone(), ApzConfig::default()));
    let registry = TreeManagerRegistry::new();
    registry.register(&tm).unwrap();
    tm.update_hit_testing_tree(&scene(1));

    let done = AtomicBool::new(false);
    let t0 = Instant::now();

    thread::scope(|s| {
        let updater = s.spawn(|| {
            for seq in 2..ROUNDS {
                tm.update_hit_testing_tree(&scene(seq));
                if seq % 50 == 0 {
                    registry.flush_repaints();
                }
            }
        });

        let controller = s.spawn(|| {
            let mut now = t0;
            let mut y = 120.0f32;
            while !done.load(Ordering::Acquire) {
                now += Duration::from_millis(4);
                let start = tm.receive_input(touch(TouchKind::Start, now, y), now);
                for step in 1..5 {
                    now += Duration::from_millis(4);
                    tm.receive_input(touch(TouchKind::Move, now, y - 20.0 * step as f32), now);
                }
                now += Duration::from_millis(4);
                tm.receive_input(touch(TouchKind::End, now, y - 80.0), now);
                if let Some(block) = start.block_id {
                    let _ = tm.content_received_input_block(block, false, now);
                    let _ = tm.set_target_apzc(block, Some(guid(2)), now);
                }
                let wheel = ScrollWheelInput::new(point2(400.0, 400.0), vec2(0.0, 30.0), now);
                tm.receive_input(wheel.into(), now);
                tm.process_timeouts(now + Duration::from_secs(1));
                y = if y > 200.0 { 120.0 } else { y + 7.0 };
                thread::yield_now();
            }
        });

        let sampler = s.spawn(|| {
            let sampler = tm.sampler();
            let mut now = t0;
            while !done.load(Ordering::Acquire) {
                now += Duration::from_millis(16);
                let frame = sampler.sample(now);
                for transform in frame.transforms.values() {
                    assert!(transform.translation.x.is_finite());
                    assert!(transform.translation.y.is_finite());
                }
                thread::yield_now();
            }
        });

        updater.join().unwrap();
        done.store(true, Ordering::Release);
        controller.join().unwrap();
        sampler.join().unwrap();
    });

    assert_eq!(tm.guids(), tm.tree_guids());
    for g in tm.guids() {
        let apzc = tm.apzc(&g).unwrap();
        assert!(!apzc.is_destroyed());
        let offset = apzc.scroll_offset();
        let max = apzc.metrics().scroll_range().max_y();
        assert!((0.0..=max).contains(&offset.y), "{g}: {offset:?} outside 0..={max}");
    }
    registry.shutdown();
}

//! Property tests for scroll handoff and content confirmation.
//!
//! # Invariants
//!
//! 1. A dispatched displacement is conserved: the sum of what each chain
//!    member applied plus the residual equals what was requested.
//! 2. A member only absorbs displacement when every member before it in
//!    the chain is at its limit along that axis.
//! 3. Each content answer for a block counts once; repeats report `false`
//!    and change nothing.

use std::sync::Arc;

use apz_core::event::{AllowedTouchBehavior, InputData, MultiTouchInput, TouchKind};
use apz_core::guid::{LayersId, ScrollableLayerGuid};
use apz_runtime::handoff::{OverscrollHandoffState, dispatch_scroll};
use apz_runtime::{
    ApzConfig, ApzTreeManager, FrameMetrics, NoopController, SceneNode, SceneSnapshot,
    ScrollFrameDescriptor, TouchAction,
};
use euclid::{point2, rect, vec2};
use proptest::prelude::*;
use web_time::Instant;

const L1: LayersId = LayersId(1);
const EPS: f32 = 1e-2;

fn guid(id: u64) -> ScrollableLayerGuid {
    ScrollableLayerGuid::new(L1, 0, id)
}

// ── Strategies ──────────────────────────────────────────────────────────

/// Nested frames, outermost first: (scrollable extent, initial offset).
fn arb_frames() -> impl Strategy<Value = Vec<(f32, f32)>> {
    prop::collection::vec((200.0f32..3000.0, 0.0f32..1.0), 1..5)
}

fn arb_displacement() -> impl Strategy<Value = (f32, f32)> {
    (-4000.0f32..4000.0, -4000.0f32..4000.0)
}

/// Order in which content answers a block, each answer possibly repeated.
#[derive(Debug, Clone, Copy)]
enum Answer {
    Response(bool),
    Target,
    Allowed,
}

fn arb_answers() -> impl Strategy<Value = Vec<Answer>> {
    prop::collection::vec(
        prop_oneof![
            any::<bool>().prop_map(Answer::Response),
            Just(Answer::Target),
            Just(Answer::Allowed),
        ],
        1..12,
    )
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn dispatch_conserves_displacement(frames in arb_frames(), (dx, dy) in arb_displacement()) {
        let tm = ApzTreeManager::new(L1, Arc::new(NoopController), ApzConfig::default());
        let mut scene = SceneSnapshot::new(L1, 1);
        for (depth, &(extent, _)) in frames.iter().enumerate() {
            scene = scene.with_node(SceneNode::scroll_frame(
                depth as u32,
                ScrollFrameDescriptor::new(
                    guid(depth as u64 + 1),
                    FrameMetrics::new(rect(0.0, 0.0, extent + 100.0, extent + 100.0), rect(0.0, 0.0, 100.0, 100.0)),
                ),
            ));
        }
        tm.update_hit_testing_tree(&scene);
        for (depth, &(extent, fraction)) in frames.iter().enumerate() {
            let apzc = tm.apzc(&guid(depth as u64 + 1)).unwrap();
            apzc.attempt_scroll(vec2(extent * fraction, extent * fraction));
        }

        let innermost = guid(frames.len() as u64);
        let chain = tm.handoff_chain_for(innermost).unwrap();
        prop_assert_eq!(chain.len(), frames.len());
        let before: Vec<_> = chain.iter().map(|m| m.scroll_offset()).collect();

        let result = dispatch_scroll(
            &chain,
            point2(dx, dy),
            point2(0.0, 0.0),
            &OverscrollHandoffState { chain_index: 0, allow_overscroll: false },
        );
        let total = result.total_applied() + result.residual;
        prop_assert!((total.x - dx).abs() < EPS && (total.y - dy).abs() < EPS,
            "applied {:?} + residual {:?} != ({}, {})", result.applied, result.residual, dx, dy);

        for (index, member) in chain.iter().enumerate() {
            let moved = member.scroll_offset() - before[index];
            let applied = result.applied[index];
            prop_assert!((moved.x - applied.x).abs() < EPS && (moved.y - applied.y).abs() < EPS);
            // Anything left past a member means that member is pinned.
            let rest = result.applied[index + 1..]
                .iter()
                .fold(result.residual, |acc, v| acc + *v);
            if rest.y.abs() > EPS {
                prop_assert!(!member.can_scroll_toward(vec2(0.0, rest.y)));
            }
            if rest.x.abs() > EPS {
                prop_assert!(!member.can_scroll_toward(vec2(rest.x, 0.0)));
            }
        }
    }

    #[test]
    fn content_answers_count_once(answers in arb_answers()) {
        let tm = ApzTreeManager::new(L1, Arc::new(NoopController), ApzConfig::default());
        tm.update_hit_testing_tree(&SceneSnapshot::new(L1, 1).with_node(
            SceneNode::scroll_frame(
                0,
                ScrollFrameDescriptor::new(
                    guid(1),
                    FrameMetrics::new(rect(0.0, 0.0, 500.0, 2000.0), rect(0.0, 0.0, 500.0, 500.0)),
                ),
            )
            .with_dispatch_to_content(rect(0.0, 0.0, 500.0, 500.0))
            .with_touch_action(TouchAction::Unknown),
        ));
        let now = Instant::now();
        let start: InputData = MultiTouchInput::new(TouchKind::Start, now)
            .with_touch(1, point2(100.0, 100.0))
            .into();
        let block = tm.receive_input(start, now).block_id.unwrap();

        let (mut responded, mut targeted, mut allowed) = (false, false, false);
        for answer in answers {
            let (changed, seen) = match answer {
                Answer::Response(prevent) => (
                    tm.content_received_input_block(block, prevent, now).unwrap(),
                    std::mem::replace(&mut responded, true),
                ),
                Answer::Target => (
                    tm.set_target_apzc(block, Some(guid(1)), now).unwrap(),
                    std::mem::replace(&mut targeted, true),
                ),
                Answer::Allowed => (
                    tm.set_allowed_touch_behavior(block, AllowedTouchBehavior::AUTO, now).unwrap(),
                    std::mem::replace(&mut allowed, true),
                ),
            };
            prop_assert_eq!(changed, !seen, "{:?}", answer);
        }
        let waiting = !(responded && targeted && allowed);
        prop_assert_eq!(tm.next_input_deadline().is_some(), waiting);
    }
}

#![forbid(unsafe_code)]

//! The compositor's view of the engine.
//!
//! Once per composited frame the compositor calls [`ApzSampler::sample`].
//! The sampler snapshots the APZC list under the map lock, releases it, and
//! then visits each APZC with only that APZC's lock held:
//!
//! 1. advance its animation to the frame time
//! 2. hand a fling that reached an edge to the next chain member, after the
//!    flinging APZC's lock is released; velocity nobody takes bounces the
//!    last live member
//! 3. fire a pending long press
//! 4. deliver its pending repaint
//! 5. read its async transform
//!
//! The sampler never takes the tree or input-queue locks, so a long rebuild
//! or a burst of input never stalls a frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use apz_core::guid::ScrollableLayerGuid;
use tracing::{debug_span, trace};
use web_time::Instant;

use crate::frame_metrics::AsyncTransform;
use crate::tree_manager::ApzTreeManager;

/// Transforms for one composited frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledFrame {
    pub transforms: BTreeMap<ScrollableLayerGuid, AsyncTransform>,
    /// Some APZC is still animating; composite again next vsync.
    pub needs_composite: bool,
}

impl SampledFrame {
    #[must_use]
    pub fn transform(&self, guid: &ScrollableLayerGuid) -> Option<AsyncTransform> {
        self.transforms.get(guid).copied()
    }
}

/// Sampler-role handle on a tree manager.
#[derive(Debug, Clone)]
pub struct ApzSampler {
    manager: Arc<ApzTreeManager>,
}

impl ApzSampler {
    #[must_use]
    pub fn new(manager: Arc<ApzTreeManager>) -> Self {
        Self { manager }
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<ApzTreeManager> {
        &self.manager
    }

    /// Advance every APZC to `now` and collect their transforms.
    pub fn sample(&self, now: Instant) -> SampledFrame {
        let apzcs = self.manager.apzc_snapshot();
        let _span = debug_span!(target: "apz.sampler", "sample", apzcs = apzcs.len()).entered();
        let mut frame = SampledFrame::default();

        for apzc in &apzcs {
            let advanced = apzc.advance_animations(now);
            if let Some(handoff) = advanced.handoff {
                let residual = handoff.run(now);
                trace!(
                    target: "apz.sampler",
                    from = %apzc.guid(),
                    residual_x = residual.x,
                    residual_y = residual.y,
                    "fling handed off"
                );
                frame.needs_composite = true;
            }
            apzc.check_long_press(now);
            frame.needs_composite |= advanced.active;
        }

        // Handoffs may have started animations on members visited earlier.
        for apzc in &apzcs {
            frame.needs_composite |= apzc.is_animating();
            apzc.flush_pending_repaint();
            let transform = apzc.async_transform();
            self.manager.record_sample(apzc.guid(), transform);
            frame.transforms.insert(apzc.guid(), transform);
        }
        frame
    }
}

impl ApzTreeManager {
    /// A sampler for this manager.
    #[must_use]
    pub fn sampler(self: &Arc<Self>) -> ApzSampler {
        ApzSampler::new(Arc::clone(self))
    }
}

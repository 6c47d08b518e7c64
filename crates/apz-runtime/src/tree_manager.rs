#![forbid(unsafe_code)]

//! The engine object shared by the updater, controller and sampler roles.
//!
//! [`ApzTreeManager`] owns the hit-testing tree, the guid → APZC map, the
//! input queue and the test data, each behind its own [`RankedMutex`]:
//!
//! ```text
//! input-queue → tree → map → apzc → test-data
//! ```
//!
//! - The updater calls [`ApzTreeManager::update_hit_testing_tree`]. It holds
//!   the tree lock for the whole rebuild and the map lock only to read the
//!   previous map and to swap in the new one.
//! - The controller calls [`ApzTreeManager::receive_input`] and the content
//!   API. Input routing takes the input-queue lock, hit-tests under the tree
//!   lock, releases it, and only then dispatches to APZCs.
//! - The sampler ([`ApzSampler`](crate::sampler::ApzSampler)) snapshots the
//!   map and locks each APZC in turn. It never takes the tree lock.
//!
//! # Invariants
//!
//! 1. After a rebuild returns, the map holds exactly the guids reachable in
//!    the tree.
//! 2. A controller recycled by a rebuild is the same `Arc` the previous tree
//!    held.
//! 3. An APZC is destroyed only after the map no longer names it.
//!
//! # Failure Modes
//!
//! Malformed scene nodes are dropped with their subtrees and reported in
//! the [`RebuildReport`]. Content calls naming something the engine does not
//! know return an [`ApzError`] and change nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;
use apz_core::event::{AllowedTouchBehavior, InputData, MouseButton, MouseKind};
use apz_core::geometry::{Axis, CssPoint, CssRect, ScreenPoint};
use apz_core::guid::{LayersId, ScrollableLayerGuid};
use apz_core::read_optimized::{ArcSwapStore, ReadOptimized};
use tracing::{debug, debug_span, warn};
use web_time::Instant;

use crate::apzc::{AsyncPanZoomController, EventStatus, KeyboardScrollAction};
use crate::config::ApzConfig;
use crate::controller::ContentController;
use crate::diagnostics::{ApzTestData, HitTestRecord};
use crate::error::ApzError;
use crate::focus_state::{FocusState, FocusTarget, KeyboardRouting};
use crate::handoff::{self, OverscrollHandoffChain};
use crate::hit_testing_tree::{HitTestFlags, HitTestResult, HitTestingTree, NodeData};
use crate::input_block::{BlockId, BlockKind, DragInfo};
use crate::input_queue::{BlockTarget, InputOutcome, InputQueue};
use crate::lock_order::{LockRank, RankedMutex};
use crate::scene::{RebuildReport, SceneNodeKind, SceneSnapshot};
use crate::zoom_constraints::{ZoomConstraints, ZoomConstraintsStore};

type Apzc = AsyncPanZoomController;

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// Live APZCs by guid.
#[derive(Debug, Default, Clone)]
pub struct ApzcMap {
    by_guid: AHashMap<ScrollableLayerGuid, Arc<Apzc>>,
}

impl ApzcMap {
    #[must_use]
    pub fn get(&self, guid: &ScrollableLayerGuid) -> Option<&Arc<Apzc>> {
        self.by_guid.get(guid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_guid.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_guid.is_empty()
    }

    #[must_use]
    pub fn guids(&self) -> BTreeSet<ScrollableLayerGuid> {
        self.by_guid.keys().copied().collect()
    }

    /// Every APZC, ordered by guid.
    #[must_use]
    pub fn apzcs(&self) -> Vec<Arc<Apzc>> {
        let mut all: Vec<_> = self.by_guid.values().cloned().collect();
        all.sort_by_key(|a| a.guid());
        all
    }
}

// ---------------------------------------------------------------------------
// Locked state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct TreeState {
    tree: HitTestingTree,
    focus: FocusState,
    zoom_constraints: ZoomConstraintsStore,
    /// Newest paint applied, per root layers subtree.
    last_paint: AHashMap<LayersId, u64>,
}

impl TreeState {
    fn apzc_for(&self, guid: &ScrollableLayerGuid) -> Option<Arc<Apzc>> {
        self.tree
            .primary_node(guid)
            .and_then(|id| self.tree.node(id))
            .and_then(|node| node.apzc())
            .cloned()
    }

    fn chain_for(&self, start: Option<Arc<Apzc>>) -> Arc<OverscrollHandoffChain> {
        Arc::new(match start {
            Some(apzc) => OverscrollHandoffChain::build(apzc, |a| self.tree.parent_apzc(&a.guid()).cloned()),
            None => OverscrollHandoffChain::empty(),
        })
    }
}

#[derive(Debug, Default)]
struct InputState {
    queue: InputQueue,
    /// Frame currently autoscrolling; mouse moves steer it.
    autoscroll: Option<Arc<Apzc>>,
}

// ---------------------------------------------------------------------------
// Tree manager
// ---------------------------------------------------------------------------

pub struct ApzTreeManager {
    root_layers_id: LayersId,
    controller: Arc<dyn ContentController>,
    config: Arc<ArcSwapStore<ApzConfig>>,
    input: RankedMutex<InputState>,
    tree: RankedMutex<TreeState>,
    map: RankedMutex<ApzcMap>,
    test_data: RankedMutex<ApzTestData>,
}

impl std::fmt::Debug for ApzTreeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApzTreeManager")
            .field("root_layers_id", &self.root_layers_id)
            .finish_non_exhaustive()
    }
}

impl ApzTreeManager {
    #[must_use]
    pub fn new(root_layers_id: LayersId, controller: Arc<dyn ContentController>, config: ApzConfig) -> Self {
        let test_data = ApzTestData::new(&config.diagnostics);
        let tree = HitTestingTree::empty(config.hit_test);
        Self {
            root_layers_id,
            controller,
            config: Arc::new(ArcSwapStore::new(config)),
            input: RankedMutex::new(LockRank::InputQueue, InputState::default()),
            tree: RankedMutex::new(
                LockRank::Tree,
                TreeState {
                    tree,
                    focus: FocusState::new(),
                    zoom_constraints: ZoomConstraintsStore::new(),
                    last_paint: AHashMap::new(),
                },
            ),
            map: RankedMutex::new(LockRank::Map, ApzcMap::default()),
            test_data: RankedMutex::new(LockRank::TestData, test_data),
        }
    }

    #[inline]
    #[must_use]
    pub fn root_layers_id(&self) -> LayersId {
        self.root_layers_id
    }

    // -- Configuration --------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> Arc<ApzConfig> {
        self.config.snapshot()
    }

    /// Swap in a new configuration. APZCs see it on their next event; a new
    /// hit-test policy takes effect at the next rebuild. Changed diagnostics
    /// settings restart the test data.
    pub fn set_config(&self, config: ApzConfig) {
        let diagnostics_changed = self.config.snapshot().diagnostics != config.diagnostics;
        let diagnostics = config.diagnostics.clone();
        self.config.store(config);
        if diagnostics_changed {
            *self.test_data.lock() = ApzTestData::new(&diagnostics);
        }
    }

    // -- Rebuild --------------------------------------------------------------

    /// Rebuild the hit-testing tree from a scene snapshot.
    pub fn update_hit_testing_tree(&self, snapshot: &SceneSnapshot) -> RebuildReport {
        let _span = debug_span!(
            target: "apz.tree",
            "rebuild",
            root = %snapshot.root_layers_id,
            paint = snapshot.paint_sequence_number,
        )
        .entered();
        let cfg = self.config.snapshot();
        let mut tree_guard = self.tree.lock();
        let state = &mut *tree_guard;

        let seq = snapshot.paint_sequence_number;
        if let Some(&last) = state.last_paint.get(&snapshot.root_layers_id)
            && seq < last
        {
            warn!(
                target: "apz.tree",
                root = %snapshot.root_layers_id,
                paint = seq,
                last,
                "stale scene snapshot ignored"
            );
            return RebuildReport {
                stale: true,
                ..RebuildReport::default()
            };
        }
        state.last_paint.insert(snapshot.root_layers_id, seq);

        let (kept, errors) = snapshot.sanitize();
        for error in &errors {
            warn!(target: "apz.tree", %error, "scene node dropped");
        }

        let previous = self.map.lock().clone();
        let mut next = ApzcMap::default();
        let mut report = RebuildReport {
            errors,
            ..RebuildReport::default()
        };
        let mut bucket = Vec::new();
        let mut builder = HitTestingTree::builder(cfg.hit_test);

        for &index in &kept {
            let node = &snapshot.nodes[index];
            let mut data = NodeData::new(node.layers_id, node.transform);
            data.clip = node.clip;
            data.event_regions = node.event_regions.clone();
            // Frame seen for the first time this paint, and whether it is
            // recycled. Recorded only once the node is in the tree.
            let mut first_visit = None;
            match &node.kind {
                SceneNodeKind::ScrollFrame(desc) => {
                    let guid = desc.guid;
                    let apzc = match next.by_guid.get(&guid) {
                        // Another node of a frame already visited this paint.
                        Some(apzc) => Arc::clone(apzc),
                        None => {
                            let recycled = previous.get(&guid).cloned();
                            let apzc = match recycled.as_ref() {
                                Some(apzc) => Arc::clone(apzc),
                                None => {
                                    let apzc = Arc::new(Apzc::new(
                                        guid,
                                        Arc::clone(&self.controller),
                                        Arc::clone(&self.config),
                                    ));
                                    if let Some(c) = state.zoom_constraints.get(&guid) {
                                        apzc.set_zoom_constraints(c);
                                    }
                                    apzc
                                }
                            };
                            let first_paint = snapshot.first_paint == Some(node.layers_id);
                            apzc.notify_layers_updated(desc, node.transform, first_paint);
                            first_visit = Some((Arc::clone(&apzc), recycled.is_some()));
                            apzc
                        }
                    };
                    data.apzc = Some(apzc);
                    data.handoff_parent = desc.handoff_parent;
                }
                SceneNodeKind::ScrollbarThumb(thumb) => data.thumb = Some(*thumb),
                SceneNodeKind::Container => {}
            }
            if builder.push(node.depth, data).is_none() {
                warn!(target: "apz.tree", index, "scene node has no parent in the tree");
                continue;
            }
            if let Some((apzc, recycled)) = first_visit {
                let guid = apzc.guid();
                if recycled {
                    report.recycled.push(guid);
                } else {
                    report.created.push(guid);
                }
                let metrics = apzc.metrics();
                bucket.push((
                    guid,
                    format!("{},{}", metrics.scroll_offset.x, metrics.scroll_offset.y),
                    metrics.zoom.get().to_string(),
                ));
                next.by_guid.insert(guid, apzc);
            }
        }

        state.tree = builder.finish();
        report.node_count = state.tree.len();
        let live_layers = state.tree.layers_ids();
        state.focus.retain_layers(|id| live_layers.contains(&id));

        let retired: Vec<Arc<Apzc>> = {
            let mut map = self.map.lock();
            let old = std::mem::replace(&mut *map, next);
            old.by_guid
                .into_iter()
                .filter(|(guid, _)| map.get(guid).is_none())
                .map(|(_, apzc)| apzc)
                .collect()
        };
        for apzc in retired {
            report.destroyed.push(apzc.guid());
            apzc.destroy();
        }
        report.destroyed.sort();

        {
            let mut test_data = self.test_data.lock();
            test_data.start_bucket(seq);
            for (guid, offset, zoom) in bucket {
                test_data.log(seq, guid, "scroll_offset", offset);
                test_data.log(seq, guid, "zoom", zoom);
            }
        }

        debug!(
            target: "apz.tree",
            nodes = report.node_count,
            created = report.created.len(),
            recycled = report.recycled.len(),
            destroyed = report.destroyed.len(),
            dropped = report.errors.len(),
            "rebuild complete"
        );
        report
    }

    // -- Hit testing ----------------------------------------------------------

    /// The APZC under `point` and what was hit.
    #[must_use]
    pub fn hit_test(&self, point: ScreenPoint) -> (Option<Arc<Apzc>>, HitTestFlags) {
        let result = self.hit_test_detailed(point);
        (result.apzc, result.flags)
    }

    #[must_use]
    pub fn hit_test_detailed(&self, point: ScreenPoint) -> HitTestResult {
        let result = self.tree.lock().tree.hit_test_detailed(point);
        self.record_hit_test(point, &result);
        result
    }

    fn record_hit_test(&self, point: ScreenPoint, result: &HitTestResult) {
        self.test_data.lock().record_hit_test(HitTestRecord {
            point,
            guid: result.tentative.as_ref().map(|a| a.guid()),
            flags: result.flags,
        });
    }

    // -- Input ----------------------------------------------------------------

    /// Route one input event.
    ///
    /// Events content must see (buffered while their block waits, or with
    /// no APZ target) are also handed to
    /// [`ContentController::dispatch_to_content`].
    pub fn receive_input(&self, event: InputData, now: Instant) -> InputOutcome {
        let _span = debug_span!(target: "apz.input", "receive_input", kind = event.kind_name()).entered();
        let cfg = self.config.snapshot();
        let mut input = self.input.lock();

        if let InputData::Mouse(m) = &event
            && m.kind == MouseKind::Move
            && !m.from_touch
            && let Some(apzc) = &input.autoscroll
        {
            apzc.update_autoscroll_cursor(m.point);
        }

        let new_block = input
            .queue
            .starts_block(&event, now, &cfg.input)
            .and_then(|kind| self.resolve_block(kind, &event, &cfg));
        if let Some(target) = &new_block
            && target.kind == BlockKind::Touch
        {
            handoff::cancel_animations(&target.chain);
        }

        let outcome = input.queue.receive(event.clone(), new_block, now, &cfg.input);
        drop(input);

        debug!(
            target: "apz.input",
            kind = event.kind_name(),
            status = ?outcome.status,
            block = ?outcome.block_id,
            target = ?outcome.target,
            "input routed"
        );
        if matches!(outcome.status, EventStatus::ConsumeDoDefault | EventStatus::Unconsumed) {
            self.controller
                .dispatch_to_content(&event, outcome.target, outcome.block_id);
        }
        outcome
    }

    /// Decide the target of a block about to open. `None` means the event
    /// goes to content without a block.
    fn resolve_block(&self, kind: BlockKind, event: &InputData, cfg: &ApzConfig) -> Option<BlockTarget> {
        let mut tree_guard = self.tree.lock();
        let state = &mut *tree_guard;

        if let InputData::Keyboard(key) = event {
            // Route with the focus content had seen before this key.
            let routing = state
                .focus
                .keyboard_routing(self.root_layers_id, cfg.input.optimistic_focus);
            state.focus.receive_focus_changing_event();
            let action = KeyboardScrollAction::for_input(key)?;
            let guid = match routing {
                KeyboardRouting::Content => return None,
                KeyboardRouting::Apz {
                    horizontal,
                    vertical,
                } => match action.axis {
                    Axis::X => horizontal,
                    Axis::Y => vertical,
                }?,
            };
            let apzc = state.apzc_for(&guid)?;
            let chain = Arc::new(OverscrollHandoffChain::from_members(vec![Arc::clone(&apzc)]));
            return Some(BlockTarget::confirmed(kind, Some(apzc), chain));
        }

        let point = event.hit_point()?;
        let result = state.tree.hit_test_detailed(point);
        self.record_hit_test(point, &result);

        let single_touch = matches!(event, InputData::Touch(t) if t.touches.len() == 1);
        let primary_down = matches!(event, InputData::Mouse(m) if m.kind == MouseKind::Down(MouseButton::Primary));
        if matches!(kind, BlockKind::Touch | BlockKind::Drag) {
            state.focus.receive_focus_changing_event();
        }

        if let Some(thumb) = result.thumb
            && (primary_down || (kind == BlockKind::Touch && single_touch))
            && let Some(apzc) = state.apzc_for(&thumb.target)
        {
            let chain = Arc::new(OverscrollHandoffChain::from_members(vec![Arc::clone(&apzc)]));
            state.focus.set_guess(Some(apzc.guid()));
            let mut flags = result.flags;
            flags.remove(HitTestFlags::REQUIRES_TARGET_CONFIRMATION);
            return Some(BlockTarget {
                flags,
                drag: Some(DragInfo { thumb, start: point }),
                ..BlockTarget::confirmed(BlockKind::Drag, Some(apzc), chain)
            });
        }
        if kind == BlockKind::Drag {
            return None;
        }

        let mut flags = result.flags;
        let needs_confirmation = flags.contains(HitTestFlags::DISPATCH_TO_CONTENT)
            || (kind == BlockKind::Touch && flags.contains(HitTestFlags::TOUCH_ACTION_UNKNOWN));
        flags.set(HitTestFlags::REQUIRES_TARGET_CONFIRMATION, needs_confirmation);
        let target = if needs_confirmation {
            result.tentative
        } else {
            result.apzc
        };
        if kind == BlockKind::Touch {
            state.focus.set_guess(target.as_ref().map(|a| a.guid()));
        }
        let chain = state.chain_for(target.clone());
        let allowed_touch = if kind == BlockKind::Touch {
            result.allowed_touch
        } else {
            Some(AllowedTouchBehavior::AUTO)
        };
        Some(BlockTarget {
            kind,
            target,
            chain,
            flags,
            allowed_touch,
            drag: None,
        })
    }

    /// Force overdue blocks ready. Returns how many were forced.
    pub fn process_timeouts(&self, now: Instant) -> usize {
        let cfg = self.config.snapshot();
        self.input.lock().queue.process_timeouts(now, &cfg.input)
    }

    /// Earliest time [`process_timeouts`](Self::process_timeouts) has work.
    #[must_use]
    pub fn next_input_deadline(&self) -> Option<Instant> {
        self.input.lock().queue.next_deadline()
    }

    pub fn content_received_input_block(
        &self,
        block: BlockId,
        prevent_default: bool,
        now: Instant,
    ) -> Result<bool, ApzError> {
        self.input
            .lock()
            .queue
            .content_received_input_block(block, prevent_default, now)
    }

    /// Content's choice of target for `block`; `None` means no APZ target.
    pub fn set_target_apzc(
        &self,
        block: BlockId,
        guid: Option<ScrollableLayerGuid>,
        now: Instant,
    ) -> Result<bool, ApzError> {
        let mut input = self.input.lock();
        let (target, chain) = {
            let state = self.tree.lock();
            let target = match guid {
                Some(guid) => Some(state.apzc_for(&guid).ok_or(ApzError::UnknownGuid(guid))?),
                None => None,
            };
            let chain = state.chain_for(target.clone());
            (target, chain)
        };
        input.queue.confirm_target(block, target, chain, now)
    }

    pub fn set_allowed_touch_behavior(
        &self,
        block: BlockId,
        allowed: AllowedTouchBehavior,
        now: Instant,
    ) -> Result<bool, ApzError> {
        self.input
            .lock()
            .queue
            .set_allowed_touch_behavior(block, allowed, now)
    }

    // -- Content API ----------------------------------------------------------

    fn apzc_or_err(&self, guid: &ScrollableLayerGuid) -> Result<Arc<Apzc>, ApzError> {
        self.map
            .lock()
            .get(guid)
            .cloned()
            .ok_or(ApzError::UnknownGuid(*guid))
    }

    /// Set (`Some`) or clear (`None`) the zoom limits of `guid`. They apply
    /// to the live APZC at once and to any APZC later created for `guid`.
    pub fn update_zoom_constraints(
        &self,
        guid: ScrollableLayerGuid,
        constraints: Option<ZoomConstraints>,
    ) -> Result<(), ApzError> {
        if let Some(c) = constraints
            && !c.is_valid()
        {
            return Err(ApzError::InvalidZoomConstraints {
                guid,
                min: c.min_zoom,
                max: c.max_zoom,
            });
        }
        let mut state = self.tree.lock();
        state.zoom_constraints.set(guid, constraints);
        let live = self.map.lock().get(&guid).cloned();
        if let Some(apzc) = live {
            apzc.set_zoom_constraints(constraints.unwrap_or_default());
        }
        Ok(())
    }

    /// Accept a focus target from content. Returns `false` if it was stale.
    pub fn update_focus_state(&self, target: FocusTarget) -> bool {
        self.tree.lock().focus.update(target)
    }

    /// Animate `guid` so `rect` fills its composition bounds.
    pub fn zoom_to_rect(&self, guid: ScrollableLayerGuid, rect: CssRect, now: Instant) -> Result<bool, ApzError> {
        Ok(self.apzc_or_err(&guid)?.zoom_to_rect(rect, now))
    }

    pub fn smooth_scroll_to(&self, guid: ScrollableLayerGuid, dest: CssPoint, now: Instant) -> Result<(), ApzError> {
        self.apzc_or_err(&guid)?.smooth_scroll_to(dest, now);
        Ok(())
    }

    pub fn cancel_animation(&self, guid: ScrollableLayerGuid) -> Result<(), ApzError> {
        self.apzc_or_err(&guid)?.cancel_animation();
        Ok(())
    }

    /// Start autoscrolling `guid` around `anchor`. Any other frame's
    /// autoscroll stops.
    pub fn start_autoscroll(&self, guid: ScrollableLayerGuid, anchor: ScreenPoint, now: Instant) -> Result<(), ApzError> {
        let mut input = self.input.lock();
        let apzc = self.apzc_or_err(&guid)?;
        if let Some(previous) = input.autoscroll.take()
            && previous.guid() != guid
        {
            previous.stop_autoscroll();
        }
        apzc.start_autoscroll(anchor, now);
        input.autoscroll = Some(apzc);
        Ok(())
    }

    /// Stop autoscrolling `guid`. Returns whether it was running.
    pub fn stop_autoscroll(&self, guid: ScrollableLayerGuid) -> Result<bool, ApzError> {
        let mut input = self.input.lock();
        let apzc = self.apzc_or_err(&guid)?;
        if input.autoscroll.as_ref().is_some_and(|a| a.guid() == guid) {
            input.autoscroll = None;
        }
        Ok(apzc.stop_autoscroll())
    }

    /// The chain a gesture starting on `guid` would use.
    pub fn handoff_chain_for(&self, guid: ScrollableLayerGuid) -> Result<Arc<OverscrollHandoffChain>, ApzError> {
        let state = self.tree.lock();
        let start = state.apzc_for(&guid).ok_or(ApzError::UnknownGuid(guid))?;
        Ok(state.chain_for(Some(start)))
    }

    // -- Whole-engine operations ----------------------------------------------

    pub(crate) fn apzc_snapshot(&self) -> Vec<Arc<Apzc>> {
        self.map.lock().apzcs()
    }

    /// Deliver every pending repaint. Returns how many were sent.
    pub fn flush_repaints(&self) -> usize {
        self.apzc_snapshot()
            .iter()
            .filter(|apzc| apzc.flush_pending_repaint())
            .count()
    }

    pub fn cancel_all_animations(&self) {
        for apzc in self.apzc_snapshot() {
            apzc.cancel_animation();
        }
    }

    pub fn clear_test_data(&self) {
        self.test_data.lock().clear();
    }

    /// Read the test data.
    pub fn with_test_data<R>(&self, f: impl FnOnce(&ApzTestData) -> R) -> R {
        f(&self.test_data.lock())
    }

    pub(crate) fn record_sample(&self, guid: ScrollableLayerGuid, transform: crate::frame_metrics::AsyncTransform) {
        self.test_data.lock().record_sample(guid, transform);
    }

    #[must_use]
    pub fn apzc(&self, guid: &ScrollableLayerGuid) -> Option<Arc<Apzc>> {
        self.map.lock().get(guid).cloned()
    }

    /// Guids in the map.
    #[must_use]
    pub fn guids(&self) -> BTreeSet<ScrollableLayerGuid> {
        self.map.lock().guids()
    }

    /// Guids with a node in the hit-testing tree.
    #[must_use]
    pub fn tree_guids(&self) -> BTreeSet<ScrollableLayerGuid> {
        self.tree.lock().tree.guids()
    }

    /// Number of input blocks not yet retired.
    #[must_use]
    pub fn pending_input_blocks(&self) -> usize {
        self.input.lock().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerEvent, RecordingController};
    use crate::frame_metrics::FrameMetrics;
    use crate::scene::{SceneNode, ScrollFrameDescriptor, ThumbDescriptor, TouchAction};
    use apz_core::event::{KeyCode, KeyboardInput, MultiTouchInput, ScrollWheelInput, TouchKind};
    use euclid::{point2, rect, vec2};
    use std::time::Duration;

    const L1: LayersId = LayersId(1);
    const MS_16: Duration = Duration::from_millis(16);

    fn guid(id: u64) -> ScrollableLayerGuid {
        ScrollableLayerGuid::new(L1, 0, id)
    }

    fn frame(depth: u32, id: u64, size: f32, content: f32) -> SceneNode {
        SceneNode::scroll_frame(
            depth,
            ScrollFrameDescriptor::new(
                guid(id),
                FrameMetrics::new(rect(0.0, 0.0, content, content), rect(0.0, 0.0, size, size)),
            ),
        )
    }

    /// Root frame 1 (500x500 over 2000) containing frame 2 (200x200 over 1000).
    fn nested(seq: u64) -> SceneSnapshot {
        SceneSnapshot::new(L1, seq)
            .with_node(frame(0, 1, 500.0, 2000.0))
            .with_node(frame(1, 2, 200.0, 1000.0))
    }

    fn manager() -> (ApzTreeManager, Arc<RecordingController>) {
        let recorder = Arc::new(RecordingController::new());
        let config = ApzConfig {
            diagnostics: crate::config::DiagnosticsConfig {
                test_logging: true,
                ..Default::default()
            },
            ..ApzConfig::default()
        };
        (ApzTreeManager::new(L1, recorder.clone(), config), recorder)
    }

    fn touch(kind: TouchKind, t: Instant, p: ScreenPoint) -> InputData {
        MultiTouchInput::new(kind, t).with_touch(1, p).into()
    }

    #[test]
    fn rebuild_creates_recycles_and_destroys() {
        let (tm, recorder) = manager();
        let first = tm.update_hit_testing_tree(&nested(1).with_first_paint(L1));
        assert_eq!(first.created, vec![guid(1), guid(2)]);
        let inner = tm.apzc(&guid(2)).unwrap();

        let second = tm.update_hit_testing_tree(&nested(2));
        assert_eq!(second.recycled, vec![guid(1), guid(2)]);
        assert!(Arc::ptr_eq(&inner, &tm.apzc(&guid(2)).unwrap()));

        let third = tm.update_hit_testing_tree(&SceneSnapshot::new(L1, 3).with_node(frame(0, 1, 500.0, 2000.0)));
        assert_eq!(third.destroyed, vec![guid(2)]);
        assert!(inner.is_destroyed());
        assert_eq!(recorder.destroyed(), vec![guid(2)]);
        assert_eq!(tm.guids(), tm.tree_guids());
    }

    #[test]
    fn dropped_nodes_get_no_controller() {
        let (tm, _) = manager();
        tm.update_hit_testing_tree(&nested(1));
        let inner = tm.apzc(&guid(2)).unwrap();

        // Frame 2 moves under a second root, which is left out of the tree.
        let report = tm.update_hit_testing_tree(
            &SceneSnapshot::new(L1, 2)
                .with_node(frame(0, 1, 500.0, 2000.0))
                .with_node(frame(0, 3, 300.0, 900.0))
                .with_node(frame(1, 2, 200.0, 1000.0)),
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.recycled, vec![guid(1)]);
        assert!(report.created.is_empty());
        assert_eq!(report.destroyed, vec![guid(2)]);
        assert!(inner.is_destroyed());
        assert_eq!(tm.guids(), tm.tree_guids());
        assert_eq!(tm.guids().into_iter().collect::<Vec<_>>(), vec![guid(1)]);
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let (tm, _) = manager();
        tm.update_hit_testing_tree(&nested(5));
        let report = tm.update_hit_testing_tree(&SceneSnapshot::new(L1, 4));
        assert!(report.stale);
        assert_eq!(tm.guids().len(), 2);
    }

    #[test]
    fn malformed_subtree_is_dropped_and_destroyed() {
        let (tm, _) = manager();
        tm.update_hit_testing_tree(&nested(1));
        let bad = SceneSnapshot::new(L1, 2)
            .with_node(frame(0, 1, 500.0, 2000.0))
            .with_node(frame(3, 2, 200.0, 1000.0));
        let report = tm.update_hit_testing_tree(&bad);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.destroyed, vec![guid(2)]);
        assert_eq!(tm.guids(), BTreeSet::from([guid(1)]));
    }

    #[test]
    fn rebuild_fills_diagnostics_bucket() {
        let (tm, _) = manager();
        tm.update_hit_testing_tree(&nested(7));
        let offset = tm.with_test_data(|d| {
            d.bucket(7)
                .and_then(|b| b.get(&guid(2)))
                .and_then(|m| m.get("scroll_offset"))
                .cloned()
        });
        assert_eq!(offset.as_deref(), Some("0,0"));
    }

    #[test]
    fn cached_zoom_constraints_apply_on_creation() {
        let (tm, _) = manager();
        tm.update_zoom_constraints(guid(2), Some(ZoomConstraints::fixed(2.0))).unwrap();
        tm.update_hit_testing_tree(&nested(1));
        let inner = tm.apzc(&guid(2)).unwrap();
        assert_eq!(inner.zoom_constraints(), ZoomConstraints::fixed(2.0));
        assert_eq!(inner.zoom(), 2.0);
        tm.update_zoom_constraints(guid(2), None).unwrap();
        assert_eq!(inner.zoom_constraints(), ZoomConstraints::default());
    }

    #[test]
    fn invalid_zoom_constraints_are_rejected() {
        let (tm, _) = manager();
        let bad = ZoomConstraints::default().with_range(4.0, 1.0);
        assert!(matches!(
            tm.update_zoom_constraints(guid(1), Some(bad)),
            Err(ApzError::InvalidZoomConstraints { .. })
        ));
    }

    #[test]
    fn touch_drag_scrolls_innermost_frame() {
        let (tm, _) = manager();
        tm.update_hit_testing_tree(&nested(1));
        let t0 = Instant::now();
        let start = tm.receive_input(touch(TouchKind::Start, t0, point2(100.0, 150.0)), t0);
        assert_eq!(start.target, Some(guid(2)));
        tm.receive_input(touch(TouchKind::Move, t0 + MS_16, point2(100.0, 50.0)), t0 + MS_16);
        assert_eq!(tm.apzc(&guid(2)).unwrap().scroll_offset(), point2(0.0, 100.0));
        assert_eq!(tm.apzc(&guid(1)).unwrap().scroll_offset(), point2(0.0, 0.0));
    }

    #[test]
    fn unknown_touch_action_waits_for_content() {
        let (tm, recorder) = manager();
        let snapshot = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1, 500.0, 2000.0).with_touch_action(TouchAction::Unknown));
        tm.update_hit_testing_tree(&snapshot);
        let t0 = Instant::now();
        let out = tm.receive_input(touch(TouchKind::Start, t0, point2(10.0, 300.0)), t0);
        assert!(out.flags.contains(HitTestFlags::TOUCH_ACTION_UNKNOWN));
        tm.receive_input(touch(TouchKind::Move, t0 + MS_16, point2(10.0, 200.0)), t0 + MS_16);
        assert_eq!(recorder.dispatched_to_content(), 2);
        assert_eq!(tm.apzc(&guid(1)).unwrap().scroll_offset(), point2(0.0, 0.0));

        let block = out.block_id.unwrap();
        tm.set_allowed_touch_behavior(block, AllowedTouchBehavior::AUTO, t0).unwrap();
        tm.content_received_input_block(block, false, t0).unwrap();
        assert_eq!(tm.set_target_apzc(block, Some(guid(1)), t0 + MS_16), Ok(true));
        assert_eq!(tm.apzc(&guid(1)).unwrap().scroll_offset(), point2(0.0, 100.0));
        assert_eq!(
            tm.set_target_apzc(block, Some(guid(9)), t0),
            Err(ApzError::UnknownGuid(guid(9)))
        );
    }

    #[test]
    fn wheel_over_dispatch_to_content_region_times_out() {
        let (tm, _) = manager();
        let snapshot = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1, 500.0, 2000.0).with_dispatch_to_content(rect(0.0, 0.0, 500.0, 500.0)));
        tm.update_hit_testing_tree(&snapshot);
        let (hit, flags) = tm.hit_test(point2(10.0, 10.0));
        assert!(hit.is_none());
        assert!(flags.contains(HitTestFlags::DISPATCH_TO_CONTENT));

        let t0 = Instant::now();
        let out = tm.receive_input(ScrollWheelInput::new(point2(10.0, 10.0), vec2(0.0, 40.0), t0).into(), t0);
        assert_eq!(out.status, EventStatus::ConsumeDoDefault);
        assert_eq!(tm.next_input_deadline(), Some(t0 + tm.config().input.content_response_timeout()));
        assert_eq!(tm.process_timeouts(t0 + Duration::from_secs(1)), 1);
        assert_eq!(tm.apzc(&guid(1)).unwrap().scroll_offset(), point2(0.0, 40.0));
    }

    #[test]
    fn thumb_mouse_drag_scrolls_target() {
        let (tm, _) = manager();
        let thumb = ThumbDescriptor {
            target: guid(1),
            axis: Axis::Y,
            thumb_length: 125.0,
            track_length: 500.0,
        };
        let snapshot = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1, 500.0, 2000.0))
            .with_node(SceneNode::thumb(1, rect(490.0, 0.0, 10.0, 125.0), thumb));
        tm.update_hit_testing_tree(&snapshot);
        let t = Instant::now();
        let mouse = |kind, y| -> InputData { apz_core::event::MouseInput::new(kind, point2(495.0, y), t).into() };
        let down = tm.receive_input(mouse(MouseKind::Down(MouseButton::Primary), 10.0), t);
        assert!(down.flags.contains(HitTestFlags::SCROLLBAR_THUMB));
        tm.receive_input(mouse(MouseKind::Move, 47.5), t);
        // 37.5px of a 375px track over a 1500px range.
        assert_eq!(tm.apzc(&guid(1)).unwrap().scroll_offset(), point2(0.0, 150.0));
        tm.receive_input(mouse(MouseKind::Up(MouseButton::Primary), 47.5), t);
        assert_eq!(tm.pending_input_blocks(), 0);
    }

    #[test]
    fn keyboard_follows_confirmed_focus() {
        let (tm, recorder) = manager();
        tm.update_hit_testing_tree(&nested(1));
        let t = Instant::now();
        let key = || -> InputData { KeyboardInput::new(KeyCode::Down, t).into() };

        // No focus target yet: content gets the key.
        let out = tm.receive_input(key(), t);
        assert_eq!(out.status, EventStatus::Unconsumed);
        assert_eq!(recorder.dispatched_to_content(), 1);

        assert!(tm.update_focus_state(FocusTarget::scroll_targets(L1, 1, None, Some(guid(2)))));
        let out = tm.receive_input(key(), t);
        assert_eq!(out.target, Some(guid(2)));
        let inner = tm.apzc(&guid(2)).unwrap();
        assert!(inner.scroll_offset().y > 0.0 || inner.is_animating());

        // Content has not seen the last key yet; with no guess it goes to content.
        let out = tm.receive_input(key(), t);
        assert_eq!(out.target, None);
    }

    #[test]
    fn autoscroll_follows_mouse_until_stopped() {
        let (tm, _) = manager();
        tm.update_hit_testing_tree(&nested(1));
        let t = Instant::now();
        tm.start_autoscroll(guid(1), point2(250.0, 250.0), t).unwrap();
        let apzc = tm.apzc(&guid(1)).unwrap();
        assert!(apzc.is_animating());
        tm.receive_input(
            apz_core::event::MouseInput::new(MouseKind::Move, point2(250.0, 400.0), t).into(),
            t,
        );
        apzc.advance_animations(t + Duration::from_millis(100));
        assert!(apzc.scroll_offset().y > 0.0);
        assert_eq!(tm.stop_autoscroll(guid(1)), Ok(true));
        assert_eq!(tm.stop_autoscroll(guid(1)), Ok(false));
        assert_eq!(tm.stop_autoscroll(guid(9)), Err(ApzError::UnknownGuid(guid(9))));
    }

    #[test]
    fn content_api_reports_unknown_guids() {
        let (tm, _) = manager();
        let t = Instant::now();
        assert_eq!(tm.cancel_animation(guid(3)), Err(ApzError::UnknownGuid(guid(3))));
        assert!(tm.smooth_scroll_to(guid(3), point2(0.0, 10.0), t).is_err());
        assert!(tm.zoom_to_rect(guid(3), rect(0.0, 0.0, 10.0, 10.0), t).is_err());
    }

    #[test]
    fn flush_repaints_sends_pending_requests() {
        let (tm, recorder) = manager();
        tm.update_hit_testing_tree(&nested(1));
        tm.smooth_scroll_to(guid(1), point2(0.0, 300.0), Instant::now()).unwrap();
        tm.apzc(&guid(1)).unwrap().advance_animations(Instant::now() + Duration::from_secs(5));
        assert_eq!(tm.flush_repaints(), 1);
        assert_eq!(tm.flush_repaints(), 0);
        assert!(recorder
            .events()
            .iter()
            .any(|e| matches!(e, ControllerEvent::Repaint(r) if r.guid == guid(1))));
    }
}

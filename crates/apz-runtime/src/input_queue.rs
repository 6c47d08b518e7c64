#![forbid(unsafe_code)]

//! Ordering and disambiguation of input before it reaches an APZC.
//!
//! Every gesture becomes an [`InputBlock`]. A block that needs content's
//! opinion (its hit landed in a dispatch-to-content region, or the touch
//! behavior there is unknown) buffers its events until content answers or
//! the block's deadline passes. Blocks are served strictly in arrival
//! order: a block that is not ready holds back every later block.
//!
//! The queue never hit-tests. The caller decides, with
//! [`InputQueue::starts_block`], whether an event opens a gesture, resolves
//! the target with the tree, and passes it in as a [`BlockTarget`].
//!
//! # Invariants
//!
//! 1. Events of one block reach its target in arrival order.
//! 2. A block id is issued once; after a block retires, content calls naming
//!    it are accepted as no-ops.
//! 3. Events of a prevented block never reach an APZC.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashSet;
use apz_core::event::{AllowedTouchBehavior, InputData, MouseKind, PinchKind, TouchKind};
use apz_core::guid::ScrollableLayerGuid;
use tracing::debug;
use web_time::Instant;

use crate::apzc::{AsyncPanZoomController, EventStatus};
use crate::config::InputConfig;
use crate::error::ApzError;
use crate::handoff::OverscrollHandoffChain;
use crate::hit_testing_tree::HitTestFlags;
use crate::input_block::{BlockId, BlockKind, DragInfo, InputBlock};

type Apzc = AsyncPanZoomController;

/// Target resolution for a block about to open.
#[derive(Debug, Clone)]
pub struct BlockTarget {
    pub kind: BlockKind,
    /// Tentative target; final unless `flags` asks for confirmation.
    pub target: Option<Arc<Apzc>>,
    pub chain: Arc<OverscrollHandoffChain>,
    pub flags: HitTestFlags,
    /// `None` waits for content to say.
    pub allowed_touch: Option<AllowedTouchBehavior>,
    pub drag: Option<DragInfo>,
}

impl BlockTarget {
    /// A block with a known, final target.
    #[must_use]
    pub fn confirmed(kind: BlockKind, target: Option<Arc<Apzc>>, chain: Arc<OverscrollHandoffChain>) -> Self {
        Self {
            kind,
            target,
            chain,
            flags: HitTestFlags::empty(),
            allowed_touch: Some(AllowedTouchBehavior::AUTO),
            drag: None,
        }
    }

    fn needs_confirmation(&self) -> bool {
        self.flags.contains(HitTestFlags::REQUIRES_TARGET_CONFIRMATION)
    }
}

/// What happened to one received event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputOutcome {
    pub status: EventStatus,
    pub block_id: Option<BlockId>,
    pub target: Option<ScrollableLayerGuid>,
    pub flags: HitTestFlags,
}

impl InputOutcome {
    #[must_use]
    pub fn unconsumed() -> Self {
        Self {
            status: EventStatus::Unconsumed,
            block_id: None,
            target: None,
            flags: HitTestFlags::empty(),
        }
    }
}

#[derive(Debug)]
struct QueuedEvent {
    token: u64,
    event: InputData,
}

#[derive(Debug)]
struct QueuedBlock {
    block: InputBlock,
    pending: VecDeque<QueuedEvent>,
}

/// Blocks still accepting events, by family.
#[derive(Debug, Default)]
struct ActiveBlocks {
    touch: Option<BlockId>,
    touch_points: AHashSet<i32>,
    /// The active touch block is a scrollbar drag; its touches are replayed
    /// as mouse events.
    touch_is_drag: bool,
    wheel: Option<(BlockId, Instant)>,
    drag: Option<BlockId>,
    pinch: Option<BlockId>,
}

#[derive(Debug, Default)]
pub struct InputQueue {
    blocks: VecDeque<QueuedBlock>,
    next_block: u64,
    next_token: u64,
    active: ActiveBlocks,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks not yet retired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&InputBlock> {
        self.blocks.iter().find(|q| q.block.id() == id).map(|q| &q.block)
    }

    /// Events buffered in `id` waiting for it to become ready.
    #[must_use]
    pub fn buffered_events(&self, id: BlockId) -> usize {
        self.blocks
            .iter()
            .find(|q| q.block.id() == id)
            .map_or(0, |q| q.pending.len())
    }

    /// Whether `event` opens a new block, and its kind.
    #[must_use]
    pub fn starts_block(&self, event: &InputData, now: Instant, cfg: &InputConfig) -> Option<BlockKind> {
        match event {
            InputData::Touch(t) => (t.kind == TouchKind::Start && self.active.touch.is_none())
                .then_some(BlockKind::Touch),
            InputData::Mouse(m) => {
                matches!(m.kind, MouseKind::Down(_)).then_some(BlockKind::Drag)
            }
            InputData::Wheel(_) => match self.active.wheel {
                Some((_, last))
                    if now.saturating_duration_since(last) < cfg.wheel_transaction_timeout() =>
                {
                    None
                }
                _ => Some(BlockKind::Wheel),
            },
            InputData::Pinch(p) => (p.kind == PinchKind::Start).then_some(BlockKind::Pinch),
            InputData::Keyboard(_) => Some(BlockKind::Keyboard),
        }
    }

    /// Queue `event`, opening a block for it when `new_block` is given, and
    /// deliver whatever became deliverable.
    pub fn receive(
        &mut self,
        event: InputData,
        new_block: Option<BlockTarget>,
        now: Instant,
        cfg: &InputConfig,
    ) -> InputOutcome {
        let id = match new_block {
            Some(target) => Some(self.open_block(target, &event, now, cfg)),
            None => self.active_block_for(&event),
        };
        let Some(id) = id else {
            return InputOutcome::unconsumed();
        };

        let event = self.translate(event);
        self.track_gesture_end(id, &event, now);

        let token = self.next_token;
        self.next_token += 1;
        let Some(queued) = self.blocks.iter_mut().find(|q| q.block.id() == id) else {
            return InputOutcome::unconsumed();
        };
        queued.pending.push_back(QueuedEvent { token, event });
        let target = queued.block.target().map(|a| a.guid());
        let flags = queued.block.hit_flags();

        let delivered = self.flush(now);
        let status = delivered
            .into_iter()
            .find_map(|(t, s)| (t == token).then_some(s))
            .unwrap_or(EventStatus::ConsumeDoDefault);
        InputOutcome {
            status,
            block_id: Some(id),
            target,
            flags,
        }
    }

    fn open_block(&mut self, target: BlockTarget, event: &InputData, now: Instant, cfg: &InputConfig) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;

        // A new gesture closes any open wheel transaction.
        if let Some((wheel, _)) = self.active.wheel.take() {
            self.end_block(wheel);
        }

        let needs_confirmation = target.needs_confirmation();
        let mut block = InputBlock::new(
            id,
            target.kind,
            target.target.clone(),
            Arc::clone(&target.chain),
            target.flags,
            needs_confirmation,
            now + cfg.content_response_timeout(),
        );
        if target.kind == BlockKind::Touch || target.kind == BlockKind::Pinch {
            block = block.with_allowed_touch(target.allowed_touch);
        }
        if let Some(drag) = target.drag {
            block = block.with_drag(drag);
        }

        match target.kind {
            BlockKind::Touch => self.active.touch = Some(id),
            BlockKind::Drag => {
                self.active.drag = Some(id);
                if matches!(event, InputData::Touch(_)) {
                    self.active.touch = Some(id);
                    self.active.touch_is_drag = true;
                }
            }
            BlockKind::Wheel => self.active.wheel = Some((id, now)),
            BlockKind::Pinch => self.active.pinch = Some(id),
            BlockKind::Keyboard => block.mark_ended(),
        }
        if target.kind == BlockKind::Touch || self.active.touch_is_drag {
            self.active.touch_points.clear();
        }

        debug!(
            target: "apz.input",
            block = %id,
            kind = ?target.kind,
            target = ?target.target.as_ref().map(|a| a.guid()),
            needs_confirmation,
            "block opened"
        );
        self.blocks.push_back(QueuedBlock {
            block,
            pending: VecDeque::new(),
        });
        id
    }

    fn active_block_for(&self, event: &InputData) -> Option<BlockId> {
        match event {
            InputData::Touch(_) => self.active.touch,
            InputData::Mouse(_) => self.active.drag,
            InputData::Wheel(_) => self.active.wheel.map(|(id, _)| id),
            InputData::Pinch(_) => self.active.pinch,
            InputData::Keyboard(_) => None,
        }
    }

    /// Touches of a drag block become mouse events.
    fn translate(&self, event: InputData) -> InputData {
        match event {
            InputData::Touch(t) if self.active.touch_is_drag => match t.to_synthetic_mouse() {
                Some(mouse) => InputData::Mouse(mouse),
                None => InputData::Touch(t),
            },
            other => other,
        }
    }

    fn track_gesture_end(&mut self, id: BlockId, event: &InputData, now: Instant) {
        let ended = match event {
            InputData::Touch(t) => {
                match t.kind {
                    TouchKind::Start => {
                        self.active.touch_points.extend(t.touches.iter().map(|p| p.identifier));
                    }
                    TouchKind::Move => {}
                    TouchKind::End => {
                        for p in &t.touches {
                            self.active.touch_points.remove(&p.identifier);
                        }
                    }
                    TouchKind::Cancel => self.active.touch_points.clear(),
                }
                t.kind != TouchKind::Start
                    && t.kind != TouchKind::Move
                    && self.active.touch_points.is_empty()
            }
            InputData::Mouse(m) => {
                if m.from_touch {
                    match m.kind {
                        MouseKind::Down(_) => {
                            self.active.touch_points.insert(0);
                        }
                        MouseKind::Up(_) => self.active.touch_points.clear(),
                        MouseKind::Move => {}
                    }
                }
                matches!(m.kind, MouseKind::Up(_))
            }
            InputData::Wheel(_) => {
                if let Some((wheel, last)) = self.active.wheel.as_mut()
                    && *wheel == id
                {
                    *last = now;
                }
                false
            }
            InputData::Pinch(p) => p.kind == PinchKind::End,
            InputData::Keyboard(_) => true,
        };
        if ended {
            self.end_block(id);
        }
    }

    fn end_block(&mut self, id: BlockId) {
        if let Some(q) = self.blocks.iter_mut().find(|q| q.block.id() == id) {
            q.block.mark_ended();
        }
        let active = &mut self.active;
        if active.touch == Some(id) {
            active.touch = None;
            active.touch_is_drag = false;
            active.touch_points.clear();
        }
        if active.drag == Some(id) {
            active.drag = None;
        }
        if active.pinch == Some(id) {
            active.pinch = None;
        }
        if active.wheel.is_some_and(|(w, _)| w == id) {
            active.wheel = None;
        }
    }

    /// Deliver buffered events of ready blocks, front to back, stopping at
    /// the first block that is not ready. Ended blocks with nothing left are
    /// retired.
    fn flush(&mut self, now: Instant) -> Vec<(u64, EventStatus)> {
        let mut delivered = Vec::new();
        for queued in &mut self.blocks {
            if !queued.block.is_ready() {
                break;
            }
            if queued.pending.is_empty() {
                continue;
            }
            let ctx = queued.block.context();
            let prevented = queued.block.is_prevented();
            let target = queued.block.target().cloned();
            while let Some(QueuedEvent { token, event }) = queued.pending.pop_front() {
                let status = match (&target, prevented) {
                    (_, true) => EventStatus::Ignore,
                    (None, false) => EventStatus::Unconsumed,
                    (Some(apzc), false) => apzc.handle_input_event(&event, &ctx, now),
                };
                delivered.push((token, status));
            }
        }
        let before = self.blocks.len();
        self.blocks
            .retain(|q| !(q.block.is_ended() && q.block.is_ready() && q.pending.is_empty()));
        if self.blocks.len() != before {
            tracing::trace!(target: "apz.input", retired = before - self.blocks.len(), "blocks retired");
        }
        delivered
    }

    fn find_mut(&mut self, id: BlockId) -> Result<Option<&mut InputBlock>, ApzError> {
        if id.0 >= self.next_block {
            return Err(ApzError::UnknownBlock(id));
        }
        Ok(self
            .blocks
            .iter_mut()
            .find(|q| q.block.id() == id)
            .map(|q| &mut q.block))
    }

    /// Content's `preventDefault` answer for a block.
    pub fn content_received_input_block(
        &mut self,
        id: BlockId,
        prevent_default: bool,
        now: Instant,
    ) -> Result<bool, ApzError> {
        let changed = match self.find_mut(id)? {
            Some(block) => block.set_content_response(prevent_default),
            None => false,
        };
        if changed {
            debug!(target: "apz.input", block = %id, prevent_default, "content responded");
            self.flush(now);
        }
        Ok(changed)
    }

    /// Content's choice of target for a block.
    pub fn confirm_target(
        &mut self,
        id: BlockId,
        target: Option<Arc<Apzc>>,
        chain: Arc<OverscrollHandoffChain>,
        now: Instant,
    ) -> Result<bool, ApzError> {
        let guid = target.as_ref().map(|a| a.guid());
        let changed = match self.find_mut(id)? {
            Some(block) => block.confirm_target(target, chain),
            None => false,
        };
        if changed {
            debug!(target: "apz.input", block = %id, target = ?guid, "target confirmed");
            self.flush(now);
        }
        Ok(changed)
    }

    /// Touch behaviors content allows for a block.
    pub fn set_allowed_touch_behavior(
        &mut self,
        id: BlockId,
        allowed: AllowedTouchBehavior,
        now: Instant,
    ) -> Result<bool, ApzError> {
        let changed = match self.find_mut(id)? {
            Some(block) => block.set_allowed_touch(allowed),
            None => false,
        };
        if changed {
            self.flush(now);
        }
        Ok(changed)
    }

    /// Force every overdue block ready with "allow" and close idle wheel
    /// transactions. Returns how many blocks were forced.
    pub fn process_timeouts(&mut self, now: Instant, cfg: &InputConfig) -> usize {
        let mut forced = 0;
        for queued in &mut self.blocks {
            if queued.block.time_out(now) {
                forced += 1;
                debug!(target: "apz.input", block = %queued.block.id(), "block timed out");
            }
        }
        if let Some((wheel, last)) = self.active.wheel
            && now.saturating_duration_since(last) >= cfg.wheel_transaction_timeout()
        {
            self.end_block(wheel);
        }
        self.flush(now);
        forced
    }

    /// Earliest deadline among blocks still waiting on content.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.blocks
            .iter()
            .filter(|q| !q.block.is_ready())
            .map(|q| q.block.deadline())
            .min()
    }

    /// Drop every block and open gesture.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.active = ActiveBlocks::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApzConfig;
    use crate::controller::{NoopController, RecordingController};
    use crate::frame_metrics::FrameMetrics;
    use crate::scene::ScrollFrameDescriptor;
    use apz_core::event::{MultiTouchInput, ScrollWheelInput};
    use apz_core::geometry::LayerToScreenTransform;
    use apz_core::guid::LayersId;
    use apz_core::read_optimized::ArcSwapStore;
    use euclid::{point2, rect, vec2};
    use std::time::Duration;

    const MS_16: Duration = Duration::from_millis(16);
    const MS_500: Duration = Duration::from_millis(500);

    fn apzc(id: u64) -> Arc<Apzc> {
        let guid = ScrollableLayerGuid::new(LayersId(1), 0, id);
        let a = Arc::new(Apzc::new(
            guid,
            Arc::new(NoopController),
            Arc::new(ArcSwapStore::new(ApzConfig::default())),
        ));
        a.notify_layers_updated(
            &ScrollFrameDescriptor::new(
                guid,
                FrameMetrics::new(rect(0.0, 0.0, 1000.0, 1000.0), rect(0.0, 0.0, 500.0, 500.0)),
            ),
            LayerToScreenTransform::identity(),
            true,
        );
        a
    }

    fn chain(a: &Arc<Apzc>) -> Arc<OverscrollHandoffChain> {
        Arc::new(OverscrollHandoffChain::from_members(vec![Arc::clone(a)]))
    }

    fn touch(kind: TouchKind, t: Instant, y: f32) -> InputData {
        MultiTouchInput::new(kind, t).with_touch(1, point2(100.0, y)).into()
    }

    fn unconfirmed(a: &Arc<Apzc>) -> BlockTarget {
        BlockTarget {
            flags: HitTestFlags::VISIBLE
                | HitTestFlags::DISPATCH_TO_CONTENT
                | HitTestFlags::REQUIRES_TARGET_CONFIRMATION,
            ..BlockTarget::confirmed(BlockKind::Touch, Some(Arc::clone(a)), chain(a))
        }
    }

    /// Feed a whole vertical drag from y=300 to y=200.
    fn drag(q: &mut InputQueue, first: Option<BlockTarget>, t0: Instant) -> Vec<InputOutcome> {
        let cfg = InputConfig::default();
        let mut out = vec![q.receive(touch(TouchKind::Start, t0, 300.0), first, t0, &cfg)];
        out.push(q.receive(touch(TouchKind::Move, t0 + MS_16, 200.0), None, t0 + MS_16, &cfg));
        out.push(q.receive(touch(TouchKind::End, t0 + MS_500, 200.0), None, t0 + MS_500, &cfg));
        out
    }

    #[test]
    fn fast_path_dispatches_immediately() {
        let a = apzc(1);
        let mut q = InputQueue::new();
        let t0 = Instant::now();
        let out = drag(&mut q, Some(BlockTarget::confirmed(BlockKind::Touch, Some(a.clone()), chain(&a))), t0);
        assert!(out.iter().all(|o| o.status == EventStatus::ConsumeNoDefault));
        assert_eq!(a.scroll_offset(), point2(0.0, 100.0));
        assert!(q.is_empty());
    }

    #[test]
    fn unconfirmed_block_buffers_until_content_answers() {
        let a = apzc(1);
        let mut q = InputQueue::new();
        let t0 = Instant::now();
        let out = drag(&mut q, Some(unconfirmed(&a)), t0);
        let id = out[0].block_id.unwrap();
        assert!(out.iter().all(|o| o.status == EventStatus::ConsumeDoDefault));
        assert_eq!(q.buffered_events(id), 3);
        assert_eq!(a.scroll_offset(), point2(0.0, 0.0));

        let now = t0 + MS_500;
        assert_eq!(q.confirm_target(id, Some(a.clone()), chain(&a), now), Ok(true));
        assert_eq!(a.scroll_offset(), point2(0.0, 0.0));
        assert_eq!(q.content_received_input_block(id, false, now), Ok(true));
        assert_eq!(a.scroll_offset(), point2(0.0, 100.0));
        assert!(q.is_empty());
    }

    #[test]
    fn prevented_block_never_reaches_apzc() {
        let a = apzc(1);
        let mut q = InputQueue::new();
        let t0 = Instant::now();
        let id = drag(&mut q, Some(unconfirmed(&a)), t0)[0].block_id.unwrap();
        q.confirm_target(id, Some(a.clone()), chain(&a), t0).unwrap();
        q.content_received_input_block(id, true, t0).unwrap();
        assert_eq!(a.scroll_offset(), point2(0.0, 0.0));
        assert!(q.is_empty());
    }

    #[test]
    fn duplicate_and_retired_responses_are_no_ops() {
        let a = apzc(1);
        let mut q = InputQueue::new();
        let t0 = Instant::now();
        let id = drag(&mut q, Some(unconfirmed(&a)), t0)[0].block_id.unwrap();
        assert_eq!(q.content_received_input_block(id, false, t0), Ok(true));
        assert_eq!(q.content_received_input_block(id, true, t0), Ok(false));
        q.confirm_target(id, Some(a.clone()), chain(&a), t0).unwrap();
        assert!(q.block(id).is_none());
        assert_eq!(q.content_received_input_block(id, true, t0), Ok(false));
        assert_eq!(q.confirm_target(id, None, chain(&a), t0), Ok(false));
        assert_eq!(
            q.content_received_input_block(BlockId(99), false, t0),
            Err(ApzError::UnknownBlock(BlockId(99)))
        );
    }

    #[test]
    fn timeout_force_confirms_with_allow() {
        let a = apzc(1);
        let mut q = InputQueue::new();
        let cfg = InputConfig::default();
        let t0 = Instant::now();
        let id = drag(&mut q, Some(unconfirmed(&a)), t0)[0].block_id.unwrap();
        assert_eq!(q.next_deadline(), Some(t0 + cfg.content_response_timeout()));
        assert_eq!(q.process_timeouts(t0 + Duration::from_millis(100), &cfg), 0);
        assert_eq!(q.process_timeouts(t0 + cfg.content_response_timeout(), &cfg), 1);
        assert_eq!(a.scroll_offset(), point2(0.0, 100.0));
        assert!(q.block(id).is_none());
    }

    #[test]
    fn unready_block_holds_back_later_blocks() {
        let a = apzc(1);
        let mut q = InputQueue::new();
        let cfg = InputConfig::default();
        let t0 = Instant::now();
        let first = drag(&mut q, Some(unconfirmed(&a)), t0)[0].block_id.unwrap();
        let t1 = t0 + Duration::from_secs(1);
        let wheel: InputData = ScrollWheelInput::new(point2(10.0, 10.0), vec2(0.0, 50.0), t1).into();
        let kind = q.starts_block(&wheel, t1, &cfg);
        assert_eq!(kind, Some(BlockKind::Wheel));
        let out = q.receive(
            wheel,
            Some(BlockTarget::confirmed(BlockKind::Wheel, Some(a.clone()), chain(&a))),
            t1,
            &cfg,
        );
        assert_eq!(out.status, EventStatus::ConsumeDoDefault);
        assert_eq!(a.scroll_offset(), point2(0.0, 0.0));
        q.content_received_input_block(first, false, t1).unwrap();
        q.confirm_target(first, Some(a.clone()), chain(&a), t1).unwrap();
        // Touch drag (100) then wheel (50), in that order.
        assert_eq!(a.scroll_offset(), point2(0.0, 150.0));
    }

    #[test]
    fn wheel_events_join_transaction_until_timeout() {
        let mut q = InputQueue::new();
        let cfg = InputConfig::default();
        let a = apzc(1);
        let t0 = Instant::now();
        let wheel = |t| -> InputData { ScrollWheelInput::new(point2(10.0, 10.0), vec2(0.0, 10.0), t).into() };
        let first = q.receive(
            wheel(t0),
            Some(BlockTarget::confirmed(BlockKind::Wheel, Some(a.clone()), chain(&a))),
            t0,
            &cfg,
        );
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(q.starts_block(&wheel(t1), t1, &cfg), None);
        let second = q.receive(wheel(t1), None, t1, &cfg);
        assert_eq!(first.block_id, second.block_id);
        let late = t1 + cfg.wheel_transaction_timeout();
        assert_eq!(q.starts_block(&wheel(late), late, &cfg), Some(BlockKind::Wheel));
        q.process_timeouts(late, &cfg);
        assert!(q.is_empty());
    }

    #[test]
    fn events_without_block_are_unconsumed() {
        let mut q = InputQueue::new();
        let t = Instant::now();
        let out = q.receive(touch(TouchKind::Move, t, 10.0), None, t, &InputConfig::default());
        assert_eq!(out, InputOutcome::unconsumed());
    }

    #[test]
    fn missing_target_routes_to_content() {
        let mut q = InputQueue::new();
        let t = Instant::now();
        let out = q.receive(
            touch(TouchKind::Start, t, 10.0),
            Some(BlockTarget::confirmed(BlockKind::Touch, None, Arc::new(OverscrollHandoffChain::empty()))),
            t,
            &InputConfig::default(),
        );
        assert_eq!(out.status, EventStatus::Unconsumed);
        assert!(out.block_id.is_some());
    }

    #[test]
    fn touch_on_thumb_replays_as_mouse_drag() {
        let recorder = Arc::new(RecordingController::new());
        let guid = ScrollableLayerGuid::new(LayersId(1), 0, 1);
        let a = Arc::new(Apzc::new(guid, recorder, Arc::new(ArcSwapStore::new(ApzConfig::default()))));
        a.notify_layers_updated(
            &ScrollFrameDescriptor::new(
                guid,
                FrameMetrics::new(rect(0.0, 0.0, 1000.0, 1000.0), rect(0.0, 0.0, 500.0, 500.0)),
            ),
            LayerToScreenTransform::identity(),
            true,
        );
        let thumb = crate::scene::ThumbDescriptor {
            target: guid,
            axis: apz_core::geometry::Axis::Y,
            thumb_length: 250.0,
            track_length: 500.0,
        };
        let mut q = InputQueue::new();
        let cfg = InputConfig::default();
        let t = Instant::now();
        let target = BlockTarget {
            drag: Some(DragInfo {
                thumb,
                start: point2(100.0, 10.0),
            }),
            ..BlockTarget::confirmed(BlockKind::Drag, Some(a.clone()), chain(&a))
        };
        q.receive(touch(TouchKind::Start, t, 10.0), Some(target), t, &cfg);
        q.receive(touch(TouchKind::Move, t, 35.0), None, t, &cfg);
        assert_eq!(a.scroll_offset(), point2(0.0, 50.0));
        q.receive(touch(TouchKind::End, t, 35.0), None, t, &cfg);
        assert!(q.is_empty());
        assert_eq!(q.starts_block(&touch(TouchKind::Start, t, 10.0), t, &cfg), Some(BlockKind::Touch));
    }
}

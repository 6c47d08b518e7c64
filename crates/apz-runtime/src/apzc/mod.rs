#![forbid(unsafe_code)]

//! The per-scroll-frame pan/zoom state machine.
//!
//! An [`AsyncPanZoomController`] (APZC) owns one scroll frame's metrics and
//! moves them in response to input and animations, independently of
//! content. All of its state lives behind one [`RankedMutex`] at
//! [`LockRank::Apzc`].
//!
//! # States
//!
//! ```text
//! Nothing ─touch─▶ Touching ─move > tolerance─▶ Panning{,LockedX,LockedY}
//!                     │                               │ lift with velocity
//!                     └─second finger─▶ Pinching      ▼
//!                                                    Fling ─edge─▶ handoff
//! side branches: ScrollbarDrag, Autoscroll, SmoothScroll, WheelScroll,
//!                AnimatingZoom, OverscrollAnimation  (all return to Nothing)
//! ```
//!
//! # Invariants
//!
//! 1. The committed scroll offset is always inside the scroll range.
//!    Displacement past an edge is returned as residual, never applied.
//! 2. Overscroll is tracked apart from the offset and only ever changes the
//!    async transform.
//! 3. Every committed offset or zoom change bumps the repaint sequence.
//!    Pending repaints coalesce to the newest and are delivered under the
//!    APZC lock, so delivered sequence numbers strictly increase.
//! 4. Methods that walk the handoff chain release this APZC's lock first.
//!
//! # Failure Modes
//!
//! - Input for a destroyed APZC is ignored.
//! - A layer transform that cannot be inverted keeps the previous inverse.

mod animation;
pub mod axis;
pub mod keyboard;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use apz_core::event::{
    AllowedTouchBehavior, InputData, Modifiers, MouseInput, MouseKind, MultiTouchInput,
    PinchGestureInput, PinchKind, ScrollMode, ScrollWheelInput, TouchKind, WheelDeltaMode,
};
use apz_core::geometry::{
    Axis, CssPoint, CssRect, CssToParentLayerScale, CssVector, LayerPixel, LayerToScreenTransform,
    ParentLayerPoint, ParentLayerVector, ScreenPixel, ScreenPoint, ScreenVector, snap_to_zero,
};
use apz_core::gesture::{GestureEvent, GestureListener};
use apz_core::guid::ScrollableLayerGuid;
use apz_core::read_optimized::ArcSwapStore;
use apz_core::velocity::PointVelocityTracker;
use euclid::Transform2D;
use tracing::debug;
use web_time::Instant;

use self::animation::{ApzcAnimation, AnimationStep, FlingAnimation};
use self::axis::{PanLock, allows_pan, restrict_to_allowed};
pub use self::keyboard::{KeyboardScrollAction, ScrollUnit};
use crate::config::ApzConfig;
use crate::controller::{ApzStateChange, ContentController, RepaintRequest, TapKind};
use crate::frame_metrics::{AsyncTransform, FrameMetrics};
use crate::handoff::{self, HandoffFling, OverscrollHandoffChain, OverscrollHandoffState};
use crate::input_block::{BlockId, InputBlockContext};
use crate::lock_order::{LockRank, RankedMutex};
use crate::scene::{ScrollFrameDescriptor, ThumbDescriptor};
use crate::zoom_constraints::ZoomConstraints;

/// Residual components smaller than this are float noise.
const RESIDUAL_EPSILON: f32 = 1e-3;

/// Gesture or animation an APZC is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanZoomState {
    Nothing,
    Touching,
    Panning,
    PanningLockedX,
    PanningLockedY,
    Pinching,
    Fling,
    ScrollbarDrag,
    Autoscroll,
    SmoothScroll,
    WheelScroll,
    OverscrollAnimation,
    AnimatingZoom,
}

impl PanZoomState {
    /// Whether content is being moved in this state.
    #[must_use]
    pub fn is_transforming(self) -> bool {
        !matches!(self, Self::Nothing | Self::Touching)
    }

    #[must_use]
    pub fn is_panning(self) -> bool {
        matches!(self, Self::Panning | Self::PanningLockedX | Self::PanningLockedY)
    }

    fn is_animation(self) -> bool {
        matches!(
            self,
            Self::Fling
                | Self::Autoscroll
                | Self::SmoothScroll
                | Self::WheelScroll
                | Self::OverscrollAnimation
                | Self::AnimatingZoom
        )
    }
}

/// What the engine did with an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    /// No APZC handles it; content gets it as-is.
    Unconsumed,
    /// An APZC may handle it, but content sees it first.
    ConsumeDoDefault,
    /// An APZC handled it; content must not perform the default action.
    ConsumeNoDefault,
    /// Dropped (e.g. content prevented the gesture).
    Ignore,
}

/// Result of advancing one APZC's animation.
#[derive(Debug, Default)]
pub struct AdvanceResult {
    /// An animation is still running and needs another frame.
    pub active: bool,
    /// Fling velocity to hand off once this APZC is unlocked.
    pub handoff: Option<HandoffFling>,
}

#[derive(Debug)]
struct TouchTracking {
    start: ScreenPoint,
    last: ScreenPoint,
    velocity: PointVelocityTracker,
    lock: PanLock,
}

#[derive(Debug, Clone, Copy)]
struct DragSession {
    start_offset: CssPoint,
    start: ScreenPoint,
    thumb: ThumbDescriptor,
}

// ---------------------------------------------------------------------------
// Locked state
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct ApzcState {
    pub(crate) metrics: FrameMetrics,
    last_painted: Option<FrameMetrics>,
    constraints: ZoomConstraints,
    pub(crate) overscroll: ParentLayerVector,
    state: PanZoomState,
    animation: Option<ApzcAnimation>,
    to_screen: LayerToScreenTransform,
    from_screen: Transform2D<f32, ScreenPixel, LayerPixel>,
    gesture: GestureListener,
    touch: Option<TouchTracking>,
    pinch_focus: Option<ScreenPoint>,
    drag: Option<DragSession>,
    block: Option<BlockId>,
    allowed_touch: AllowedTouchBehavior,
    repaint_seq: u64,
    pending_repaint: bool,
}

impl ApzcState {
    fn new(cfg: &ApzConfig) -> Self {
        Self {
            metrics: FrameMetrics::default(),
            last_painted: None,
            constraints: ZoomConstraints::default()
                .with_range(cfg.zoom.default_min_zoom, cfg.zoom.default_max_zoom),
            overscroll: ParentLayerVector::zero(),
            state: PanZoomState::Nothing,
            animation: None,
            to_screen: LayerToScreenTransform::identity(),
            from_screen: Transform2D::identity(),
            gesture: GestureListener::new(cfg.to_gesture_config()),
            touch: None,
            pinch_focus: None,
            drag: None,
            block: None,
            allowed_touch: AllowedTouchBehavior::AUTO,
            repaint_seq: 0,
            pending_repaint: false,
        }
    }

    fn zoom(&self) -> f32 {
        self.metrics.zoom.get()
    }

    fn screen_to_parent(&self, v: ScreenVector) -> ParentLayerVector {
        self.from_screen.transform_vector(v).cast_unit()
    }

    fn parent_to_screen(&self, v: ParentLayerVector) -> ScreenVector {
        self.to_screen.transform_vector(v.cast_unit())
    }

    fn screen_point_to_parent(&self, p: ScreenPoint) -> ParentLayerPoint {
        self.from_screen.transform_point(p).cast_unit()
    }

    fn parent_to_css(&self, v: ParentLayerVector) -> CssVector {
        let z = self.zoom();
        CssVector::new(v.x / z, v.y / z)
    }

    fn screen_to_css(&self, v: ScreenVector) -> CssVector {
        self.parent_to_css(self.screen_to_parent(v))
    }

    fn request_repaint(&mut self) {
        self.repaint_seq += 1;
        self.pending_repaint = true;
    }

    /// Commit a clamped offset.
    pub(crate) fn set_scroll_offset(&mut self, offset: CssPoint) {
        let clamped = self.metrics.clamp_offset(offset);
        if clamped != self.metrics.scroll_offset {
            self.metrics.scroll_offset = clamped;
            self.request_repaint();
        }
    }

    /// Commit a zoom level, bounded by the constraints, and re-clamp the
    /// offset against the new viewport.
    pub(crate) fn set_zoom(&mut self, zoom: f32) {
        let zoom = self.constraints.clamp(zoom);
        if zoom != self.zoom() {
            self.metrics.zoom = CssToParentLayerScale::new(zoom);
            self.request_repaint();
        }
        let offset = self.metrics.scroll_offset;
        self.set_scroll_offset(offset);
    }

    /// Scroll by a screen displacement, returning what could not be applied.
    pub(crate) fn attempt_scroll(&mut self, displacement: ScreenVector) -> ScreenVector {
        let mut d = self.screen_to_parent(displacement);

        // Pulling back out of an overscroll comes before scrolling.
        for axis in Axis::BOTH {
            let over = axis.of_vector(self.overscroll);
            let dv = axis.of_vector(d);
            if over != 0.0 && dv != 0.0 && over.signum() != dv.signum() {
                let take = dv.abs().min(over.abs()) * dv.signum();
                self.overscroll = axis.set_vector(self.overscroll, over + take);
                d = axis.set_vector(d, dv - take);
            }
        }

        let css = self.parent_to_css(d);
        let before = self.metrics.scroll_offset;
        self.set_scroll_offset(before + css);
        let applied = self.metrics.scroll_offset - before;
        let residual_css = css - applied;
        let z = self.zoom();
        let residual = ParentLayerVector::new(residual_css.x * z, residual_css.y * z);
        snap_to_zero(self.parent_to_screen(residual), RESIDUAL_EPSILON)
    }

    /// Stretch past the edge by a damped share of `residual`.
    fn apply_overscroll(&mut self, residual: ScreenVector, cfg: &ApzConfig) {
        if !cfg.overscroll.enabled {
            return;
        }
        let d = self.screen_to_parent(residual);
        let size = self.metrics.composition_bounds.size;
        for axis in Axis::BOTH {
            let dv = axis.of_vector(d);
            if dv == 0.0 {
                continue;
            }
            let max = cfg.overscroll.max_fraction * axis.of_size(size);
            let next = (axis.of_vector(self.overscroll) + dv * cfg.overscroll.stretch_factor)
                .clamp(-max, max);
            self.overscroll = axis.set_vector(self.overscroll, next);
        }
    }

    fn can_scroll_toward(&self, delta: ScreenVector) -> bool {
        let local = self.screen_to_parent(delta);
        Axis::BOTH
            .iter()
            .any(|&axis| self.metrics.can_scroll_in_direction(axis, axis.of_vector(local)))
    }

    fn async_transform(&self) -> AsyncTransform {
        match &self.last_painted {
            Some(painted) => AsyncTransform::between(painted, &self.metrics, self.overscroll),
            None => AsyncTransform::IDENTITY,
        }
    }

    /// Zoom by `ratio` around `focus` and follow the focus's motion.
    fn pinch(&mut self, focus: ScreenPoint, ratio: f32) {
        let previous = self.pinch_focus.unwrap_or(focus);
        self.pinch_focus = Some(focus);
        let zoom_allowed = self.constraints.allow_zoom
            && self.allowed_touch.contains(AllowedTouchBehavior::PINCH_ZOOM);
        let ratio = if zoom_allowed && ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        };

        let z = self.zoom();
        let z2 = self.constraints.clamp(z * ratio);
        let f = self.screen_point_to_parent(focus) - self.metrics.composition_bounds.origin;
        let pan = self.screen_to_parent(previous - focus);
        let css_focus = self.metrics.scroll_offset + CssVector::new(f.x / z, f.y / z);
        let offset = css_focus - CssVector::new(f.x / z2, f.y / z2) + CssVector::new(pan.x / z2, pan.y / z2);

        self.set_zoom(z2);
        self.set_scroll_offset(offset);
    }
}

// ---------------------------------------------------------------------------
// AsyncPanZoomController
// ---------------------------------------------------------------------------

/// Pan/zoom controller for one scroll frame.
pub struct AsyncPanZoomController {
    guid: ScrollableLayerGuid,
    state: RankedMutex<ApzcState>,
    destroyed: AtomicBool,
    scrollgrab: AtomicBool,
    controller: Arc<dyn ContentController>,
    config: Arc<ArcSwapStore<ApzConfig>>,
}

impl fmt::Debug for AsyncPanZoomController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncPanZoomController")
            .field("guid", &self.guid)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl AsyncPanZoomController {
    #[must_use]
    pub fn new(
        guid: ScrollableLayerGuid,
        controller: Arc<dyn ContentController>,
        config: Arc<ArcSwapStore<ApzConfig>>,
    ) -> Self {
        let state = ApzcState::new(&config.snapshot());
        Self {
            guid,
            state: RankedMutex::new(LockRank::Apzc, state),
            destroyed: AtomicBool::new(false),
            scrollgrab: AtomicBool::new(false),
            controller,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn guid(&self) -> ScrollableLayerGuid {
        self.guid
    }

    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn is_scrollgrab(&self) -> bool {
        self.scrollgrab.load(Ordering::Acquire)
    }

    fn transition(&self, st: &mut ApzcState, next: PanZoomState) {
        let prev = st.state;
        if prev == next {
            return;
        }
        st.state = next;
        debug!(
            target: "apz.apzc",
            guid = %self.guid,
            from = ?prev,
            to = ?next,
            "state change"
        );
        if !prev.is_transforming() && next.is_transforming() {
            self.controller
                .notify_apzc_state_change(&self.guid, ApzStateChange::TransformBegin);
        } else if prev.is_transforming() && !next.is_transforming() {
            self.controller
                .notify_apzc_state_change(&self.guid, ApzStateChange::TransformEnd);
        }
    }

    fn start_animation(&self, st: &mut ApzcState, animation: ApzcAnimation) {
        let next = animation.state();
        st.animation = Some(animation);
        self.transition(st, next);
    }

    fn stop_animation(&self, st: &mut ApzcState, clear_overscroll: bool) {
        st.animation = None;
        if clear_overscroll {
            st.overscroll = ParentLayerVector::zero();
        }
        if st.state.is_animation() {
            self.transition(st, PanZoomState::Nothing);
        }
    }

    /// Retire the controller. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let mut st = self.state.lock();
            self.stop_animation(&mut st, true);
            st.touch = None;
            st.drag = None;
            st.gesture.reset();
            self.transition(&mut st, PanZoomState::Nothing);
        }
        self.controller.notify_apzc_destroyed(&self.guid);
    }

    // -- Layer updates ------------------------------------------------------

    /// Take new metrics from a rebuild.
    ///
    /// The APZ-side offset and zoom survive unless this is the first paint,
    /// the controller has never been painted, or content scrolled the frame
    /// (its scroll generation changed). Either way the result is clamped to
    /// the new scroll range.
    pub fn notify_layers_updated(
        &self,
        descriptor: &ScrollFrameDescriptor,
        to_screen: LayerToScreenTransform,
        first_paint: bool,
    ) {
        self.scrollgrab.store(descriptor.scrollgrab, Ordering::Release);
        let mut guard = self.state.lock();
        let st = &mut *guard;

        st.to_screen = to_screen;
        if let Some(inverse) = to_screen.inverse() {
            st.from_screen = inverse;
        }

        let content = &descriptor.metrics;
        let adopt = first_paint
            || st.last_painted.is_none()
            || content.scroll_generation != st.metrics.scroll_generation;
        let mut next = content.clone();
        let reference = if adopt {
            if st.last_painted.is_some() {
                self.stop_animation(st, true);
            }
            content.clone()
        } else {
            next.scroll_offset = st.metrics.scroll_offset;
            next.zoom = st.metrics.zoom;
            st.metrics.clone()
        };
        next.zoom = CssToParentLayerScale::new(st.constraints.clamp(next.zoom.get()));
        next.scroll_offset = next.clamp_offset(next.scroll_offset);

        let moved = next.scroll_offset != reference.scroll_offset || next.zoom != reference.zoom;
        st.metrics = next;
        st.last_painted = Some(content.clone());
        if moved {
            st.request_repaint();
        }
    }

    /// Apply new zoom limits, re-clamping the current zoom.
    pub fn set_zoom_constraints(&self, constraints: ZoomConstraints) {
        let mut st = self.state.lock();
        st.constraints = constraints;
        let zoom = st.zoom();
        st.set_zoom(zoom);
    }

    // -- Accessors ----------------------------------------------------------

    #[must_use]
    pub fn metrics(&self) -> FrameMetrics {
        self.state.lock().metrics.clone()
    }

    #[must_use]
    pub fn scroll_offset(&self) -> CssPoint {
        self.state.lock().metrics.scroll_offset
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.state.lock().zoom()
    }

    #[must_use]
    pub fn overscroll(&self) -> ParentLayerVector {
        self.state.lock().overscroll
    }

    #[must_use]
    pub fn pan_zoom_state(&self) -> PanZoomState {
        self.state.lock().state
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.state.lock().animation.is_some()
    }

    #[must_use]
    pub fn zoom_constraints(&self) -> ZoomConstraints {
        self.state.lock().constraints
    }

    /// Sequence number of the newest committed change.
    #[must_use]
    pub fn repaint_sequence(&self) -> u64 {
        self.state.lock().repaint_seq
    }

    /// Transform to apply to the painted content this frame.
    #[must_use]
    pub fn async_transform(&self) -> AsyncTransform {
        self.state.lock().async_transform()
    }

    /// Map a screen point through the inverse of this frame's async
    /// transform, giving the screen point it had when content painted.
    #[must_use]
    pub fn untransform_point(&self, p: ScreenPoint) -> Option<ScreenPoint> {
        let st = self.state.lock();
        let layer = st.from_screen.transform_point(p);
        let inverse = st.async_transform().to_layer_transform().inverse()?;
        Some(st.to_screen.transform_point(inverse.transform_point(layer)))
    }

    // -- Handoff hooks --------------------------------------------------------

    /// Scroll by `displacement`, returning the unabsorbed residual.
    pub fn attempt_scroll(&self, displacement: ScreenVector) -> ScreenVector {
        if self.is_destroyed() {
            return displacement;
        }
        self.state.lock().attempt_scroll(displacement)
    }

    pub fn apply_overscroll(&self, residual: ScreenVector) {
        let cfg = self.config.snapshot();
        self.state.lock().apply_overscroll(residual, &cfg);
    }

    #[must_use]
    pub fn can_scroll_toward(&self, delta: ScreenVector) -> bool {
        self.state.lock().can_scroll_toward(delta)
    }

    /// Take the axes of `velocity` this frame can scroll toward and start a
    /// fling with them. Returns the axes it did not take.
    pub fn accept_fling(
        &self,
        chain: Arc<OverscrollHandoffChain>,
        index: usize,
        velocity: ScreenVector,
        now: Instant,
    ) -> ScreenVector {
        let cfg = self.config.snapshot();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let local = st.screen_to_parent(velocity);
        let mut taken = ScreenVector::zero();
        let mut rest = velocity;
        for axis in Axis::BOTH {
            let v = axis.of_vector(velocity);
            if v != 0.0 && st.metrics.can_scroll_in_direction(axis, axis.of_vector(local)) {
                taken = axis.set_vector(taken, v);
                rest = axis.set_vector(rest, 0.0);
            }
        }
        if taken == ScreenVector::zero() {
            return rest;
        }
        let curve = apz_core::animation::fling::FlingCurve::new(taken)
            .with_friction(cfg.fling.friction)
            .with_stop_threshold(cfg.fling.stop_threshold);
        debug!(target: "apz.apzc", guid = %self.guid, velocity = ?taken, index, "fling start");
        self.start_animation(
            st,
            ApzcAnimation::Fling(FlingAnimation {
                curve,
                chain,
                index,
                last: now,
            }),
        );
        rest
    }

    /// Turn fling velocity no chain member could take into an overscroll
    /// bounce. Ignored while another animation or a touch is active.
    pub fn absorb_fling_overscroll(&self, velocity: ScreenVector, now: Instant) {
        let cfg = self.config.snapshot();
        if !cfg.overscroll.enabled || velocity == ScreenVector::zero() || self.is_destroyed() {
            return;
        }
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.animation.is_some() || st.touch.is_some() {
            return;
        }
        debug!(target: "apz.apzc", guid = %self.guid, velocity = ?velocity, "fling overscroll");
        let bounce = ApzcAnimation::bounce(st, velocity, &cfg, now);
        self.start_animation(st, bounce);
    }

    /// Stop the running animation but keep any overscroll.
    pub fn halt_animation(&self) {
        let mut st = self.state.lock();
        self.stop_animation(&mut st, false);
    }

    /// Stop everything, including overscroll. Idempotent.
    pub fn cancel_animation(&self) {
        let mut st = self.state.lock();
        self.stop_animation(&mut st, true);
    }

    /// Start snap-back if overscrolled and nothing else is moving.
    pub fn snap_back_if_overscrolled(&self, now: Instant) {
        let cfg = self.config.snapshot();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.overscroll == ParentLayerVector::zero()
            || st.animation.is_some()
            || st.touch.is_some()
        {
            return;
        }
        let snap = ApzcAnimation::snap_back(st, &cfg, now);
        self.start_animation(st, snap);
    }

    // -- Input ----------------------------------------------------------------

    /// Handle one event of a confirmed block.
    pub fn handle_input_event(
        &self,
        event: &InputData,
        ctx: &InputBlockContext,
        now: Instant,
    ) -> EventStatus {
        if self.is_destroyed() {
            return EventStatus::Ignore;
        }
        match event {
            InputData::Touch(t) => self.handle_touch(t, ctx, now),
            InputData::Mouse(m) => self.handle_mouse(m, ctx),
            InputData::Wheel(w) => match handoff::find_first_scrollable(&ctx.chain, w.delta) {
                Some(target) => {
                    target.apply_wheel(w, now);
                    EventStatus::ConsumeNoDefault
                }
                None => EventStatus::ConsumeNoDefault,
            },
            InputData::Pinch(p) => self.handle_pinch(p, ctx, now),
            InputData::Keyboard(k) => match KeyboardScrollAction::for_input(k) {
                Some(action) => {
                    self.handle_keyboard(action, now);
                    EventStatus::ConsumeNoDefault
                }
                None => EventStatus::Unconsumed,
            },
        }
    }

    fn tap(&self, st: &ApzcState, kind: TapKind, point: ScreenPoint, modifiers: Modifiers) {
        if let Some(block) = st.block {
            self.controller
                .handle_tap(kind, point, modifiers, &self.guid, block);
        }
    }

    fn handle_touch(&self, t: &MultiTouchInput, ctx: &InputBlockContext, now: Instant) -> EventStatus {
        let cfg = self.config.snapshot();
        let first_touch = t.kind == TouchKind::Start && self.state.lock().touch.is_none();
        if first_touch {
            handoff::cancel_animations(&ctx.chain);
        }

        let mut guard = self.state.lock();
        let st = &mut *guard;
        if first_touch {
            st.gesture.set_config(cfg.to_gesture_config());
            st.block = Some(ctx.block_id);
            st.allowed_touch = ctx.allowed_touch;
        }
        let gestures = st.gesture.process(t, now);

        let mut pan: Option<(ScreenPoint, ScreenPoint)> = None;
        let mut fling: Option<ScreenVector> = None;
        let mut ended = false;

        match t.kind {
            TouchKind::Start => {
                if first_touch && let Some(p) = t.centroid() {
                    let mut velocity = PointVelocityTracker::new(cfg.touch.velocity_window());
                    velocity.add_point(now, p);
                    st.touch = Some(TouchTracking {
                        start: p,
                        last: p,
                        velocity,
                        lock: PanLock::Free,
                    });
                    self.transition(st, PanZoomState::Touching);
                    self.controller
                        .notify_apzc_state_change(&self.guid, ApzStateChange::StartTouch);
                }
            }
            TouchKind::Move => {
                if let Some(p) = t.first_point()
                    && !st.gesture.is_pinching()
                {
                    let tracking = st.touch.get_or_insert_with(|| TouchTracking {
                        start: p,
                        last: p,
                        velocity: PointVelocityTracker::new(cfg.touch.velocity_window()),
                        lock: PanLock::Free,
                    });
                    tracking.velocity.add_point(now, p);
                    let (from, lock, start_pan) = match st.state {
                        PanZoomState::Touching => {
                            let moved = tracking.start - p;
                            if moved.length() > cfg.touch.touch_start_tolerance
                                && allows_pan(st.allowed_touch)
                            {
                                tracking.lock = PanLock::choose(
                                    moved,
                                    cfg.touch.axis_lock,
                                    cfg.touch.axis_lock_angle_degrees,
                                );
                                (Some(tracking.start), tracking.lock, true)
                            } else {
                                (None, tracking.lock, false)
                            }
                        }
                        s if s.is_panning() => (Some(tracking.last), tracking.lock, false),
                        _ => (None, tracking.lock, false),
                    };
                    if from.is_some() {
                        tracking.last = p;
                    }
                    if start_pan {
                        st.gesture.cancel_tap();
                        let next = match lock {
                            PanLock::Free => PanZoomState::Panning,
                            PanLock::Locked(Axis::X) => PanZoomState::PanningLockedX,
                            PanLock::Locked(Axis::Y) => PanZoomState::PanningLockedY,
                        };
                        self.transition(st, next);
                        self.controller
                            .notify_apzc_state_change(&self.guid, ApzStateChange::StartPanning);
                    }
                    if let Some(from) = from {
                        let d = restrict_to_allowed(lock.apply(from - p), st.allowed_touch);
                        pan = Some((from, from - d));
                    }
                }
            }
            TouchKind::End | TouchKind::Cancel => {
                if st.gesture.active_touches() == 0 {
                    ended = true;
                    let tracking = st.touch.take();
                    if t.kind == TouchKind::End
                        && st.state.is_panning()
                        && let Some(tracking) = tracking
                    {
                        let finger = tracking.velocity.velocity_at::<ScreenPixel>(now);
                        let v = restrict_to_allowed(tracking.lock.apply(-finger), st.allowed_touch);
                        let speed = v.length();
                        if speed >= cfg.fling.min_velocity && speed > 0.0 {
                            let capped = if speed > cfg.fling.max_velocity {
                                v * (cfg.fling.max_velocity / speed)
                            } else {
                                v
                            };
                            fling = Some(capped);
                        }
                    }
                }
            }
        }

        for gesture in gestures {
            match gesture {
                GestureEvent::SingleTap { point } if st.state == PanZoomState::Touching => {
                    self.tap(st, TapKind::SingleTap, point, t.modifiers);
                }
                GestureEvent::DoubleTap { point } if st.state == PanZoomState::Touching => {
                    let allowed = st.constraints.allow_double_tap_zoom
                        && st.allowed_touch.contains(AllowedTouchBehavior::DOUBLE_TAP_ZOOM);
                    let kind = if allowed {
                        TapKind::DoubleTap
                    } else {
                        TapKind::SingleTap
                    };
                    self.tap(st, kind, point, t.modifiers);
                }
                GestureEvent::PinchStart { focus, .. } => {
                    st.pinch_focus = Some(focus);
                    self.transition(st, PanZoomState::Pinching);
                }
                GestureEvent::PinchScale {
                    focus,
                    span,
                    previous_span,
                } if st.state == PanZoomState::Pinching => {
                    let ratio = if previous_span > f32::EPSILON {
                        span / previous_span
                    } else {
                        1.0
                    };
                    st.pinch(focus, ratio);
                }
                GestureEvent::PinchEnd { .. } if st.state == PanZoomState::Pinching => {
                    st.pinch_focus = None;
                    st.touch = None;
                    let next = if st.gesture.active_touches() > 0 {
                        PanZoomState::Touching
                    } else {
                        PanZoomState::Nothing
                    };
                    self.transition(st, next);
                }
                _ => {}
            }
        }

        if ended {
            if fling.is_none() {
                self.transition(st, PanZoomState::Nothing);
            }
            self.controller
                .notify_apzc_state_change(&self.guid, ApzStateChange::EndTouch);
        }
        drop(guard);

        // Pans and flings start at the chain head so a scroll-grabbing
        // ancestor goes first.
        if let Some((from, to)) = pan {
            handoff::dispatch_scroll(
                &ctx.chain,
                from,
                to,
                &OverscrollHandoffState {
                    chain_index: 0,
                    allow_overscroll: cfg.overscroll.enabled,
                },
            );
        }
        if ended {
            if let Some(velocity) = fling {
                let residual = handoff::dispatch_fling(&ctx.chain, velocity, 0, now);
                handoff::absorb_fling_residual(&ctx.chain, residual, now);
                let mut st = self.state.lock();
                if st.state.is_panning() {
                    self.transition(&mut st, PanZoomState::Nothing);
                }
            }
            handoff::snap_back(&ctx.chain, now);
        }
        EventStatus::ConsumeNoDefault
    }

    fn handle_mouse(&self, m: &MouseInput, ctx: &InputBlockContext) -> EventStatus {
        let Some(drag) = ctx.drag else {
            return EventStatus::Unconsumed;
        };
        let mut guard = self.state.lock();
        let st = &mut *guard;
        match m.kind {
            MouseKind::Down(_) => {
                self.stop_animation(st, false);
                st.drag = Some(DragSession {
                    start_offset: st.metrics.scroll_offset,
                    start: drag.start,
                    thumb: drag.thumb,
                });
                self.transition(st, PanZoomState::ScrollbarDrag);
            }
            MouseKind::Move => {
                if let Some(session) = st.drag {
                    let axis = session.thumb.axis;
                    let along = axis.of_vector(st.screen_to_parent(m.point - session.start));
                    let track = session.thumb.track_length - session.thumb.thumb_length;
                    if track > 0.0 {
                        let range = axis.of_size(st.metrics.scroll_range().size);
                        let pos = axis.of_point(session.start_offset) + along * range / track;
                        let offset = axis.set_point(st.metrics.scroll_offset, pos);
                        st.set_scroll_offset(offset);
                    }
                }
            }
            MouseKind::Up(_) => {
                st.drag = None;
                self.transition(st, PanZoomState::Nothing);
            }
        }
        EventStatus::ConsumeNoDefault
    }

    /// Scroll this frame by a wheel event.
    pub fn apply_wheel(&self, w: &ScrollWheelInput, now: Instant) {
        let cfg = self.config.snapshot();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let delta = match w.delta_mode {
            WheelDeltaMode::Line => CssVector::new(
                w.delta.x * cfg.scroll.line_height,
                w.delta.y * cfg.scroll.line_height,
            ),
            WheelDeltaMode::Page => {
                let vp = st.metrics.viewport_size();
                CssVector::new(
                    w.delta.x * vp.width * cfg.scroll.page_fraction,
                    w.delta.y * vp.height * cfg.scroll.page_fraction,
                )
            }
            WheelDeltaMode::Pixel => st.screen_to_css(w.delta),
        };
        match w.scroll_mode {
            ScrollMode::Instant => {
                self.stop_animation(st, false);
                let offset = st.metrics.scroll_offset + delta;
                st.set_scroll_offset(offset);
            }
            ScrollMode::Smooth => {
                let base = match &st.animation {
                    Some(ApzcAnimation::Wheel(t)) => t.to,
                    _ => st.metrics.scroll_offset,
                };
                let dest = st.metrics.clamp_offset(base + delta);
                let tween = ApzcAnimation::scroll_tween(
                    st.metrics.scroll_offset,
                    dest,
                    now,
                    cfg.scroll.wheel_smooth_duration_ms,
                );
                self.start_animation(st, ApzcAnimation::Wheel(tween));
            }
        }
    }

    fn handle_pinch(&self, p: &PinchGestureInput, ctx: &InputBlockContext, now: Instant) -> EventStatus {
        if p.kind == PinchKind::Start {
            handoff::cancel_animations(&ctx.chain);
        }
        {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            match p.kind {
                PinchKind::Start => {
                    st.allowed_touch = ctx.allowed_touch;
                    st.pinch_focus = Some(p.focus);
                    self.transition(st, PanZoomState::Pinching);
                }
                PinchKind::Scale if st.state == PanZoomState::Pinching => {
                    st.pinch(p.focus, p.scale_ratio());
                }
                PinchKind::End if st.state == PanZoomState::Pinching => {
                    st.pinch_focus = None;
                    self.transition(st, PanZoomState::Nothing);
                }
                _ => {}
            }
        }
        if p.kind == PinchKind::End {
            handoff::snap_back(&ctx.chain, now);
        }
        EventStatus::ConsumeNoDefault
    }

    /// Scroll for a key press.
    pub fn handle_keyboard(&self, action: KeyboardScrollAction, now: Instant) {
        let cfg = self.config.snapshot();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let axis = action.axis;
        let base = match &st.animation {
            Some(ApzcAnimation::SmoothScroll(t)) => t.to,
            _ => st.metrics.scroll_offset,
        };
        let sign = if action.forward { 1.0 } else { -1.0 };
        let range = st.metrics.scroll_range();
        let (min, max) = match axis {
            Axis::X => (range.min_x(), range.max_x()),
            Axis::Y => (range.min_y(), range.max_y()),
        };
        let pos = match action.unit {
            ScrollUnit::Line => axis.of_point(base) + sign * cfg.scroll.line_height,
            ScrollUnit::Page => {
                axis.of_point(base)
                    + sign * axis.of_size(st.metrics.viewport_size()) * cfg.scroll.page_fraction
            }
            ScrollUnit::Whole if action.forward => max,
            ScrollUnit::Whole => min,
        };
        let dest = st.metrics.clamp_offset(axis.set_point(base, pos));
        if cfg.scroll.smooth_keyboard {
            let tween = ApzcAnimation::scroll_tween(
                st.metrics.scroll_offset,
                dest,
                now,
                cfg.scroll.smooth_scroll_duration_ms,
            );
            self.start_animation(st, ApzcAnimation::SmoothScroll(tween));
        } else {
            self.stop_animation(st, false);
            st.set_scroll_offset(dest);
        }
    }

    /// Poll the long-press detector of the running touch.
    pub fn check_long_press(&self, now: Instant) -> bool {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.state != PanZoomState::Touching {
            return false;
        }
        match st.gesture.check_long_press(now) {
            Some(GestureEvent::LongPress { point, .. }) => {
                self.tap(st, TapKind::LongPress, point, Modifiers::NONE);
                true
            }
            _ => false,
        }
    }

    // -- Content-driven animations --------------------------------------------

    /// Animate the offset to `dest` (clamped).
    pub fn smooth_scroll_to(&self, dest: CssPoint, now: Instant) {
        let cfg = self.config.snapshot();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let dest = st.metrics.clamp_offset(dest);
        if dest == st.metrics.scroll_offset {
            return;
        }
        let tween = ApzcAnimation::scroll_tween(
            st.metrics.scroll_offset,
            dest,
            now,
            cfg.scroll.smooth_scroll_duration_ms,
        );
        self.start_animation(st, ApzcAnimation::SmoothScroll(tween));
    }

    /// Animate zoom and offset so `rect` fills the composition bounds.
    /// Returns `false` for an empty or invalid rect.
    pub fn zoom_to_rect(&self, rect: CssRect, now: Instant) -> bool {
        if !apz_core::geometry::rect_is_valid(&rect) || rect.is_empty() {
            return false;
        }
        let cfg = self.config.snapshot();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let comp = st.metrics.composition_bounds.size;
        let to_zoom = if st.constraints.allow_zoom {
            st.constraints
                .clamp((comp.width / rect.size.width).min(comp.height / rect.size.height))
        } else {
            st.zoom()
        };
        let mut target = st.metrics.clone();
        target.zoom = CssToParentLayerScale::new(to_zoom);
        let vp = target.viewport_size();
        let center = rect.center();
        let to_offset =
            target.clamp_offset(CssPoint::new(center.x - vp.width / 2.0, center.y - vp.height / 2.0));
        let zoom = animation::ZoomTween {
            from_offset: st.metrics.scroll_offset,
            to_offset,
            from_zoom: st.zoom(),
            to_zoom,
            tween: apz_core::animation::Tween::new(
                now,
                std::time::Duration::from_millis(cfg.zoom.animation_duration_ms),
            )
            .easing(apz_core::animation::ease_in_out_cubic),
        };
        self.start_animation(st, ApzcAnimation::Zoom(zoom));
        true
    }

    /// Scroll continuously toward the cursor's side of `anchor`.
    pub fn start_autoscroll(&self, anchor: ScreenPoint, now: Instant) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        self.stop_animation(st, false);
        self.start_animation(
            st,
            ApzcAnimation::Autoscroll(animation::AutoscrollAnimation {
                anchor,
                cursor: anchor,
                last: now,
            }),
        );
    }

    pub fn update_autoscroll_cursor(&self, cursor: ScreenPoint) {
        let mut st = self.state.lock();
        if let Some(ApzcAnimation::Autoscroll(a)) = st.animation.as_mut() {
            a.cursor = cursor;
        }
    }

    /// Stop autoscroll. Returns whether it was running.
    pub fn stop_autoscroll(&self) -> bool {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.state != PanZoomState::Autoscroll {
            return false;
        }
        self.stop_animation(st, false);
        true
    }

    // -- Sampling -------------------------------------------------------------

    /// Advance the running animation to `now`.
    pub fn advance_animations(&self, now: Instant) -> AdvanceResult {
        if self.is_destroyed() {
            return AdvanceResult::default();
        }
        let cfg = self.config.snapshot();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let Some(mut running) = st.animation.take() else {
            return AdvanceResult::default();
        };
        let outcome = running.sample(st, now, &cfg);
        if let Some(velocity) = outcome.bounce
            && cfg.overscroll.enabled
        {
            let bounce = ApzcAnimation::bounce(st, velocity, &cfg, now);
            self.start_animation(st, bounce);
            return AdvanceResult {
                active: true,
                handoff: outcome.handoff,
            };
        }
        match outcome.step {
            AnimationStep::Continue => {
                st.animation = Some(running);
                AdvanceResult {
                    active: true,
                    handoff: outcome.handoff,
                }
            }
            AnimationStep::Done => {
                let was_snap_back = matches!(running, ApzcAnimation::Overscroll(_));
                if !was_snap_back && st.overscroll != ParentLayerVector::zero() {
                    let snap = ApzcAnimation::snap_back(st, &cfg, now);
                    self.start_animation(st, snap);
                    return AdvanceResult {
                        active: true,
                        handoff: outcome.handoff,
                    };
                }
                self.transition(st, PanZoomState::Nothing);
                AdvanceResult {
                    active: false,
                    handoff: outcome.handoff,
                }
            }
        }
    }

    /// Deliver the pending repaint request, if any.
    pub fn flush_pending_repaint(&self) -> bool {
        let mut st = self.state.lock();
        if !st.pending_repaint {
            return false;
        }
        st.pending_repaint = false;
        let request = RepaintRequest {
            guid: self.guid,
            metrics: st.metrics.clone(),
            sequence: st.repaint_seq,
        };
        self.controller.request_content_repaint(&request);
        self.controller
            .notify_scroll_changed(&self.guid, request.metrics.scroll_offset, request.metrics.zoom.get());
        true
    }
}

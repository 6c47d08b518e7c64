#![forbid(unsafe_code)]

//! One logical gesture's worth of input.
//!
//! An [`InputBlock`] groups the events of a gesture (a touch sequence, a
//! wheel transaction, a scrollbar drag, a platform pinch, a key press) and
//! carries what the engine still needs to know before acting on them.
//!
//! # Invariants
//!
//! 1. Once the target is confirmed (by content or by timeout) it never
//!    changes. Later confirmations are no-ops.
//! 2. The content response is recorded once; duplicates are no-ops.
//! 3. A block is ready when its target is confirmed, content has responded
//!    (or was never asked), and, for touch blocks, the allowed touch
//!    behavior is known.

use std::fmt;
use std::sync::Arc;

use apz_core::event::AllowedTouchBehavior;
use apz_core::geometry::ScreenPoint;
use web_time::Instant;

use crate::apzc::AsyncPanZoomController;
use crate::handoff::OverscrollHandoffChain;
use crate::hit_testing_tree::HitTestFlags;
use crate::scene::ThumbDescriptor;

/// Identifier of an input block, unique within one tree manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Gesture family of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Touch,
    Wheel,
    Drag,
    Pinch,
    Keyboard,
}

/// Whether the block's target is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetConfirmation {
    Unconfirmed,
    Confirmed,
    /// Content never answered; the tentative target was kept.
    TimedOut,
}

/// Content's answer about `preventDefault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentResponse {
    Pending,
    Allowed,
    Prevented,
    /// The block never needed an answer.
    NotRequired,
}

/// Scrollbar drag bound to a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragInfo {
    pub thumb: ThumbDescriptor,
    /// Where the mouse went down.
    pub start: ScreenPoint,
}

/// What an APZC needs to know about the block an event belongs to.
#[derive(Debug, Clone)]
pub struct InputBlockContext {
    pub block_id: BlockId,
    pub chain: Arc<OverscrollHandoffChain>,
    pub allowed_touch: AllowedTouchBehavior,
    pub drag: Option<DragInfo>,
}

/// A gesture's routing state.
#[derive(Debug)]
pub struct InputBlock {
    id: BlockId,
    kind: BlockKind,
    target: Option<Arc<AsyncPanZoomController>>,
    chain: Arc<OverscrollHandoffChain>,
    confirmation: TargetConfirmation,
    response: ContentResponse,
    allowed_touch: Option<AllowedTouchBehavior>,
    deadline: Instant,
    ended: bool,
    hit_flags: HitTestFlags,
    drag: Option<DragInfo>,
}

impl InputBlock {
    /// A block whose target came from a hit test.
    ///
    /// With `needs_confirmation` the block waits for content (or the
    /// deadline); otherwise it is ready at once.
    #[must_use]
    pub fn new(
        id: BlockId,
        kind: BlockKind,
        target: Option<Arc<AsyncPanZoomController>>,
        chain: Arc<OverscrollHandoffChain>,
        hit_flags: HitTestFlags,
        needs_confirmation: bool,
        deadline: Instant,
    ) -> Self {
        let (confirmation, response) = if needs_confirmation {
            (TargetConfirmation::Unconfirmed, ContentResponse::Pending)
        } else {
            (TargetConfirmation::Confirmed, ContentResponse::NotRequired)
        };
        Self {
            id,
            kind,
            target,
            chain,
            confirmation,
            response,
            allowed_touch: Some(AllowedTouchBehavior::AUTO),
            deadline,
            ended: false,
            hit_flags,
            drag: None,
        }
    }

    /// Builder: touch behavior known at hit time (`None` waits for content).
    #[must_use]
    pub fn with_allowed_touch(mut self, allowed: Option<AllowedTouchBehavior>) -> Self {
        self.allowed_touch = allowed;
        self
    }

    /// Builder: attach a scrollbar drag.
    #[must_use]
    pub fn with_drag(mut self, drag: DragInfo) -> Self {
        self.drag = Some(drag);
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    #[must_use]
    pub fn target(&self) -> Option<&Arc<AsyncPanZoomController>> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn chain(&self) -> &Arc<OverscrollHandoffChain> {
        &self.chain
    }

    #[inline]
    #[must_use]
    pub fn confirmation(&self) -> TargetConfirmation {
        self.confirmation
    }

    #[inline]
    #[must_use]
    pub fn response(&self) -> ContentResponse {
        self.response
    }

    #[inline]
    #[must_use]
    pub fn hit_flags(&self) -> HitTestFlags {
        self.hit_flags
    }

    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[inline]
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// No more events will join this block.
    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    #[must_use]
    pub fn is_target_confirmed(&self) -> bool {
        self.confirmation != TargetConfirmation::Unconfirmed
    }

    #[must_use]
    pub fn is_prevented(&self) -> bool {
        self.response == ContentResponse::Prevented
    }

    /// Whether its events can be handed to the target.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.is_target_confirmed()
            && self.response != ContentResponse::Pending
            && self.allowed_touch.is_some()
    }

    /// Settle the target. Returns `false` if it was already settled.
    pub fn confirm_target(
        &mut self,
        target: Option<Arc<AsyncPanZoomController>>,
        chain: Arc<OverscrollHandoffChain>,
    ) -> bool {
        if self.is_target_confirmed() {
            return false;
        }
        self.target = target;
        self.chain = chain;
        self.confirmation = TargetConfirmation::Confirmed;
        true
    }

    /// Record content's answer. Returns `false` for a duplicate.
    pub fn set_content_response(&mut self, prevent_default: bool) -> bool {
        if self.response != ContentResponse::Pending {
            return false;
        }
        self.response = if prevent_default {
            ContentResponse::Prevented
        } else {
            ContentResponse::Allowed
        };
        true
    }

    /// Record the touch behaviors content allows. Returns `false` if they
    /// were already known.
    pub fn set_allowed_touch(&mut self, allowed: AllowedTouchBehavior) -> bool {
        if self.allowed_touch.is_some() {
            return false;
        }
        self.allowed_touch = Some(allowed);
        true
    }

    /// Force the block ready with "allow" once `now` reaches the deadline.
    /// Returns whether anything was forced.
    pub fn time_out(&mut self, now: Instant) -> bool {
        if self.is_ready() || now < self.deadline {
            return false;
        }
        if !self.is_target_confirmed() {
            self.confirmation = TargetConfirmation::TimedOut;
        }
        if self.response == ContentResponse::Pending {
            self.response = ContentResponse::Allowed;
        }
        if self.allowed_touch.is_none() {
            self.allowed_touch = Some(AllowedTouchBehavior::AUTO);
        }
        true
    }

    #[must_use]
    pub fn context(&self) -> InputBlockContext {
        InputBlockContext {
            block_id: self.id,
            chain: Arc::clone(&self.chain),
            allowed_touch: self.allowed_touch.unwrap_or(AllowedTouchBehavior::AUTO),
            drag: self.drag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MS_400: Duration = Duration::from_millis(400);

    fn block(needs_confirmation: bool, now: Instant) -> InputBlock {
        InputBlock::new(
            BlockId(1),
            BlockKind::Touch,
            None,
            Arc::new(OverscrollHandoffChain::empty()),
            HitTestFlags::VISIBLE,
            needs_confirmation,
            now + MS_400,
        )
    }

    #[test]
    fn fast_path_block_is_ready() {
        let b = block(false, Instant::now());
        assert!(b.is_ready());
        assert_eq!(b.response(), ContentResponse::NotRequired);
    }

    #[test]
    fn confirmation_and_response_are_idempotent() {
        let mut b = block(true, Instant::now());
        assert!(!b.is_ready());
        let chain = Arc::new(OverscrollHandoffChain::empty());
        assert!(b.confirm_target(None, Arc::clone(&chain)));
        assert!(!b.confirm_target(None, chain));
        assert!(!b.is_ready());
        assert!(b.set_content_response(true));
        assert!(!b.set_content_response(false));
        assert!(b.is_prevented());
        assert!(b.is_ready());
    }

    #[test]
    fn timeout_forces_allow() {
        let now = Instant::now();
        let mut b = block(true, now).with_allowed_touch(None);
        assert!(!b.time_out(now + Duration::from_millis(399)));
        assert!(b.time_out(now + MS_400));
        assert!(b.is_ready());
        assert_eq!(b.confirmation(), TargetConfirmation::TimedOut);
        assert_eq!(b.response(), ContentResponse::Allowed);
        assert_eq!(b.context().allowed_touch, AllowedTouchBehavior::AUTO);
        assert!(!b.time_out(now + MS_400 * 2));
    }

    #[test]
    fn touch_behavior_gates_readiness() {
        let mut b = block(false, Instant::now()).with_allowed_touch(None);
        assert!(!b.is_ready());
        assert!(b.set_allowed_touch(AllowedTouchBehavior::VERTICAL_PAN));
        assert!(!b.set_allowed_touch(AllowedTouchBehavior::AUTO));
        assert!(b.is_ready());
        assert_eq!(b.context().allowed_touch, AllowedTouchBehavior::VERTICAL_PAN);
    }
}

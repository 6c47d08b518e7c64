#![forbid(unsafe_code)]

//! Overscroll handoff chains and scroll/fling dispatch along them.
//!
//! When a gesture starts, the engine computes which APZCs share its scroll
//! momentum: the hit APZC, then each enclosing one (or an explicit
//! handoff parent), with scroll-grabbing APZCs moved to the front. The chain
//! is reused unchanged for the rest of the gesture, including any fling
//! that follows it.
//!
//! # Invariants
//!
//! 1. A chain is immutable once built.
//! 2. Dispatch never holds two APZC locks: each member is locked, asked to
//!    absorb what it can, and released before the next is locked.
//! 3. For every [`dispatch_scroll`], `Σ applied + residual == requested`.
//! 4. Destroyed members are skipped; they absorb nothing.

use std::sync::Arc;

use ahash::AHashSet;
use apz_core::geometry::{ScreenPoint, ScreenVector};
use apz_core::guid::ScrollableLayerGuid;
use smallvec::SmallVec;
use tracing::trace;
use web_time::Instant;

use crate::apzc::AsyncPanZoomController;

type Apzc = AsyncPanZoomController;

/// Ordered APZCs that absorb one gesture's scroll, first to last.
#[derive(Debug, Default)]
pub struct OverscrollHandoffChain {
    members: Vec<Arc<Apzc>>,
}

impl OverscrollHandoffChain {
    /// A chain with no members.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Chain with exactly these members, in this order.
    #[must_use]
    pub fn from_members(members: Vec<Arc<Apzc>>) -> Self {
        Self { members }
    }

    /// Build a chain starting at `start`, following `parent_of` until it
    /// returns `None` or revisits an APZC, then move scroll-grabbing members
    /// to the front, keeping relative order otherwise.
    pub fn build(start: Arc<Apzc>, mut parent_of: impl FnMut(&Apzc) -> Option<Arc<Apzc>>) -> Self {
        let mut seen: AHashSet<ScrollableLayerGuid> = AHashSet::new();
        let mut walk = Vec::new();
        let mut current = Some(start);
        while let Some(apzc) = current {
            if !seen.insert(apzc.guid()) {
                break;
            }
            current = parent_of(&apzc);
            walk.push(apzc);
        }
        let (mut members, rest): (Vec<_>, Vec<_>) =
            walk.into_iter().partition(|apzc| apzc.is_scrollgrab());
        members.extend(rest);
        Self { members }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<Apzc>> {
        self.members.get(index)
    }

    /// The member gestures on this chain are delivered to.
    #[must_use]
    pub fn first(&self) -> Option<&Arc<Apzc>> {
        self.members.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Apzc>> {
        self.members.iter()
    }

    #[must_use]
    pub fn guids(&self) -> Vec<ScrollableLayerGuid> {
        self.members.iter().map(|m| m.guid()).collect()
    }

    /// Position of `apzc` in the chain.
    #[must_use]
    pub fn index_of(&self, apzc: &Apzc) -> Option<usize> {
        self.members.iter().position(|m| std::ptr::eq(m.as_ref(), apzc))
    }

    fn last_live(&self) -> Option<&Arc<Apzc>> {
        self.members.iter().rev().find(|m| !m.is_destroyed())
    }
}

// ---------------------------------------------------------------------------
// Scroll dispatch
// ---------------------------------------------------------------------------

/// Where a dispatch starts and what happens to leftover displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverscrollHandoffState {
    /// Chain member that gets the displacement first.
    pub chain_index: usize,
    /// Turn leftover displacement into overscroll on the last member.
    pub allow_overscroll: bool,
}

impl Default for OverscrollHandoffState {
    fn default() -> Self {
        Self {
            chain_index: 0,
            allow_overscroll: true,
        }
    }
}

/// How one displacement was shared out.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollDispatchResult {
    pub requested: ScreenVector,
    /// Displacement absorbed by each chain member, by chain index.
    pub applied: SmallVec<[ScreenVector; 4]>,
    /// Displacement no member absorbed.
    pub residual: ScreenVector,
}

impl ScrollDispatchResult {
    #[must_use]
    pub fn total_applied(&self) -> ScreenVector {
        self.applied
            .iter()
            .fold(ScreenVector::zero(), |acc, v| acc + *v)
    }
}

/// Scroll the chain by the motion of a pointer from `start` to `end`.
///
/// Content moves with the pointer, so the scroll displacement is
/// `start − end`. Members from `state.chain_index` on absorb it in order.
pub fn dispatch_scroll(
    chain: &OverscrollHandoffChain,
    start: ScreenPoint,
    end: ScreenPoint,
    state: &OverscrollHandoffState,
) -> ScrollDispatchResult {
    let requested = start - end;
    let mut applied: SmallVec<[ScreenVector; 4]> =
        SmallVec::from_elem(ScreenVector::zero(), chain.len());
    let mut remaining = requested;

    for (index, member) in chain.members.iter().enumerate().skip(state.chain_index) {
        if remaining == ScreenVector::zero() {
            break;
        }
        if member.is_destroyed() {
            continue;
        }
        let residual = member.attempt_scroll(remaining);
        applied[index] = remaining - residual;
        remaining = residual;
    }

    if remaining != ScreenVector::zero()
        && state.allow_overscroll
        && let Some(last) = chain.last_live()
    {
        last.apply_overscroll(remaining);
    }

    trace!(
        target: "apz.handoff",
        requested = ?requested,
        residual = ?remaining,
        members = chain.len(),
        "scroll dispatched"
    );

    ScrollDispatchResult {
        requested,
        applied,
        residual: remaining,
    }
}

/// Offer a fling to members from `from_index` on. Each member takes the axes
/// it can scroll toward; whatever no member takes is returned.
pub fn dispatch_fling(
    chain: &Arc<OverscrollHandoffChain>,
    velocity: ScreenVector,
    from_index: usize,
    now: Instant,
) -> ScreenVector {
    let mut remaining = velocity;
    for (index, member) in chain.members.iter().enumerate().skip(from_index) {
        if remaining == ScreenVector::zero() {
            break;
        }
        if member.is_destroyed() {
            continue;
        }
        remaining = member.accept_fling(Arc::clone(chain), index, remaining, now);
    }
    trace!(
        target: "apz.handoff",
        velocity = ?velocity,
        residual = ?remaining,
        from_index,
        "fling dispatched"
    );
    remaining
}

/// Give fling velocity nobody took to the last live member as an overscroll
/// bounce.
pub fn absorb_fling_residual(chain: &OverscrollHandoffChain, residual: ScreenVector, now: Instant) {
    if residual == ScreenVector::zero() {
        return;
    }
    if let Some(last) = chain.last_live() {
        last.absorb_fling_overscroll(residual, now);
    }
}

/// A fling that reached an edge and must continue further down the chain.
///
/// Produced while the flinging APZC is locked and run after it is released.
#[derive(Debug, Clone)]
pub struct HandoffFling {
    pub chain: Arc<OverscrollHandoffChain>,
    pub from_index: usize,
    pub velocity: ScreenVector,
}

impl HandoffFling {
    /// Dispatch the remaining velocity. What nobody takes becomes a bounce
    /// on the last live member; it is also returned.
    pub fn run(self, now: Instant) -> ScreenVector {
        let residual = dispatch_fling(&self.chain, self.velocity, self.from_index, now);
        absorb_fling_residual(&self.chain, residual, now);
        residual
    }
}

// ---------------------------------------------------------------------------
// Chain-wide helpers
// ---------------------------------------------------------------------------

/// Whether any live member can scroll toward `delta`.
#[must_use]
pub fn can_be_panned(chain: &OverscrollHandoffChain, delta: ScreenVector) -> bool {
    find_first_scrollable(chain, delta).is_some()
}

/// First live member that can scroll toward `delta` on some axis.
#[must_use]
pub fn find_first_scrollable(
    chain: &OverscrollHandoffChain,
    delta: ScreenVector,
) -> Option<Arc<Apzc>> {
    chain
        .members
        .iter()
        .find(|m| !m.is_destroyed() && m.can_scroll_toward(delta))
        .cloned()
}

/// Stop every member's animation. Overscroll stays where it is so the new
/// gesture can grab it.
pub fn cancel_animations(chain: &OverscrollHandoffChain) {
    for member in &chain.members {
        member.halt_animation();
    }
}

/// Start snap-back on every overscrolled member.
pub fn snap_back(chain: &OverscrollHandoffChain, now: Instant) {
    for member in &chain.members {
        if !member.is_destroyed() {
            member.snap_back_if_overscrolled(now);
        }
    }
}

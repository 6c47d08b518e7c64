#![forbid(unsafe_code)]

//! The engine's outbound interface toward content.
//!
//! [`ContentController`] is implemented by the embedder. The engine calls it
//! from whichever role produced the notification (controller or sampler
//! thread), sometimes while holding an APZC lock, so implementations must be
//! non-blocking and must not call back into the engine synchronously. Queue
//! the work and return.

use std::sync::Mutex;
use std::sync::PoisonError;

use apz_core::event::{InputData, Modifiers};
use apz_core::geometry::{CssPoint, ScreenPoint};
use apz_core::guid::ScrollableLayerGuid;

use crate::frame_metrics::FrameMetrics;
use crate::input_block::BlockId;

/// Request for content to repaint a scroll frame at APZ's current metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct RepaintRequest {
    pub guid: ScrollableLayerGuid,
    pub metrics: FrameMetrics,
    /// Per-APZC, strictly increasing across delivered requests.
    pub sequence: u64,
}

/// Lifecycle notifications for one APZC's gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApzStateChange {
    /// The APZC started moving content (pan, fling, animation).
    TransformBegin,
    /// All movement stopped.
    TransformEnd,
    StartTouch,
    EndTouch,
    StartPanning,
}

/// Kinds of tap reported to content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapKind {
    SingleTap,
    DoubleTap,
    LongPress,
}

/// Sink for notifications produced by the engine.
pub trait ContentController: Send + Sync {
    /// Content should repaint `request.guid` at `request.metrics`.
    fn request_content_repaint(&self, request: &RepaintRequest);

    /// APZ-side scroll offset or zoom changed.
    fn notify_scroll_changed(&self, _guid: &ScrollableLayerGuid, _offset: CssPoint, _zoom: f32) {}

    fn notify_apzc_state_change(&self, _guid: &ScrollableLayerGuid, _change: ApzStateChange) {}

    fn handle_tap(
        &self,
        _kind: TapKind,
        _point: ScreenPoint,
        _modifiers: Modifiers,
        _guid: &ScrollableLayerGuid,
        _block: BlockId,
    ) {
    }

    /// An event that content must see, e.g. because its block awaits a
    /// content response or APZ had no target for it.
    fn dispatch_to_content(
        &self,
        _event: &InputData,
        _target: Option<ScrollableLayerGuid>,
        _block: Option<BlockId>,
    ) {
    }

    /// The APZC for `guid` was removed from the engine.
    fn notify_apzc_destroyed(&self, _guid: &ScrollableLayerGuid) {}
}

/// Controller that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopController;

impl ContentController for NoopController {
    fn request_content_repaint(&self, _request: &RepaintRequest) {}
}

// ---------------------------------------------------------------------------
// RecordingController
// ---------------------------------------------------------------------------

/// One notification captured by [`RecordingController`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Repaint(RepaintRequest),
    ScrollChanged {
        guid: ScrollableLayerGuid,
        offset: CssPoint,
        zoom: f32,
    },
    StateChange {
        guid: ScrollableLayerGuid,
        change: ApzStateChange,
    },
    Tap {
        kind: TapKind,
        point: ScreenPoint,
        guid: ScrollableLayerGuid,
        block: BlockId,
    },
    DispatchToContent {
        kind: &'static str,
        target: Option<ScrollableLayerGuid>,
        block: Option<BlockId>,
    },
    Destroyed(ScrollableLayerGuid),
}

/// Controller that records every notification, for tests and tooling.
#[derive(Debug, Default)]
pub struct RecordingController {
    events: Mutex<Vec<ControllerEvent>>,
}

impl RecordingController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ControllerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<ControllerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Repaint requests for one guid, in delivery order.
    #[must_use]
    pub fn repaints_for(&self, guid: &ScrollableLayerGuid) -> Vec<RepaintRequest> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Repaint(r) if r.guid == *guid => Some(r),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn state_changes_for(&self, guid: &ScrollableLayerGuid) -> Vec<ApzStateChange> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::StateChange { guid: g, change } if g == *guid => Some(change),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn taps(&self) -> Vec<(TapKind, ScreenPoint)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Tap { kind, point, .. } => Some((kind, point)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn destroyed(&self) -> Vec<ScrollableLayerGuid> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Destroyed(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    /// Number of events forwarded to content.
    #[must_use]
    pub fn dispatched_to_content(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ControllerEvent::DispatchToContent { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ContentController for RecordingController {
    fn request_content_repaint(&self, request: &RepaintRequest) {
        self.push(ControllerEvent::Repaint(request.clone()));
    }

    fn notify_scroll_changed(&self, guid: &ScrollableLayerGuid, offset: CssPoint, zoom: f32) {
        self.push(ControllerEvent::ScrollChanged {
            guid: *guid,
            offset,
            zoom,
        });
    }

    fn notify_apzc_state_change(&self, guid: &ScrollableLayerGuid, change: ApzStateChange) {
        self.push(ControllerEvent::StateChange {
            guid: *guid,
            change,
        });
    }

    fn handle_tap(
        &self,
        kind: TapKind,
        point: ScreenPoint,
        _modifiers: Modifiers,
        guid: &ScrollableLayerGuid,
        block: BlockId,
    ) {
        self.push(ControllerEvent::Tap {
            kind,
            point,
            guid: *guid,
            block,
        });
    }

    fn dispatch_to_content(
        &self,
        event: &InputData,
        target: Option<ScrollableLayerGuid>,
        block: Option<BlockId>,
    ) {
        self.push(ControllerEvent::DispatchToContent {
            kind: event.kind_name(),
            target,
            block,
        });
    }

    fn notify_apzc_destroyed(&self, guid: &ScrollableLayerGuid) {
        self.push(ControllerEvent::Destroyed(*guid));
    }
}

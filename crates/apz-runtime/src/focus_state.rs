#![forbid(unsafe_code)]

//! Keyboard focus tracking for asynchronous keyboard scrolling.
//!
//! Content tells the engine which scroll frames a key press should scroll by
//! sending a [`FocusTarget`] per layers subtree. A target may delegate to a
//! nested subtree (an iframe) with [`FocusTargetKind::RefLayer`]; the
//! effective target is found by following these links from the root.
//!
//! Every event that can move focus (key press, mouse down, touch start)
//! bumps the engine-side sequence number. Content echoes the sequence it had
//! seen when it computed a target. The confirmed target is trusted only while
//! the two agree; otherwise the engine falls back to its optimistic guess (the
//! last touched scroll frame) or sends the key to content.
//!
//! # Invariants
//!
//! 1. A target whose sequence is older than the newest one accepted from any
//!    layers subtree is discarded. The sequence is engine-wide, so an older
//!    message for one subtree was computed before focus last moved.
//! 2. Resolution terminates: a `RefLayer` cycle ends in "no target".

use ahash::AHashMap;
use apz_core::guid::{LayersId, ScrollableLayerGuid};
use tracing::debug;

/// What a focus target sends key presses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTargetKind {
    /// Nothing scrollable has focus.
    None,
    /// Focus is inside another layers subtree.
    RefLayer(LayersId),
    /// Keys scroll these frames.
    ScrollTargets {
        horizontal: Option<ScrollableLayerGuid>,
        vertical: Option<ScrollableLayerGuid>,
    },
}

/// Focus information for one layers subtree, computed by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTarget {
    /// Focus sequence number content had seen.
    pub sequence: u64,
    pub layers_id: LayersId,
    /// Script listens for key events on the focused element.
    pub has_key_listeners: bool,
    pub kind: FocusTargetKind,
}

impl FocusTarget {
    #[must_use]
    pub fn scroll_targets(
        layers_id: LayersId,
        sequence: u64,
        horizontal: Option<ScrollableLayerGuid>,
        vertical: Option<ScrollableLayerGuid>,
    ) -> Self {
        Self {
            sequence,
            layers_id,
            has_key_listeners: false,
            kind: FocusTargetKind::ScrollTargets {
                horizontal,
                vertical,
            },
        }
    }

    #[must_use]
    pub fn with_key_listeners(mut self, listeners: bool) -> Self {
        self.has_key_listeners = listeners;
        self
    }
}

/// Where a key press should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardRouting {
    /// Scroll asynchronously. Either axis may have no frame.
    Apz {
        horizontal: Option<ScrollableLayerGuid>,
        vertical: Option<ScrollableLayerGuid>,
    },
    /// Content must handle the key.
    Content,
}

/// Engine-side focus bookkeeping.
#[derive(Debug, Default)]
pub struct FocusState {
    targets: AHashMap<LayersId, FocusTarget>,
    apz_sequence: u64,
    content_sequence: u64,
    guess: Option<ScrollableLayerGuid>,
}

impl FocusState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Note an event that may move focus. Returns the new sequence number.
    pub fn receive_focus_changing_event(&mut self) -> u64 {
        self.apz_sequence += 1;
        self.apz_sequence
    }

    /// Record the scroll frame most recently touched or clicked.
    pub fn set_guess(&mut self, guid: Option<ScrollableLayerGuid>) {
        self.guess = guid;
    }

    #[must_use]
    pub fn guess(&self) -> Option<ScrollableLayerGuid> {
        self.guess
    }

    /// Accept a target from content. Returns `false` if it was stale.
    pub fn update(&mut self, target: FocusTarget) -> bool {
        if target.sequence < self.content_sequence {
            debug!(
                target: "apz.focus",
                layers_id = %target.layers_id,
                sequence = target.sequence,
                last = self.content_sequence,
                "stale focus target discarded"
            );
            return false;
        }
        self.content_sequence = target.sequence;
        self.targets.insert(target.layers_id, target);
        true
    }

    /// Drop targets of subtrees that left the scene.
    pub fn retain_layers(&mut self, mut keep: impl FnMut(LayersId) -> bool) {
        self.targets.retain(|id, _| keep(*id));
    }

    /// Content has seen every focus-changing event the engine has.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.content_sequence >= self.apz_sequence
    }

    #[must_use]
    pub fn apz_sequence(&self) -> u64 {
        self.apz_sequence
    }

    /// Resolve where a key press starting at `root` goes.
    #[must_use]
    pub fn keyboard_routing(&self, root: LayersId, optimistic: bool) -> KeyboardRouting {
        if !self.is_current() {
            return match (optimistic, self.guess) {
                (true, Some(guess)) => KeyboardRouting::Apz {
                    horizontal: Some(guess),
                    vertical: Some(guess),
                },
                _ => KeyboardRouting::Content,
            };
        }

        let mut layers = root;
        for _ in 0..=self.targets.len() {
            let Some(target) = self.targets.get(&layers) else {
                return KeyboardRouting::Content;
            };
            if target.has_key_listeners {
                return KeyboardRouting::Content;
            }
            match target.kind {
                FocusTargetKind::None => return KeyboardRouting::Content,
                FocusTargetKind::RefLayer(next) => layers = next,
                FocusTargetKind::ScrollTargets {
                    horizontal,
                    vertical,
                } => {
                    if horizontal.is_none() && vertical.is_none() {
                        return KeyboardRouting::Content;
                    }
                    return KeyboardRouting::Apz {
                        horizontal,
                        vertical,
                    };
                }
            }
        }
        KeyboardRouting::Content
    }
}

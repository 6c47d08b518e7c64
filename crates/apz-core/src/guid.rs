#![forbid(unsafe_code)]

//! Identifiers for scrollable layers.
//!
//! A [`ScrollableLayerGuid`] names one scroll frame of one document. It is
//! the key of the engine's APZC map and the only way external code refers to
//! a controller.
//!
//! # Invariants
//!
//! 1. Two guids are equal iff all three components are equal.
//! 2. The total order is lexicographic over `(layers_id, pres_shell_id,
//!    scroll_id)`, so guids of one layers subtree sort together.
//! 3. [`NULL_SCROLL_ID`] never names a real scroll frame.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scroll-frame identifier inside one presentation shell.
pub type ViewId = u64;

/// Reserved id meaning "no scroll frame".
pub const NULL_SCROLL_ID: ViewId = 0;

/// Identifier of a layers subtree (one document or one out-of-process frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LayersId(pub u64);

impl LayersId {
    /// Wrap a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayersId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Globally unique identifier of a scrollable layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScrollableLayerGuid {
    /// Layers subtree the scroll frame lives in.
    pub layers_id: LayersId,
    /// Presentation shell inside the layers subtree.
    pub pres_shell_id: u32,
    /// Scroll frame inside the presentation shell.
    pub scroll_id: ViewId,
}

impl ScrollableLayerGuid {
    /// Build a guid from its parts.
    #[must_use]
    pub const fn new(layers_id: LayersId, pres_shell_id: u32, scroll_id: ViewId) -> Self {
        Self {
            layers_id,
            pres_shell_id,
            scroll_id,
        }
    }

    /// Whether this guid names a real scroll frame.
    #[inline]
    #[must_use]
    pub const fn is_scrollable(&self) -> bool {
        self.scroll_id != NULL_SCROLL_ID
    }

    /// Whether `other` lives in the same layers subtree and shell.
    #[inline]
    #[must_use]
    pub fn same_document(&self, other: &Self) -> bool {
        self.layers_id == other.layers_id && self.pres_shell_id == other.pres_shell_id
    }
}

impl fmt::Display for ScrollableLayerGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.layers_id, self.pres_shell_id, self.scroll_id
        )
    }
}

#![forbid(unsafe_code)]

//! Error types surfaced by the engine.
//!
//! Nothing on the input or sampling paths fails: a lookup miss routes the
//! event to content. Errors exist only for calls from content that name
//! something the engine does not know, and for rebuild input it had to drop.

use apz_core::guid::{LayersId, ScrollableLayerGuid};
use thiserror::Error;

use crate::input_block::BlockId;

/// Error returned by content-facing calls on the tree manager.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApzError {
    /// The block id was never issued by this tree manager.
    #[error("unknown input block {0}")]
    UnknownBlock(BlockId),
    /// No live APZC has this guid.
    #[error("no APZC for {0}")]
    UnknownGuid(ScrollableLayerGuid),
    /// Zoom constraints with a non-positive, non-finite or inverted range.
    #[error("invalid zoom constraints for {guid}: min {min}, max {max}")]
    InvalidZoomConstraints {
        guid: ScrollableLayerGuid,
        min: f32,
        max: f32,
    },
    /// The registry no longer accepts tree managers.
    #[error("tree manager registry is shut down")]
    RegistryShutDown,
}

/// A malformed part of a scene snapshot. The node at `index` (and its
/// subtree) was left out of the rebuilt tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("node {index}: first node must have depth 0, got {depth}")]
    MissingRoot { index: usize, depth: u32 },
    #[error("node {index}: depth {depth} has no parent")]
    OrphanNode { index: usize, depth: u32 },
    #[error("node {index}: second root at depth 0")]
    ExtraRoot { index: usize },
    #[error("node {index}: non-finite or negative geometry")]
    InvalidGeometry { index: usize },
    #[error("node {index}: guid {guid} does not belong to layers {layers_id}")]
    LayersMismatch {
        index: usize,
        guid: ScrollableLayerGuid,
        layers_id: LayersId,
    },
    #[error("node {index}: invalid frame metrics for {guid}")]
    InvalidMetrics {
        index: usize,
        guid: ScrollableLayerGuid,
    },
    #[error("node {index}: scrollbar thumb targets unknown scroll frame {target}")]
    DanglingThumb {
        index: usize,
        target: ScrollableLayerGuid,
    },
}

impl SceneError {
    /// Snapshot index of the dropped node.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::MissingRoot { index, .. }
            | Self::OrphanNode { index, .. }
            | Self::ExtraRoot { index }
            | Self::InvalidGeometry { index }
            | Self::LayersMismatch { index, .. }
            | Self::InvalidMetrics { index, .. }
            | Self::DanglingThumb { index, .. } => *index,
        }
    }
}

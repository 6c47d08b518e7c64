#![forbid(unsafe_code)]

//! Scene snapshots consumed by the hit-testing tree rebuild.
//!
//! The scene builder describes the page as a pre-order list of
//! [`SceneNode`]s: every node carries its depth, and a node's parent is the
//! closest earlier node one level shallower. Nodes come in three kinds (a
//! scroll frame, a plain clip/transform container, and a scrollbar thumb),
//! so the rebuild consumes one tagged type whatever produced the scene.
//!
//! # Failure Modes
//!
//! [`SceneSnapshot::sanitize`] never rejects a whole snapshot. A node that is
//! malformed is dropped together with its subtree and reported as a
//! [`SceneError`]:
//!
//! - the first node is not at depth 0, or a later node is
//! - a depth skips a level
//! - a transform, clip or region is non-finite, or a size is negative
//! - a scroll frame's guid names another layers subtree, or its metrics are
//!   invalid
//! - a thumb targets a scroll frame that is not in the snapshot

use ahash::AHashSet;
use apz_core::event::AllowedTouchBehavior;
use apz_core::geometry::{
    Axis, LayerRect, LayerToScreenTransform, rect_is_valid, transform_is_finite,
};
use apz_core::guid::{LayersId, ScrollableLayerGuid, ViewId};

use crate::error::SceneError;
use crate::frame_metrics::FrameMetrics;

/// Touch behaviors a region has declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchAction {
    /// Everything allowed.
    #[default]
    Auto,
    /// Only these behaviors.
    Restricted(AllowedTouchBehavior),
    /// Content has to tell us; touches here wait for it.
    Unknown,
}

impl TouchAction {
    /// Behaviors known at hit-test time, if any.
    #[must_use]
    pub fn known_behavior(self) -> Option<AllowedTouchBehavior> {
        match self {
            Self::Auto => Some(AllowedTouchBehavior::AUTO),
            Self::Restricted(b) => Some(b),
            Self::Unknown => None,
        }
    }
}

/// Input-relevant areas of a node, in its layer space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventRegions {
    /// Where the node receives input at all.
    pub hit_region: Vec<LayerRect>,
    /// Subset where script must see the event before APZ acts on it.
    pub dispatch_to_content: Vec<LayerRect>,
    pub touch_action: TouchAction,
}

impl EventRegions {
    /// Regions covering `rect` with no special handling.
    #[must_use]
    pub fn covering(rect: LayerRect) -> Self {
        Self {
            hit_region: vec![rect],
            ..Self::default()
        }
    }

    fn is_valid(&self) -> bool {
        self.hit_region.iter().all(rect_is_valid)
            && self.dispatch_to_content.iter().all(rect_is_valid)
    }
}

/// A scroll frame with its own APZC.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollFrameDescriptor {
    pub guid: ScrollableLayerGuid,
    /// Metrics as content last painted them.
    pub metrics: FrameMetrics,
    /// Claims gestures before its ancestors.
    pub scrollgrab: bool,
    /// Scroll frame in the same document that receives this frame's
    /// overscroll, when it differs from the enclosing one.
    pub handoff_parent: Option<ViewId>,
}

impl ScrollFrameDescriptor {
    #[must_use]
    pub fn new(guid: ScrollableLayerGuid, metrics: FrameMetrics) -> Self {
        Self {
            guid,
            metrics,
            scrollgrab: false,
            handoff_parent: None,
        }
    }

    #[must_use]
    pub fn with_scrollgrab(mut self, scrollgrab: bool) -> Self {
        self.scrollgrab = scrollgrab;
        self
    }

    #[must_use]
    pub fn with_handoff_parent(mut self, parent: ViewId) -> Self {
        self.handoff_parent = Some(parent);
        self
    }
}

/// A scrollbar thumb and the frame it scrolls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbDescriptor {
    pub target: ScrollableLayerGuid,
    pub axis: Axis,
    /// Length of the thumb along `axis`, in layer pixels.
    pub thumb_length: f32,
    /// Length of the track the thumb slides in.
    pub track_length: f32,
}

impl ThumbDescriptor {
    fn is_valid(&self) -> bool {
        self.thumb_length.is_finite()
            && self.track_length.is_finite()
            && self.thumb_length >= 0.0
            && self.track_length >= self.thumb_length
    }
}

/// What a scene node is.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneNodeKind {
    ScrollFrame(ScrollFrameDescriptor),
    /// Clip and transform only.
    Container,
    ScrollbarThumb(ThumbDescriptor),
}

/// One node of the pre-order scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Distance from the root; the root has depth 0.
    pub depth: u32,
    pub layers_id: LayersId,
    /// Layer space to screen, including every ancestor.
    pub transform: LayerToScreenTransform,
    /// Clip in layer space. Points outside miss this node and its subtree.
    pub clip: Option<LayerRect>,
    pub event_regions: EventRegions,
    pub kind: SceneNodeKind,
}

impl SceneNode {
    /// Container covering `rect`.
    #[must_use]
    pub fn container(depth: u32, layers_id: LayersId, rect: LayerRect) -> Self {
        Self {
            depth,
            layers_id,
            transform: LayerToScreenTransform::identity(),
            clip: Some(rect),
            event_regions: EventRegions::covering(rect),
            kind: SceneNodeKind::Container,
        }
    }

    /// Scroll frame clipped to and hittable over its composition bounds.
    #[must_use]
    pub fn scroll_frame(depth: u32, descriptor: ScrollFrameDescriptor) -> Self {
        let rect = descriptor.metrics.composition_bounds.cast_unit();
        Self {
            depth,
            layers_id: descriptor.guid.layers_id,
            transform: LayerToScreenTransform::identity(),
            clip: Some(rect),
            event_regions: EventRegions::covering(rect),
            kind: SceneNodeKind::ScrollFrame(descriptor),
        }
    }

    /// Scrollbar thumb covering `rect`.
    #[must_use]
    pub fn thumb(depth: u32, rect: LayerRect, thumb: ThumbDescriptor) -> Self {
        Self {
            depth,
            layers_id: thumb.target.layers_id,
            transform: LayerToScreenTransform::identity(),
            clip: None,
            event_regions: EventRegions::covering(rect),
            kind: SceneNodeKind::ScrollbarThumb(thumb),
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: LayerToScreenTransform) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_clip(mut self, clip: Option<LayerRect>) -> Self {
        self.clip = clip;
        self
    }

    #[must_use]
    pub fn with_dispatch_to_content(mut self, rect: LayerRect) -> Self {
        self.event_regions.dispatch_to_content.push(rect);
        self
    }

    #[must_use]
    pub fn with_touch_action(mut self, action: TouchAction) -> Self {
        self.event_regions.touch_action = action;
        self
    }

    #[must_use]
    pub fn with_layers_id(mut self, layers_id: LayersId) -> Self {
        self.layers_id = layers_id;
        self
    }

    /// Guid of the scroll frame, if this is one.
    #[must_use]
    pub fn guid(&self) -> Option<ScrollableLayerGuid> {
        match &self.kind {
            SceneNodeKind::ScrollFrame(d) => Some(d.guid),
            _ => None,
        }
    }

    fn check(&self, index: usize) -> Result<(), SceneError> {
        let geometry_ok = transform_is_finite(&self.transform)
            && self.clip.as_ref().is_none_or(rect_is_valid)
            && self.event_regions.is_valid();
        if !geometry_ok {
            return Err(SceneError::InvalidGeometry { index });
        }
        match &self.kind {
            SceneNodeKind::ScrollFrame(d) => {
                if d.guid.layers_id != self.layers_id {
                    return Err(SceneError::LayersMismatch {
                        index,
                        guid: d.guid,
                        layers_id: self.layers_id,
                    });
                }
                if !d.metrics.is_valid() {
                    return Err(SceneError::InvalidMetrics {
                        index,
                        guid: d.guid,
                    });
                }
            }
            SceneNodeKind::ScrollbarThumb(t) if !t.is_valid() => {
                return Err(SceneError::InvalidGeometry { index });
            }
            _ => {}
        }
        Ok(())
    }
}

/// One scene update from the scene builder.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    /// Layers subtree at the root of the scene.
    pub root_layers_id: LayersId,
    /// Pre-order nodes.
    pub nodes: Vec<SceneNode>,
    /// Set when this is the first paint of that layers subtree.
    pub first_paint: Option<LayersId>,
    /// Increases with every paint of `root_layers_id`.
    pub paint_sequence_number: u64,
}

impl SceneSnapshot {
    #[must_use]
    pub fn new(root_layers_id: LayersId, paint_sequence_number: u64) -> Self {
        Self {
            root_layers_id,
            nodes: Vec::new(),
            first_paint: None,
            paint_sequence_number,
        }
    }

    /// Builder: append a node.
    #[must_use]
    pub fn with_node(mut self, node: SceneNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Builder: mark as a first paint of `layers_id`.
    #[must_use]
    pub fn with_first_paint(mut self, layers_id: LayersId) -> Self {
        self.first_paint = Some(layers_id);
        self
    }

    /// Indices of nodes that survive validation, in order, and the reasons
    /// the others were dropped.
    #[must_use]
    pub fn sanitize(&self) -> (Vec<usize>, Vec<SceneError>) {
        let mut errors = Vec::new();
        let mut kept = Vec::with_capacity(self.nodes.len());

        // Structure and geometry.
        let mut dropping: Option<u32> = None;
        let mut path: Vec<u32> = Vec::new();
        let mut root_seen = false;
        for (index, node) in self.nodes.iter().enumerate() {
            let depth = node.depth;
            if let Some(d) = dropping {
                if depth > d {
                    continue;
                }
                dropping = None;
            }

            let structural = if !root_seen {
                root_seen = true;
                if depth == 0 {
                    Ok(())
                } else {
                    Err(SceneError::MissingRoot { index, depth })
                }
            } else if depth == 0 {
                Err(SceneError::ExtraRoot { index })
            } else {
                while path.last().is_some_and(|&top| top >= depth) {
                    path.pop();
                }
                match path.last() {
                    Some(&top) if top + 1 == depth => Ok(()),
                    _ => Err(SceneError::OrphanNode { index, depth }),
                }
            };

            match structural.and_then(|()| node.check(index)) {
                Ok(()) => {
                    path.push(depth);
                    kept.push(index);
                }
                Err(e) => {
                    errors.push(e);
                    dropping = Some(depth);
                }
            }
        }

        // Thumbs must target a surviving scroll frame.
        let guids: AHashSet<ScrollableLayerGuid> = kept
            .iter()
            .filter_map(|&i| self.nodes[i].guid())
            .collect();
        let mut dropping: Option<u32> = None;
        kept.retain(|&index| {
            let node = &self.nodes[index];
            if let Some(d) = dropping {
                if node.depth > d {
                    return false;
                }
                dropping = None;
            }
            if let SceneNodeKind::ScrollbarThumb(t) = &node.kind
                && !guids.contains(&t.target)
            {
                errors.push(SceneError::DanglingThumb {
                    index,
                    target: t.target,
                });
                dropping = Some(node.depth);
                return false;
            }
            true
        });

        errors.sort_by_key(SceneError::index);
        (kept, errors)
    }
}

/// Outcome of one rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildReport {
    /// The snapshot's paint sequence number was older than one already
    /// applied; nothing changed.
    pub stale: bool,
    /// Nodes dropped from the snapshot.
    pub errors: Vec<SceneError>,
    pub created: Vec<ScrollableLayerGuid>,
    pub recycled: Vec<ScrollableLayerGuid>,
    pub destroyed: Vec<ScrollableLayerGuid>,
    /// Nodes in the rebuilt tree.
    pub node_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::rect;

    const L1: LayersId = LayersId(1);

    fn frame(depth: u32, id: u64) -> SceneNode {
        let metrics = FrameMetrics::new(rect(0.0, 0.0, 1000.0, 1000.0), rect(0.0, 0.0, 500.0, 500.0));
        SceneNode::scroll_frame(
            depth,
            ScrollFrameDescriptor::new(ScrollableLayerGuid::new(L1, 0, id), metrics),
        )
    }

    #[test]
    fn well_formed_scene_is_kept() {
        let scene = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1))
            .with_node(frame(1, 2))
            .with_node(frame(2, 3))
            .with_node(frame(1, 4));
        let (kept, errors) = scene.sanitize();
        assert_eq!(kept, vec![0, 1, 2, 3]);
        assert!(errors.is_empty());
    }

    #[test]
    fn orphan_subtree_is_dropped() {
        let scene = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1))
            .with_node(frame(2, 2))
            .with_node(frame(3, 3))
            .with_node(frame(1, 4));
        let (kept, errors) = scene.sanitize();
        assert_eq!(kept, vec![0, 3]);
        assert_eq!(errors, vec![SceneError::OrphanNode { index: 1, depth: 2 }]);
    }

    #[test]
    fn invalid_geometry_drops_subtree_only() {
        let bad = frame(1, 2).with_transform(LayerToScreenTransform::translation(f32::NAN, 0.0));
        let scene = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1))
            .with_node(bad)
            .with_node(frame(2, 3))
            .with_node(frame(1, 4));
        let (kept, errors) = scene.sanitize();
        assert_eq!(kept, vec![0, 3]);
        assert_eq!(errors, vec![SceneError::InvalidGeometry { index: 1 }]);
    }

    #[test]
    fn extra_root_and_missing_root() {
        let scene = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1))
            .with_node(frame(0, 2));
        let (kept, errors) = scene.sanitize();
        assert_eq!(kept, vec![0]);
        assert_eq!(errors, vec![SceneError::ExtraRoot { index: 1 }]);

        let scene = SceneSnapshot::new(L1, 1).with_node(frame(1, 1));
        let (kept, errors) = scene.sanitize();
        assert!(kept.is_empty());
        assert_eq!(errors, vec![SceneError::MissingRoot { index: 0, depth: 1 }]);
    }

    #[test]
    fn layers_mismatch_is_reported() {
        let scene = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1))
            .with_node(frame(1, 2).with_layers_id(LayersId(9)));
        let (kept, errors) = scene.sanitize();
        assert_eq!(kept, vec![0]);
        assert!(matches!(errors[0], SceneError::LayersMismatch { index: 1, .. }));
    }

    #[test]
    fn dangling_thumb_is_dropped() {
        let thumb = ThumbDescriptor {
            target: ScrollableLayerGuid::new(L1, 0, 42),
            axis: Axis::Y,
            thumb_length: 50.0,
            track_length: 500.0,
        };
        let scene = SceneSnapshot::new(L1, 1)
            .with_node(frame(0, 1))
            .with_node(SceneNode::thumb(1, rect(490.0, 0.0, 10.0, 50.0), thumb));
        let (kept, errors) = scene.sanitize();
        assert_eq!(kept, vec![0]);
        assert!(matches!(errors[0], SceneError::DanglingThumb { index: 1, .. }));
    }
}

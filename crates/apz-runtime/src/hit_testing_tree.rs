#![forbid(unsafe_code)]

//! The hit-testing tree: an arena of scene nodes linked parent to child,
//! rebuilt from every [`SceneSnapshot`](crate::scene::SceneSnapshot).
//!
//! Nodes are stored in pre-order in one `Vec`, and links are indices into it,
//! so the tree owns its nodes outright. A node that is a scroll frame holds a
//! shared handle to its [`AsyncPanZoomController`]; the first node seen for a
//! guid in a rebuild is that guid's *primary holder*.
//!
//! # Hit testing
//!
//! [`HitTestingTree::hit_test`] walks depth-first from the root. A node's
//! clip is tested before its subtree, and a miss prunes the subtree. Among
//! siblings the one rendered on top (the last, under
//! [`SiblingOrder::LastWins`]) is tried first. Points entering the content of
//! a scroll frame are first moved back through that frame's async transform,
//! so a point hits whatever is drawn under it on screen right now.
//!
//! # Invariants
//!
//! 1. `parent`, `first_child`, `last_child`, `prev_sibling` and
//!    `next_sibling` are consistent: following any link and back returns to
//!    the same node.
//! 2. Every guid with an APZC has exactly one primary holder.
//! 3. The walk uses an explicit stack, never recursion, so scene depth is
//!    bounded only by memory.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;
use apz_core::event::AllowedTouchBehavior;
use apz_core::geometry::{
    Axis, LayerPixel, LayerPoint, LayerRect, LayerToScreenTransform, ScreenPixel, ScreenPoint,
    rect_contains,
};
use apz_core::guid::{LayersId, ScrollableLayerGuid, ViewId};
use bitflags::bitflags;
use euclid::Transform2D;

use crate::apzc::AsyncPanZoomController;
use crate::config::{EdgePolicy, HitTestPolicy, SiblingOrder};
use crate::scene::{EventRegions, ThumbDescriptor, TouchAction};

type Apzc = AsyncPanZoomController;

bitflags! {
    /// What a hit test found under the point.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HitTestFlags: u16 {
        /// Something was hit.
        const VISIBLE                      = 1 << 0;
        /// Content must see the event before APZ can act on it.
        const DISPATCH_TO_CONTENT          = 1 << 1;
        const SCROLLBAR                    = 1 << 2;
        const SCROLLBAR_THUMB              = 1 << 3;
        const SCROLLBAR_VERTICAL           = 1 << 4;
        /// The input queue has to wait for content to confirm the target.
        const REQUIRES_TARGET_CONFIRMATION = 1 << 5;
        /// Touch behavior under the point is not known yet.
        const TOUCH_ACTION_UNKNOWN         = 1 << 6;
    }
}

/// Index of a node in a tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-node data supplied by the rebuild.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub layers_id: LayersId,
    pub apzc: Option<Arc<Apzc>>,
    pub clip: Option<LayerRect>,
    pub event_regions: EventRegions,
    /// Layer space to screen, including every ancestor.
    pub transform: LayerToScreenTransform,
    pub thumb: Option<ThumbDescriptor>,
    /// Explicit scroll handoff parent of this node's scroll frame.
    pub handoff_parent: Option<ViewId>,
}

impl NodeData {
    /// Plain node with no APZC.
    #[must_use]
    pub fn new(layers_id: LayersId, transform: LayerToScreenTransform) -> Self {
        Self {
            layers_id,
            apzc: None,
            clip: None,
            event_regions: EventRegions::default(),
            transform,
            thumb: None,
            handoff_parent: None,
        }
    }
}

#[derive(Debug)]
pub struct HitTestingTreeNode {
    data: NodeData,
    from_screen: Option<Transform2D<f32, ScreenPixel, LayerPixel>>,
    is_primary_holder: bool,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl HitTestingTreeNode {
    #[inline]
    #[must_use]
    pub fn apzc(&self) -> Option<&Arc<Apzc>> {
        self.data.apzc.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn layers_id(&self) -> LayersId {
        self.data.layers_id
    }

    #[inline]
    #[must_use]
    pub fn is_primary_holder(&self) -> bool {
        self.is_primary_holder
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> LayerToScreenTransform {
        self.data.transform
    }

    #[inline]
    #[must_use]
    pub fn thumb(&self) -> Option<&ThumbDescriptor> {
        self.data.thumb.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn handoff_parent(&self) -> Option<ViewId> {
        self.data.handoff_parent
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    #[inline]
    #[must_use]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    #[inline]
    #[must_use]
    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    #[inline]
    #[must_use]
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    fn to_layer(&self, p: ScreenPoint) -> Option<LayerPoint> {
        self.from_screen.map(|t| t.transform_point(p))
    }
}

/// Everything a hit test found.
#[derive(Debug, Clone, Default)]
pub struct HitTestResult {
    /// APZC that should handle the input, or `None` when nothing scrollable
    /// was hit or content must decide first.
    pub apzc: Option<Arc<Apzc>>,
    /// Nearest APZC of the hit node even when content must decide first;
    /// the input queue uses it until content confirms a target.
    pub tentative: Option<Arc<Apzc>>,
    pub flags: HitTestFlags,
    pub layers_id: Option<LayersId>,
    pub thumb: Option<ThumbDescriptor>,
    /// Touch behaviors along the hit path, when all of them are known.
    pub allowed_touch: Option<AllowedTouchBehavior>,
    pub node: Option<NodeId>,
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct HitTestingTree {
    nodes: Vec<HitTestingTreeNode>,
    primary: AHashMap<ScrollableLayerGuid, NodeId>,
    policy: HitTestPolicy,
}

impl HitTestingTree {
    #[must_use]
    pub fn empty(policy: HitTestPolicy) -> Self {
        Self {
            nodes: Vec::new(),
            primary: AHashMap::new(),
            policy,
        }
    }

    #[must_use]
    pub fn builder(policy: HitTestPolicy) -> TreeBuilder {
        TreeBuilder {
            tree: Self::empty(policy),
            path: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&HitTestingTreeNode> {
        self.nodes.get(id.index())
    }

    /// Children of `id`, first to last.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let first = self.node(id).and_then(|n| n.first_child);
        std::iter::successors(first, |&c| self.nodes[c.index()].next_sibling)
    }

    /// Primary holder of `guid`.
    #[must_use]
    pub fn primary_node(&self, guid: &ScrollableLayerGuid) -> Option<NodeId> {
        self.primary.get(guid).copied()
    }

    /// Guids with an APZC somewhere in the tree.
    #[must_use]
    pub fn guids(&self) -> BTreeSet<ScrollableLayerGuid> {
        self.primary.keys().copied().collect()
    }

    /// Layers subtrees with at least one node in the tree.
    #[must_use]
    pub fn layers_ids(&self) -> BTreeSet<LayersId> {
        self.nodes.iter().map(|n| n.data.layers_id).collect()
    }

    /// One handle per APZC in the tree, in pre-order of primary holders.
    #[must_use]
    pub fn apzcs(&self) -> Vec<Arc<Apzc>> {
        self.nodes
            .iter()
            .filter(|n| n.is_primary_holder)
            .filter_map(|n| n.data.apzc.clone())
            .collect()
    }

    /// Nearest APZC at or above `id`.
    #[must_use]
    pub fn nearest_apzc(&self, id: NodeId) -> Option<&Arc<Apzc>> {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let node = &self.nodes[c.index()];
            if let Some(apzc) = &node.data.apzc {
                return Some(apzc);
            }
            cursor = node.parent;
        }
        None
    }

    /// APZC that scroll from `guid` hands off to: the explicit handoff
    /// parent when its guid is in the tree, else the nearest enclosing APZC
    /// of a different guid.
    #[must_use]
    pub fn parent_apzc(&self, guid: &ScrollableLayerGuid) -> Option<&Arc<Apzc>> {
        let id = self.primary_node(guid)?;
        let node = &self.nodes[id.index()];
        if let Some(scroll_id) = node.data.handoff_parent {
            let target = ScrollableLayerGuid::new(guid.layers_id, guid.pres_shell_id, scroll_id);
            if let Some(parent) = self.primary_node(&target)
                && let Some(apzc) = &self.nodes[parent.index()].data.apzc
            {
                return Some(apzc);
            }
        }
        let mut cursor = node.parent;
        while let Some(c) = cursor {
            let n = &self.nodes[c.index()];
            if let Some(apzc) = &n.data.apzc
                && apzc.guid() != *guid
            {
                return Some(apzc);
            }
            cursor = n.parent;
        }
        None
    }

    fn contains(&self, rect: &LayerRect, p: LayerPoint) -> bool {
        rect_contains(rect, p, self.policy.edges == EdgePolicy::Inclusive)
    }

    fn hits_region(&self, regions: &EventRegions, p: LayerPoint) -> bool {
        regions
            .hit_region
            .iter()
            .chain(&regions.dispatch_to_content)
            .any(|r| self.contains(r, p))
    }

    /// Topmost node whose hit region contains `point`.
    #[must_use]
    pub fn hit_node(&self, point: ScreenPoint) -> Option<(NodeId, LayerPoint)> {
        let root = self.root()?;
        let mut stack: Vec<(NodeId, ScreenPoint, bool)> = vec![(root, point, false)];
        while let Some((id, p, visited)) = stack.pop() {
            let node = &self.nodes[id.index()];
            let Some(local) = node.to_layer(p) else {
                continue;
            };
            if visited {
                if self.hits_region(&node.data.event_regions, local) {
                    return Some((id, local));
                }
                continue;
            }
            if node.data.clip.is_some_and(|clip| !self.contains(&clip, local)) {
                continue;
            }
            stack.push((id, p, true));

            let inner = match &node.data.apzc {
                Some(apzc) => apzc.untransform_point(p).unwrap_or(p),
                None => p,
            };
            let mark = stack.len();
            for child in self.children(id) {
                stack.push((child, inner, false));
            }
            // The last pushed pops first.
            if self.policy.sibling_order == SiblingOrder::FirstWins {
                stack[mark..].reverse();
            }
        }
        None
    }

    /// Hit test `point`, returning the handling APZC and flags.
    #[must_use]
    pub fn hit_test(&self, point: ScreenPoint) -> (Option<Arc<Apzc>>, HitTestFlags) {
        let result = self.hit_test_detailed(point);
        (result.apzc, result.flags)
    }

    #[must_use]
    pub fn hit_test_detailed(&self, point: ScreenPoint) -> HitTestResult {
        let Some((id, local)) = self.hit_node(point) else {
            return HitTestResult::default();
        };
        let node = &self.nodes[id.index()];
        let mut flags = HitTestFlags::VISIBLE;

        let dispatch_to_content = node
            .data
            .event_regions
            .dispatch_to_content
            .iter()
            .any(|r| self.contains(r, local));
        if dispatch_to_content {
            flags |= HitTestFlags::DISPATCH_TO_CONTENT | HitTestFlags::REQUIRES_TARGET_CONFIRMATION;
        }

        let allowed_touch = self.touch_behavior_along(id);
        if allowed_touch.is_none() {
            flags |= HitTestFlags::TOUCH_ACTION_UNKNOWN | HitTestFlags::REQUIRES_TARGET_CONFIRMATION;
        }

        if let Some(thumb) = &node.data.thumb {
            flags |= HitTestFlags::SCROLLBAR | HitTestFlags::SCROLLBAR_THUMB;
            if thumb.axis == Axis::Y {
                flags |= HitTestFlags::SCROLLBAR_VERTICAL;
            }
        }

        let tentative = self.nearest_apzc(id).cloned();
        HitTestResult {
            apzc: if dispatch_to_content { None } else { tentative.clone() },
            tentative,
            flags,
            layers_id: Some(node.data.layers_id),
            thumb: node.data.thumb,
            allowed_touch,
            node: Some(id),
        }
    }

    /// Intersection of the touch behaviors declared from `id` to the root.
    fn touch_behavior_along(&self, id: NodeId) -> Option<AllowedTouchBehavior> {
        let mut allowed = AllowedTouchBehavior::AUTO;
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let node = &self.nodes[c.index()];
            match node.data.event_regions.touch_action {
                TouchAction::Unknown => return None,
                action => {
                    if let Some(b) = action.known_behavior() {
                        allowed &= b;
                    }
                }
            }
            cursor = node.parent;
        }
        Some(allowed)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Appends pre-order nodes by depth and links them.
#[derive(Debug)]
pub struct TreeBuilder {
    tree: HitTestingTree,
    /// Open ancestors, root first.
    path: Vec<NodeId>,
}

impl TreeBuilder {
    /// Append a node at `depth`. Its parent is the open node one level up;
    /// depths deeper than that attach to the deepest open node. A second
    /// root is refused.
    pub fn push(&mut self, depth: u32, data: NodeData) -> Option<NodeId> {
        let id = NodeId(self.tree.nodes.len() as u32);
        self.path.truncate(depth as usize);
        let parent = self.path.last().copied();
        if parent.is_none() && !self.tree.nodes.is_empty() {
            return None;
        }

        let is_primary_holder = match &data.apzc {
            Some(apzc) => {
                let guid = apzc.guid();
                if self.tree.primary.contains_key(&guid) {
                    false
                } else {
                    self.tree.primary.insert(guid, id);
                    true
                }
            }
            None => false,
        };

        let mut prev_sibling = None;
        if let Some(p) = parent {
            let parent_node = &mut self.tree.nodes[p.index()];
            prev_sibling = parent_node.last_child;
            parent_node.last_child = Some(id);
            if parent_node.first_child.is_none() {
                parent_node.first_child = Some(id);
            }
            if let Some(prev) = prev_sibling {
                self.tree.nodes[prev.index()].next_sibling = Some(id);
            }
        }

        self.tree.nodes.push(HitTestingTreeNode {
            from_screen: data.transform.inverse(),
            data,
            is_primary_holder,
            parent,
            first_child: None,
            last_child: None,
            prev_sibling,
            next_sibling: None,
        });
        self.path.push(id);
        Some(id)
    }

    #[must_use]
    pub fn finish(self) -> HitTestingTree {
        self.tree
    }
}

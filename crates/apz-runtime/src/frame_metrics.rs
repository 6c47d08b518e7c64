#![forbid(unsafe_code)]

//! Scroll frame metrics and the async transform derived from them.
//!
//! # Invariants
//!
//! 1. A clamped scroll offset lies in `[scrollable.origin, scrollable.max −
//!    viewport]` on both axes, where the viewport is the composition bounds
//!    divided by the zoom.
//! 2. When the scrollable rect is smaller than the viewport, the range
//!    collapses to its origin.

use apz_core::geometry::{
    Axis, CssPoint, CssRect, CssSize, CssToParentLayerScale, CssVector, LayerPixel, LayerTransform,
    ParentLayerRect, ParentLayerVector,
};
use euclid::{Point2D, Transform2D};

/// Scroll and zoom state of one scroll frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetrics {
    /// Top-left of the visible area, in document pixels.
    pub scroll_offset: CssPoint,
    /// Extent of the scrollable content.
    pub scrollable_rect: CssRect,
    /// Visible area of the scroll frame in its parent layer.
    pub composition_bounds: ParentLayerRect,
    pub zoom: CssToParentLayerScale,
    /// Bumped by content whenever script scrolls the frame.
    pub scroll_generation: u64,
    /// Whether this is the root content scroll frame of its document.
    pub is_root_content: bool,
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self {
            scroll_offset: CssPoint::origin(),
            scrollable_rect: CssRect::zero(),
            composition_bounds: ParentLayerRect::zero(),
            zoom: CssToParentLayerScale::new(1.0),
            scroll_generation: 0,
            is_root_content: false,
        }
    }
}

impl FrameMetrics {
    /// Metrics for a frame showing `composition` of `scrollable` at zoom 1.
    #[must_use]
    pub fn new(scrollable_rect: CssRect, composition_bounds: ParentLayerRect) -> Self {
        Self {
            scrollable_rect,
            composition_bounds,
            ..Self::default()
        }
    }

    /// Builder: set the scroll offset.
    #[must_use]
    pub fn with_scroll_offset(mut self, offset: CssPoint) -> Self {
        self.scroll_offset = offset;
        self
    }

    /// Builder: set the zoom.
    #[must_use]
    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = CssToParentLayerScale::new(zoom);
        self
    }

    /// Builder: set the scroll generation.
    #[must_use]
    pub fn with_scroll_generation(mut self, generation: u64) -> Self {
        self.scroll_generation = generation;
        self
    }

    /// Builder: mark as root content.
    #[must_use]
    pub fn with_root_content(mut self, root: bool) -> Self {
        self.is_root_content = root;
        self
    }

    /// Visible size in document pixels.
    #[must_use]
    pub fn viewport_size(&self) -> CssSize {
        let z = self.zoom.get().max(f32::EPSILON);
        CssSize::new(
            self.composition_bounds.size.width / z,
            self.composition_bounds.size.height / z,
        )
    }

    /// The rectangle scroll offsets are clamped to.
    #[must_use]
    pub fn scroll_range(&self) -> CssRect {
        let vp = self.viewport_size();
        CssRect::new(
            self.scrollable_rect.origin,
            CssSize::new(
                (self.scrollable_rect.size.width - vp.width).max(0.0),
                (self.scrollable_rect.size.height - vp.height).max(0.0),
            ),
        )
    }

    /// Clamp `offset` into the scroll range.
    #[must_use]
    pub fn clamp_offset(&self, offset: CssPoint) -> CssPoint {
        let range = self.scroll_range();
        CssPoint::new(
            offset.x.clamp(range.min_x(), range.max_x()),
            offset.y.clamp(range.min_y(), range.max_y()),
        )
    }

    /// Whether the frame has anything to scroll along `axis`.
    #[must_use]
    pub fn can_scroll(&self, axis: Axis) -> bool {
        axis.of_size(self.scroll_range().size) > 0.0
    }

    /// Whether a positive (`delta > 0`) or negative displacement along `axis`
    /// would move the offset.
    #[must_use]
    pub fn can_scroll_in_direction(&self, axis: Axis, delta: f32) -> bool {
        let range = self.scroll_range();
        let pos = axis.of_point(self.scroll_offset);
        let (min, max) = match axis {
            Axis::X => (range.min_x(), range.max_x()),
            Axis::Y => (range.min_y(), range.max_y()),
        };
        if delta > 0.0 {
            pos < max
        } else if delta < 0.0 {
            pos > min
        } else {
            false
        }
    }

    /// Offset after applying `delta`, clamped.
    #[must_use]
    pub fn offset_after(&self, delta: CssVector) -> CssPoint {
        self.clamp_offset(self.scroll_offset + delta)
    }

    /// Whether every float in the metrics is finite and sizes are non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        use apz_core::geometry::rect_is_valid;
        self.scroll_offset.x.is_finite()
            && self.scroll_offset.y.is_finite()
            && rect_is_valid(&self.scrollable_rect)
            && rect_is_valid(&self.composition_bounds)
            && self.zoom.get().is_finite()
            && self.zoom.get() > 0.0
    }
}

// ---------------------------------------------------------------------------
// AsyncTransform
// ---------------------------------------------------------------------------

/// Difference between what content last painted and what APZ shows now.
///
/// The compositor applies this to the scroll frame's painted content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsyncTransform {
    pub translation: ParentLayerVector,
    pub scale: f32,
}

impl Default for AsyncTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AsyncTransform {
    pub const IDENTITY: Self = Self {
        translation: ParentLayerVector::new(0.0, 0.0),
        scale: 1.0,
    };

    /// Transform between `painted` and `current`, plus an overscroll stretch
    /// (parent-layer pixels past the scroll edge).
    #[must_use]
    pub fn between(
        painted: &FrameMetrics,
        current: &FrameMetrics,
        overscroll: ParentLayerVector,
    ) -> Self {
        let painted_zoom = painted.zoom.get().max(f32::EPSILON);
        let zoom = current.zoom.get();
        let scale = zoom / painted_zoom;
        let delta = painted.scroll_offset - current.scroll_offset;
        // Zoom keeps the composition origin fixed.
        let origin = current.composition_bounds.origin.to_vector() * (1.0 - scale);
        Self {
            translation: ParentLayerVector::new(delta.x * zoom, delta.y * zoom) + origin
                - overscroll,
            scale,
        }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Matrix form: scale about the origin, then translate.
    #[must_use]
    pub fn to_layer_transform(&self) -> LayerTransform {
        Transform2D::scale(self.scale, self.scale)
            .then_translate(euclid::Vector2D::new(self.translation.x, self.translation.y))
    }

    /// Apply to a point in the scroll frame's layer space.
    #[must_use]
    pub fn apply(&self, p: Point2D<f32, LayerPixel>) -> Point2D<f32, LayerPixel> {
        self.to_layer_transform().transform_point(p)
    }
}

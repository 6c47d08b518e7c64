#![forbid(unsafe_code)]

//! Typed pixel spaces.
//!
//! Every coordinate the engine handles is tagged with the space it lives in,
//! using `euclid` unit markers:
//!
//! | Space | Meaning |
//! |-------|---------|
//! | [`ScreenPixel`] | device pixels of the compositor surface; input arrives here |
//! | [`LayerPixel`] | local space of one hit-testing tree node |
//! | [`ParentLayerPixel`] | space a scroll frame's composition bounds are expressed in |
//! | [`CssPixel`] | document space; scroll offsets and scrollable rects |
//!
//! A scroll frame's `ParentLayerPixel` space is the `LayerPixel` space of the
//! tree node that carries it, so conversions between the two are unit casts.

use euclid::{Point2D, Rect, Scale, Size2D, Transform2D, Vector2D};

/// Compositor surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenPixel;

/// Node-local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerPixel;

/// Pixels of a scroll frame's parent layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentLayerPixel;

/// Document pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CssPixel;

pub type ScreenPoint = Point2D<f32, ScreenPixel>;
pub type ScreenVector = Vector2D<f32, ScreenPixel>;
pub type ScreenRect = Rect<f32, ScreenPixel>;

pub type LayerPoint = Point2D<f32, LayerPixel>;
pub type LayerRect = Rect<f32, LayerPixel>;

pub type ParentLayerPoint = Point2D<f32, ParentLayerPixel>;
pub type ParentLayerVector = Vector2D<f32, ParentLayerPixel>;
pub type ParentLayerRect = Rect<f32, ParentLayerPixel>;

pub type CssPoint = Point2D<f32, CssPixel>;
pub type CssVector = Vector2D<f32, CssPixel>;
pub type CssRect = Rect<f32, CssPixel>;
pub type CssSize = Size2D<f32, CssPixel>;

/// Zoom: CSS pixels to parent-layer pixels.
pub type CssToParentLayerScale = Scale<f32, CssPixel, ParentLayerPixel>;

/// Transform of a node relative to its parent node.
pub type LayerTransform = Transform2D<f32, LayerPixel, LayerPixel>;
/// Cached node-to-root transform.
pub type LayerToScreenTransform = Transform2D<f32, LayerPixel, ScreenPixel>;
/// Transform from a scroll frame's parent-layer space to the screen.
pub type ParentLayerToScreenTransform = Transform2D<f32, ParentLayerPixel, ScreenPixel>;

/// A scroll axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Both axes, horizontal first.
    pub const BOTH: [Axis; 2] = [Axis::X, Axis::Y];

    /// The perpendicular axis.
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }

    /// Component of a vector along this axis.
    #[inline]
    #[must_use]
    pub fn of_vector<U>(self, v: Vector2D<f32, U>) -> f32 {
        match self {
            Self::X => v.x,
            Self::Y => v.y,
        }
    }

    /// Component of a point along this axis.
    #[inline]
    #[must_use]
    pub fn of_point<U>(self, p: Point2D<f32, U>) -> f32 {
        match self {
            Self::X => p.x,
            Self::Y => p.y,
        }
    }

    /// Extent of a size along this axis.
    #[inline]
    #[must_use]
    pub fn of_size<U>(self, s: Size2D<f32, U>) -> f32 {
        match self {
            Self::X => s.width,
            Self::Y => s.height,
        }
    }

    /// Vector with `value` on this axis and zero on the other.
    #[inline]
    #[must_use]
    pub fn vector<U>(self, value: f32) -> Vector2D<f32, U> {
        match self {
            Self::X => Vector2D::new(value, 0.0),
            Self::Y => Vector2D::new(0.0, value),
        }
    }

    /// Copy of `v` with this axis replaced by `value`.
    #[inline]
    #[must_use]
    pub fn set_vector<U>(self, v: Vector2D<f32, U>, value: f32) -> Vector2D<f32, U> {
        match self {
            Self::X => Vector2D::new(value, v.y),
            Self::Y => Vector2D::new(v.x, value),
        }
    }

    /// Copy of `p` with this axis replaced by `value`.
    #[inline]
    #[must_use]
    pub fn set_point<U>(self, p: Point2D<f32, U>, value: f32) -> Point2D<f32, U> {
        match self {
            Self::X => Point2D::new(value, p.y),
            Self::Y => Point2D::new(p.x, value),
        }
    }
}

/// Point containment with a choice of edge semantics.
///
/// Half-open (`inclusive == false`) matches `Rect::contains`: the right and
/// bottom edges belong to the neighbour.
#[must_use]
pub fn rect_contains<U>(rect: &Rect<f32, U>, point: Point2D<f32, U>, inclusive: bool) -> bool {
    if inclusive {
        point.x >= rect.min_x()
            && point.x <= rect.max_x()
            && point.y >= rect.min_y()
            && point.y <= rect.max_y()
    } else {
        rect.contains(point)
    }
}

/// Whether all four components are finite and the size is non-negative.
#[must_use]
pub fn rect_is_valid<U>(rect: &Rect<f32, U>) -> bool {
    rect.origin.x.is_finite()
        && rect.origin.y.is_finite()
        && rect.size.width.is_finite()
        && rect.size.height.is_finite()
        && rect.size.width >= 0.0
        && rect.size.height >= 0.0
}

/// Whether every matrix entry is finite.
#[must_use]
pub fn transform_is_finite<S, D>(t: &Transform2D<f32, S, D>) -> bool {
    [t.m11, t.m12, t.m21, t.m22, t.m31, t.m32]
        .iter()
        .all(|v| v.is_finite())
}

/// Zero out components whose magnitude is below `epsilon`.
#[must_use]
pub fn snap_to_zero<U>(v: Vector2D<f32, U>, epsilon: f32) -> Vector2D<f32, U> {
    let snap = |c: f32| if c.abs() < epsilon { 0.0 } else { c };
    Vector2D::new(snap(v.x), snap(v.y))
}

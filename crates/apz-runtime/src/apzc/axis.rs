#![forbid(unsafe_code)]

//! Axis locking and touch-behavior restriction for pans.

use apz_core::event::AllowedTouchBehavior;
use apz_core::geometry::{Axis, ScreenVector};

use crate::config::AxisLockMode;

/// Lock a pan chooses when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanLock {
    Free,
    Locked(Axis),
}

impl PanLock {
    /// Lock for a pan whose first motion from the touch point is `start`.
    ///
    /// In [`AxisLockMode::Standard`] motion within `angle_degrees` of an axis
    /// locks the pan to that axis.
    #[must_use]
    pub fn choose(start: ScreenVector, mode: AxisLockMode, angle_degrees: f32) -> Self {
        if mode == AxisLockMode::Free {
            return Self::Free;
        }
        let angle = start.y.abs().atan2(start.x.abs()).to_degrees();
        if angle < angle_degrees {
            Self::Locked(Axis::X)
        } else if angle > 90.0 - angle_degrees {
            Self::Locked(Axis::Y)
        } else {
            Self::Free
        }
    }

    /// Zero the components this lock excludes.
    #[must_use]
    pub fn apply(self, v: ScreenVector) -> ScreenVector {
        match self {
            Self::Free => v,
            Self::Locked(axis) => axis.vector(axis.of_vector(v)),
        }
    }
}

/// Zero the components content does not allow panning along.
#[must_use]
pub fn restrict_to_allowed(v: ScreenVector, allowed: AllowedTouchBehavior) -> ScreenVector {
    let x = if allowed.contains(AllowedTouchBehavior::HORIZONTAL_PAN) {
        v.x
    } else {
        0.0
    };
    let y = if allowed.contains(AllowedTouchBehavior::VERTICAL_PAN) {
        v.y
    } else {
        0.0
    };
    ScreenVector::new(x, y)
}

/// Whether content allows any panning.
#[must_use]
pub fn allows_pan(allowed: AllowedTouchBehavior) -> bool {
    allowed.intersects(AllowedTouchBehavior::HORIZONTAL_PAN | AllowedTouchBehavior::VERTICAL_PAN)
}

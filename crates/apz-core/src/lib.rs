#![forbid(unsafe_code)]

//! Core value types for the asynchronous pan/zoom engine.
//!
//! This crate holds everything the engine needs that does not depend on the
//! hit-testing tree or on locking: scrollable-layer identifiers, the typed
//! pixel spaces, the input event model, animation primitives, velocity
//! tracking, and the touch gesture listener.

pub mod animation;
pub mod event;
pub mod geometry;
pub mod gesture;
pub mod guid;
pub mod read_optimized;
pub mod velocity;

pub use event::{
    AllowedTouchBehavior, InputData, KeyCode, KeyboardInput, Modifiers, MouseButton, MouseInput,
    MouseKind, MultiTouchInput, PinchGestureInput, PinchKind, ScrollMode, ScrollWheelInput,
    SingleTouch, TouchKind, WheelDeltaMode,
};
pub use geometry::{
    Axis, CssPixel, CssPoint, CssRect, CssSize, CssToParentLayerScale, CssVector, LayerPixel,
    LayerPoint, LayerRect, LayerToScreenTransform, LayerTransform, ParentLayerPixel,
    ParentLayerPoint, ParentLayerRect, ParentLayerToScreenTransform, ParentLayerVector,
    ScreenPixel, ScreenPoint, ScreenRect, ScreenVector,
};
pub use guid::{LayersId, NULL_SCROLL_ID, ScrollableLayerGuid, ViewId};

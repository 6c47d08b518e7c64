#![forbid(unsafe_code)]

//! Input event model.
//!
//! [`InputData`] is the single event type the engine accepts. Every variant
//! carries the time the OS captured it and the modifier state, and all
//! positions are in [`ScreenPixel`](crate::geometry::ScreenPixel) space.
//!
//! # Design
//!
//! Touch events carry every touch point that changed, the way platform touch
//! APIs report them. A touch-end lists the touches that lifted, so the number
//! of touches still down is tracked by receivers, not by the event.

use bitflags::bitflags;
use smallvec::SmallVec;
use web_time::Instant;

use crate::geometry::{ScreenPoint, ScreenVector};

bitflags! {
    /// Modifier keys held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Super/Meta/Command key.
        const SUPER = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

bitflags! {
    /// Touch behaviors content allows for a touch block (CSS `touch-action`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AllowedTouchBehavior: u8 {
        const NONE            = 0b0000;
        const HORIZONTAL_PAN  = 0b0001;
        const VERTICAL_PAN    = 0b0010;
        const PINCH_ZOOM      = 0b0100;
        const DOUBLE_TAP_ZOOM = 0b1000;
        const AUTO = Self::HORIZONTAL_PAN.bits()
            | Self::VERTICAL_PAN.bits()
            | Self::PINCH_ZOOM.bits()
            | Self::DOUBLE_TAP_ZOOM.bits();
    }
}

impl Default for AllowedTouchBehavior {
    fn default() -> Self {
        Self::AUTO
    }
}

// ---------------------------------------------------------------------------
// Touch
// ---------------------------------------------------------------------------

/// One touch point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleTouch {
    /// Platform identifier, stable for the lifetime of the touch.
    pub identifier: i32,
    /// Position on screen.
    pub point: ScreenPoint,
}

/// Phase of a multi-touch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchKind {
    Start,
    Move,
    End,
    Cancel,
}

/// A touch event carrying one or more touch points.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTouchInput {
    pub kind: TouchKind,
    pub touches: SmallVec<[SingleTouch; 2]>,
    pub time: Instant,
    pub modifiers: Modifiers,
}

impl MultiTouchInput {
    /// Create an event with no touch points.
    #[must_use]
    pub fn new(kind: TouchKind, time: Instant) -> Self {
        Self {
            kind,
            touches: SmallVec::new(),
            time,
            modifiers: Modifiers::NONE,
        }
    }

    /// Add a touch point (builder pattern).
    #[must_use]
    pub fn with_touch(mut self, identifier: i32, point: ScreenPoint) -> Self {
        self.touches.push(SingleTouch { identifier, point });
        self
    }

    /// Set modifiers (builder pattern).
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Average position of the event's touch points.
    #[must_use]
    pub fn centroid(&self) -> Option<ScreenPoint> {
        if self.touches.is_empty() {
            return None;
        }
        let n = self.touches.len() as f32;
        let sum = self
            .touches
            .iter()
            .fold(ScreenVector::zero(), |acc, t| acc + t.point.to_vector());
        Some((sum / n).to_point())
    }

    /// Position of the first touch point.
    #[inline]
    #[must_use]
    pub fn first_point(&self) -> Option<ScreenPoint> {
        self.touches.first().map(|t| t.point)
    }

    /// Mouse event a single-touch event becomes when it lands on a scrollbar
    /// thumb. Multi-touch events have no mouse equivalent.
    #[must_use]
    pub fn to_synthetic_mouse(&self) -> Option<MouseInput> {
        if self.touches.len() != 1 {
            return None;
        }
        let kind = match self.kind {
            TouchKind::Start => MouseKind::Down(MouseButton::Primary),
            TouchKind::Move => MouseKind::Move,
            TouchKind::End | TouchKind::Cancel => MouseKind::Up(MouseButton::Primary),
        };
        Some(MouseInput {
            kind,
            point: self.touches[0].point,
            time: self.time,
            modifiers: self.modifiers,
            from_touch: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Mouse
// ---------------------------------------------------------------------------

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}

/// The type of mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseKind {
    Down(MouseButton),
    Up(MouseButton),
    Move,
}

/// A mouse event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseInput {
    pub kind: MouseKind,
    pub point: ScreenPoint,
    pub time: Instant,
    pub modifiers: Modifiers,
    /// Set when the event was converted from a touch on a scrollbar thumb.
    pub from_touch: bool,
}

impl MouseInput {
    /// Create a new mouse event.
    #[must_use]
    pub const fn new(kind: MouseKind, point: ScreenPoint, time: Instant) -> Self {
        Self {
            kind,
            point,
            time,
            modifiers: Modifiers::NONE,
            from_touch: false,
        }
    }

    /// Set modifiers (builder pattern).
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

// ---------------------------------------------------------------------------
// Wheel
// ---------------------------------------------------------------------------

/// Unit of a wheel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelDeltaMode {
    /// Delta counts lines.
    Line,
    /// Delta counts pages.
    Page,
    /// Delta is in screen pixels.
    Pixel,
}

/// How a wheel delta is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollMode {
    Instant,
    Smooth,
}

/// A wheel or trackpad scroll event. Positive deltas scroll toward the end
/// of the content (right, down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollWheelInput {
    pub origin: ScreenPoint,
    pub delta: ScreenVector,
    pub delta_mode: WheelDeltaMode,
    pub scroll_mode: ScrollMode,
    pub time: Instant,
    pub modifiers: Modifiers,
}

impl ScrollWheelInput {
    /// Create a pixel-delta wheel event applied instantly.
    #[must_use]
    pub const fn new(origin: ScreenPoint, delta: ScreenVector, time: Instant) -> Self {
        Self {
            origin,
            delta,
            delta_mode: WheelDeltaMode::Pixel,
            scroll_mode: ScrollMode::Instant,
            time,
            modifiers: Modifiers::NONE,
        }
    }

    /// Set the delta unit (builder pattern).
    #[must_use]
    pub const fn with_delta_mode(mut self, mode: WheelDeltaMode) -> Self {
        self.delta_mode = mode;
        self
    }

    /// Set the scroll mode (builder pattern).
    #[must_use]
    pub const fn with_scroll_mode(mut self, mode: ScrollMode) -> Self {
        self.scroll_mode = mode;
        self
    }
}

// ---------------------------------------------------------------------------
// Pinch
// ---------------------------------------------------------------------------

/// Phase of a pinch gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinchKind {
    Start,
    Scale,
    End,
}

/// A platform pinch gesture event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchGestureInput {
    pub kind: PinchKind,
    pub focus: ScreenPoint,
    /// Distance between the two fingers now.
    pub current_span: f32,
    /// Distance between the two fingers at the previous event.
    pub previous_span: f32,
    pub time: Instant,
    pub modifiers: Modifiers,
}

impl PinchGestureInput {
    /// Create a new pinch event.
    #[must_use]
    pub const fn new(
        kind: PinchKind,
        focus: ScreenPoint,
        current_span: f32,
        previous_span: f32,
        time: Instant,
    ) -> Self {
        Self {
            kind,
            focus,
            current_span,
            previous_span,
            time,
            modifiers: Modifiers::NONE,
        }
    }

    /// Zoom ratio this event asks for. `1.0` when the previous span is
    /// degenerate.
    #[must_use]
    pub fn scale_ratio(&self) -> f32 {
        if self.previous_span > f32::EPSILON && self.current_span.is_finite() {
            self.current_span / self.previous_span
        } else {
            1.0
        }
    }
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

/// Keys the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    Space,
    Char(char),
    Other(u32),
}

/// A key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyboardInput {
    pub code: KeyCode,
    pub time: Instant,
    pub modifiers: Modifiers,
}

impl KeyboardInput {
    /// Create a key press without modifiers.
    #[must_use]
    pub const fn new(code: KeyCode, time: Instant) -> Self {
        Self {
            code,
            time,
            modifiers: Modifiers::NONE,
        }
    }

    /// Set modifiers (builder pattern).
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

// ---------------------------------------------------------------------------
// InputData
// ---------------------------------------------------------------------------

/// Any input event the engine can route.
#[derive(Debug, Clone, PartialEq)]
pub enum InputData {
    Touch(MultiTouchInput),
    Mouse(MouseInput),
    Wheel(ScrollWheelInput),
    Pinch(PinchGestureInput),
    Keyboard(KeyboardInput),
}

impl InputData {
    /// Capture time.
    #[must_use]
    pub fn time(&self) -> Instant {
        match self {
            Self::Touch(t) => t.time,
            Self::Mouse(m) => m.time,
            Self::Wheel(w) => w.time,
            Self::Pinch(p) => p.time,
            Self::Keyboard(k) => k.time,
        }
    }

    /// Modifier state.
    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::Touch(t) => t.modifiers,
            Self::Mouse(m) => m.modifiers,
            Self::Wheel(w) => w.modifiers,
            Self::Pinch(p) => p.modifiers,
            Self::Keyboard(k) => k.modifiers,
        }
    }

    /// Point the event is hit-tested at. Keyboard events have none.
    #[must_use]
    pub fn hit_point(&self) -> Option<ScreenPoint> {
        match self {
            Self::Touch(t) => t.centroid(),
            Self::Mouse(m) => Some(m.point),
            Self::Wheel(w) => Some(w.origin),
            Self::Pinch(p) => Some(p.focus),
            Self::Keyboard(_) => None,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Touch(_) => "touch",
            Self::Mouse(_) => "mouse",
            Self::Wheel(_) => "wheel",
            Self::Pinch(_) => "pinch",
            Self::Keyboard(_) => "keyboard",
        }
    }
}

impl From<MultiTouchInput> for InputData {
    fn from(value: MultiTouchInput) -> Self {
        Self::Touch(value)
    }
}

impl From<MouseInput> for InputData {
    fn from(value: MouseInput) -> Self {
        Self::Mouse(value)
    }
}

impl From<ScrollWheelInput> for InputData {
    fn from(value: ScrollWheelInput) -> Self {
        Self::Wheel(value)
    }
}

impl From<PinchGestureInput> for InputData {
    fn from(value: PinchGestureInput) -> Self {
        Self::Pinch(value)
    }
}

impl From<KeyboardInput> for InputData {
    fn from(value: KeyboardInput) -> Self {
        Self::Keyboard(value)
    }
}

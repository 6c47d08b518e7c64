#![forbid(unsafe_code)]

//! Asynchronous pan/zoom engine public facade.
//!
//! This crate provides the stable surface area for embedders. It re-exports
//! the value types of `apz-core` and the engine of `apz-runtime`, and offers
//! a prelude for day-to-day usage.
//!
//! ```
//! use std::sync::Arc;
//! use apz::prelude::*;
//!
//! let manager = Arc::new(ApzTreeManager::new(
//!     LayersId(1),
//!     Arc::new(NoopController),
//!     ApzConfig::default(),
//! ));
//! let frame = manager.sampler().sample(apz::Instant::now());
//! assert!(frame.transforms.is_empty());
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use apz_core::event::{
    AllowedTouchBehavior, InputData, KeyCode, KeyboardInput, Modifiers, MouseButton, MouseInput,
    MouseKind, MultiTouchInput, PinchGestureInput, PinchKind, ScrollMode, ScrollWheelInput,
    TouchKind, WheelDeltaMode,
};
pub use apz_core::geometry::{
    Axis, CssPoint, CssRect, CssVector, LayerRect, LayerToScreenTransform, ScreenPoint,
    ScreenVector,
};
pub use apz_core::guid::{LayersId, NULL_SCROLL_ID, ScrollableLayerGuid, ViewId};

// --- Engine re-exports -----------------------------------------------------

pub use apz_runtime::{
    ApzConfig, ApzError, ApzSampler, ApzStateChange, ApzTestData, ApzTreeManager, AsyncTransform,
    BlockId, ConfigError, ContentController, EventStatus, FocusTarget, FrameMetrics,
    HitTestFlags, InputOutcome, NoopController, RebuildReport, RecordingController,
    RepaintRequest, SampledFrame, SceneError, SceneNode, SceneSnapshot, ScrollFrameDescriptor,
    TapKind, ThumbDescriptor, TouchAction, TreeManagerRegistry, ZoomConstraints,
};

/// Clock used for every engine timestamp.
pub use web_time::Instant;

// --- Errors ---------------------------------------------------------------

/// Top-level error type for embedders.
#[derive(Debug)]
pub enum Error {
    /// A content-facing call named something the engine does not know.
    Apz(ApzError),
    /// The configuration could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apz(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Apz(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<ApzError> for Error {
    fn from(err: ApzError) -> Self {
        Self::Apz(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Standard result type for engine APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude ----------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ApzConfig, ApzSampler, ApzTreeManager, ContentController, Error, EventStatus,
        FrameMetrics, InputData, Instant, LayersId, NoopController, Result, SampledFrame, SceneNode,
        SceneSnapshot, ScreenPoint, ScrollFrameDescriptor, ScrollableLayerGuid, ZoomConstraints,
    };

    pub use crate::{core, runtime};
}

pub use apz_core as core;
pub use apz_runtime as runtime;

#![forbid(unsafe_code)]

//! APZ Runtime
//!
//! The asynchronous pan/zoom engine: it decides which scroll frame an input
//! event targets, drives that frame's scroll and zoom independently of
//! content, and hands leftover scroll, fling and overscroll between nested
//! frames.
//!
//! # Key Components
//!
//! - [`ApzTreeManager`] - shared engine object; rebuild, input routing, content API
//! - [`ApzSampler`] - per-frame animation advance and transform sampling
//! - [`AsyncPanZoomController`] - one scroll frame's gesture state machine
//! - [`HitTestingTree`] - arena of scene nodes for hit testing
//! - [`InputQueue`] - gesture blocks awaiting content confirmation
//! - [`OverscrollHandoffChain`] - the order frames absorb a gesture's scroll
//! - [`ApzConfig`] - every tunable, loadable from JSON or TOML
//! - [`TreeManagerRegistry`] - broadcast to every tree manager of a process
//!
//! # Roles
//!
//! Three threads call into a tree manager: the updater (scene rebuilds), the
//! controller (input and content responses) and the sampler (one call per
//! composited frame). Their locks are taken in one global order, checked in
//! debug builds by [`lock_order`].

pub mod apzc;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod diagnostics_sink;
pub mod error;
pub mod focus_state;
pub mod frame_metrics;
pub mod handoff;
pub mod hit_testing_tree;
pub mod input_block;
pub mod input_queue;
pub mod lock_order;
pub mod registry;
pub mod sampler;
pub mod scene;
pub mod tree_manager;
pub mod zoom_constraints;

pub use apzc::{AsyncPanZoomController, EventStatus, PanZoomState};
pub use config::{ApzConfig, ConfigError};
pub use controller::{
    ApzStateChange, ContentController, ControllerEvent, NoopController, RecordingController,
    RepaintRequest, TapKind,
};
pub use diagnostics::ApzTestData;
pub use diagnostics_sink::DiagnosticsSink;
pub use error::{ApzError, SceneError};
pub use focus_state::{FocusState, FocusTarget, FocusTargetKind};
pub use frame_metrics::{AsyncTransform, FrameMetrics};
pub use handoff::{OverscrollHandoffChain, ScrollDispatchResult};
pub use hit_testing_tree::{HitTestFlags, HitTestResult, HitTestingTree};
pub use input_block::{BlockId, BlockKind, InputBlock};
pub use input_queue::{InputOutcome, InputQueue};
pub use registry::TreeManagerRegistry;
pub use sampler::{ApzSampler, SampledFrame};
pub use scene::{
    EventRegions, RebuildReport, SceneNode, SceneNodeKind, SceneSnapshot, ScrollFrameDescriptor,
    ThumbDescriptor, TouchAction,
};
pub use tree_manager::ApzTreeManager;
pub use zoom_constraints::ZoomConstraints;

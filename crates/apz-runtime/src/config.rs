#![forbid(unsafe_code)]

//! Policy-as-data configuration for the engine.
//!
//! Every tunable the engine reads lives in one [`ApzConfig`] that can be
//! built in code or loaded from JSON (always) or TOML (`config-file`
//! feature). The tree manager keeps it in an
//! [`ArcSwapStore`](apz_core::read_optimized::ArcSwapStore) so every role
//! reads it without locking.
//!
//! # Loading
//!
//! ```toml
//! # apz.toml
//! [input]
//! content_response_timeout_ms = 300
//!
//! [hit_test]
//! sibling_order = "first_wins"
//! edges = "inclusive"
//! ```
//!
//! ```rust,ignore
//! let config = ApzConfig::from_toml_file("apz.toml")?.validated()?;
//! ```
//!
//! # Defaults
//!
//! Defaults reproduce the engine constants, so `ApzConfig::default()` is the
//! behavior with no configuration at all.

#[cfg(feature = "config-file")]
use std::path::Path;
use std::time::Duration;

use apz_core::animation::fling::{DEFAULT_FRICTION, DEFAULT_STOP_THRESHOLD};
use apz_core::gesture::GestureConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::zoom_constraints::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};

// ---------------------------------------------------------------------------
// Top-level ApzConfig
// ---------------------------------------------------------------------------

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApzConfig {
    pub touch: TouchConfig,
    pub fling: FlingConfig,
    pub overscroll: OverscrollConfig,
    pub zoom: ZoomConfig,
    pub scroll: ScrollConfig,
    pub input: InputConfig,
    pub hit_test: HitTestPolicy,
    pub autoscroll: AutoscrollConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Axis locking applied when a pan starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisLockMode {
    /// Pan freely in both axes.
    Free,
    /// Lock to one axis when the initial motion is close to it.
    Standard,
}

/// Touch panning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    /// Screen pixels a touch must travel before it becomes a pan.
    pub touch_start_tolerance: f32,
    pub axis_lock: AxisLockMode,
    /// Motion within this many degrees of an axis locks the pan to it.
    pub axis_lock_angle_degrees: f32,
    /// Trailing window for velocity estimation.
    pub velocity_window_ms: u64,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            touch_start_tolerance: 8.0,
            axis_lock: AxisLockMode::Standard,
            axis_lock_angle_degrees: 30.0,
            velocity_window_ms: 50,
        }
    }
}

/// Fling parameters. Velocities are screen pixels per millisecond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlingConfig {
    pub min_velocity: f32,
    pub max_velocity: f32,
    /// Fraction of velocity lost per millisecond.
    pub friction: f32,
    pub stop_threshold: f32,
    /// Hand a fling that reaches an edge to the next chain member.
    pub handoff: bool,
}

impl Default for FlingConfig {
    fn default() -> Self {
        Self {
            min_velocity: 0.1,
            max_velocity: 8.0,
            friction: DEFAULT_FRICTION,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
            handoff: true,
        }
    }
}

/// Overscroll stretch and snap-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverscrollConfig {
    pub enabled: bool,
    /// Fraction of residual displacement that becomes stretch.
    pub stretch_factor: f32,
    /// Maximum stretch as a fraction of the composition length.
    pub max_fraction: f32,
    pub spring_stiffness: f32,
    pub spring_damping: f32,
}

impl Default for OverscrollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stretch_factor: 0.35,
            max_fraction: 0.5,
            spring_stiffness: 120.0,
            spring_damping: 22.0,
        }
    }
}

/// Zoom bounds used when content supplies no constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub default_min_zoom: f32,
    pub default_max_zoom: f32,
    pub animation_duration_ms: u64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            default_min_zoom: DEFAULT_MIN_ZOOM,
            default_max_zoom: DEFAULT_MAX_ZOOM,
            animation_duration_ms: 250,
        }
    }
}

/// Wheel and keyboard scrolling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// CSS pixels per wheel or arrow-key line.
    pub line_height: f32,
    /// Fraction of the viewport a page step scrolls.
    pub page_fraction: f32,
    pub smooth_scroll_duration_ms: u64,
    pub wheel_smooth_duration_ms: u64,
    /// Animate keyboard scrolls instead of jumping.
    pub smooth_keyboard: bool,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            line_height: 19.0,
            page_fraction: 0.8,
            smooth_scroll_duration_ms: 200,
            wheel_smooth_duration_ms: 150,
            smooth_keyboard: true,
        }
    }
}

/// Input queue and gesture timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// How long a block waits for content before it is force-confirmed.
    pub content_response_timeout_ms: u64,
    /// Wheel events further apart than this start a new transaction.
    pub wheel_transaction_timeout_ms: u64,
    pub double_tap_timeout_ms: u64,
    pub long_press_ms: u64,
    pub max_tap_ms: u64,
    pub tap_slop: f32,
    /// Route keys to the last touched scroll frame until content confirms focus.
    pub optimistic_focus: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            content_response_timeout_ms: 400,
            wheel_transaction_timeout_ms: 1500,
            double_tap_timeout_ms: 300,
            long_press_ms: 500,
            max_tap_ms: 400,
            tap_slop: 10.0,
            optimistic_focus: true,
        }
    }
}

/// Which sibling wins when overlapping siblings both contain the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingOrder {
    /// The last-rendered (topmost) sibling wins.
    LastWins,
    /// The first sibling wins.
    FirstWins,
}

/// Whether a point on a rectangle's far edge is inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    HalfOpen,
    Inclusive,
}

/// Hit-test tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitTestPolicy {
    pub sibling_order: SiblingOrder,
    pub edges: EdgePolicy,
}

impl Default for HitTestPolicy {
    fn default() -> Self {
        Self {
            sibling_order: SiblingOrder::LastWins,
            edges: EdgePolicy::HalfOpen,
        }
    }
}

/// Middle-click autoscroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscrollConfig {
    /// Screen pixels around the anchor that produce no motion.
    pub dead_zone: f32,
    /// Scroll speed (px/ms) per pixel of cursor distance beyond the dead zone.
    pub speed_per_pixel: f32,
    pub max_speed: f32,
}

impl Default for AutoscrollConfig {
    fn default() -> Self {
        Self {
            dead_zone: 10.0,
            speed_per_pixel: 0.01,
            max_speed: 5.0,
        }
    }
}

/// Test-data logging and the JSONL sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub test_logging: bool,
    /// Cap on hit-test and transform log entries.
    pub max_log_entries: usize,
    pub sink_enabled: bool,
    /// File for the JSONL sink; stdout when unset.
    pub sink_path: Option<String>,
    pub flush_on_write: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            test_logging: false,
            max_log_entries: 4096,
            sink_enabled: false,
            sink_path: None,
            flush_on_write: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading, validation, conversion
// ---------------------------------------------------------------------------

impl ApzConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(self.touch.touch_start_tolerance >= 0.0) {
            errors.push(format!(
                "touch.touch_start_tolerance must be >= 0, got {}",
                self.touch.touch_start_tolerance
            ));
        }
        if !(0.0..=45.0).contains(&self.touch.axis_lock_angle_degrees) {
            errors.push(format!(
                "touch.axis_lock_angle_degrees must be in [0, 45], got {}",
                self.touch.axis_lock_angle_degrees
            ));
        }
        if self.touch.velocity_window_ms == 0 {
            errors.push("touch.velocity_window_ms must be > 0".into());
        }

        if !(self.fling.friction > 0.0 && self.fling.friction < 1.0) {
            errors.push(format!(
                "fling.friction must be in (0, 1), got {}",
                self.fling.friction
            ));
        }
        if !(self.fling.min_velocity >= 0.0) || self.fling.min_velocity > self.fling.max_velocity {
            errors.push(format!(
                "fling.min_velocity must be in [0, max_velocity], got {}",
                self.fling.min_velocity
            ));
        }

        if !(0.0..=1.0).contains(&self.overscroll.stretch_factor) {
            errors.push(format!(
                "overscroll.stretch_factor must be in [0, 1], got {}",
                self.overscroll.stretch_factor
            ));
        }
        if !(self.overscroll.max_fraction > 0.0 && self.overscroll.max_fraction <= 1.0) {
            errors.push(format!(
                "overscroll.max_fraction must be in (0, 1], got {}",
                self.overscroll.max_fraction
            ));
        }
        if !(self.overscroll.spring_stiffness > 0.0) {
            errors.push("overscroll.spring_stiffness must be > 0".into());
        }

        if !(self.zoom.default_min_zoom > 0.0)
            || self.zoom.default_min_zoom > self.zoom.default_max_zoom
        {
            errors.push(format!(
                "zoom.default_min_zoom must be in (0, default_max_zoom], got {}",
                self.zoom.default_min_zoom
            ));
        }

        if !(self.scroll.line_height > 0.0) {
            errors.push("scroll.line_height must be > 0".into());
        }
        if !(self.scroll.page_fraction > 0.0 && self.scroll.page_fraction <= 1.0) {
            errors.push(format!(
                "scroll.page_fraction must be in (0, 1], got {}",
                self.scroll.page_fraction
            ));
        }

        if self.input.content_response_timeout_ms == 0 {
            errors.push("input.content_response_timeout_ms must be > 0".into());
        }

        if !(self.autoscroll.dead_zone >= 0.0) {
            errors.push("autoscroll.dead_zone must be >= 0".into());
        }
        if !(self.autoscroll.max_speed > 0.0) {
            errors.push("autoscroll.max_speed must be > 0".into());
        }

        if self.diagnostics.max_log_entries == 0 {
            errors.push("diagnostics.max_log_entries must be > 0".into());
        }

        errors
    }

    /// `self` if valid, otherwise every validation error.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Gesture listener thresholds.
    #[must_use]
    pub fn to_gesture_config(&self) -> GestureConfig {
        GestureConfig {
            double_tap_timeout: Duration::from_millis(self.input.double_tap_timeout_ms),
            long_press_threshold: Duration::from_millis(self.input.long_press_ms),
            max_tap_duration: Duration::from_millis(self.input.max_tap_ms),
            tap_slop: self.input.tap_slop,
            ..GestureConfig::default()
        }
    }
}

impl InputConfig {
    #[must_use]
    pub fn content_response_timeout(&self) -> Duration {
        Duration::from_millis(self.content_response_timeout_ms)
    }

    #[must_use]
    pub fn wheel_transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.wheel_transaction_timeout_ms)
    }
}

impl TouchConfig {
    #[must_use]
    pub fn velocity_window(&self) -> Duration {
        Duration::from_millis(self.velocity_window_ms)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config-file")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

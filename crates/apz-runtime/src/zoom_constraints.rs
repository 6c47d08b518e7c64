#![forbid(unsafe_code)]

//! Per-scroll-frame zoom limits supplied by content.
//!
//! Content (the viewport meta tag, typically) tells the engine how far a
//! frame may zoom. Updates are applied to a live APZC at once and cached so
//! an APZC created for the same guid later starts with them.

use ahash::AHashMap;
use apz_core::guid::ScrollableLayerGuid;
use serde::{Deserialize, Serialize};

/// Smallest zoom allowed when content says nothing.
pub const DEFAULT_MIN_ZOOM: f32 = 0.125;
/// Largest zoom allowed when content says nothing.
pub const DEFAULT_MAX_ZOOM: f32 = 8.0;

/// Zoom permissions and bounds for one scroll frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomConstraints {
    pub allow_zoom: bool,
    pub allow_double_tap_zoom: bool,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for ZoomConstraints {
    fn default() -> Self {
        Self {
            allow_zoom: true,
            allow_double_tap_zoom: true,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }
}

impl ZoomConstraints {
    /// Constraints that pin zoom to `zoom`.
    #[must_use]
    pub fn fixed(zoom: f32) -> Self {
        Self {
            allow_zoom: false,
            allow_double_tap_zoom: false,
            min_zoom: zoom,
            max_zoom: zoom,
        }
    }

    /// Builder: set the bounds.
    #[must_use]
    pub fn with_range(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Bounds are finite, positive and ordered.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_zoom.is_finite()
            && self.max_zoom.is_finite()
            && self.min_zoom > 0.0
            && self.min_zoom <= self.max_zoom
    }

    /// Clamp `zoom` into the bounds.
    #[inline]
    #[must_use]
    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

/// Cache of the constraints content has sent, by guid.
#[derive(Debug, Default)]
pub struct ZoomConstraintsStore {
    by_guid: AHashMap<ScrollableLayerGuid, ZoomConstraints>,
}

impl ZoomConstraintsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (`Some`) or forget (`None`) the constraints for `guid`.
    pub fn set(&mut self, guid: ScrollableLayerGuid, constraints: Option<ZoomConstraints>) {
        match constraints {
            Some(c) => {
                self.by_guid.insert(guid, c);
            }
            None => {
                self.by_guid.remove(&guid);
            }
        }
    }

    #[must_use]
    pub fn get(&self, guid: &ScrollableLayerGuid) -> Option<ZoomConstraints> {
        self.by_guid.get(guid).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_guid.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_guid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apz_core::guid::LayersId;

    #[test]
    fn default_range() {
        let c = ZoomConstraints::default();
        assert!(c.is_valid());
        assert_eq!(c.clamp(0.01), DEFAULT_MIN_ZOOM);
        assert_eq!(c.clamp(100.0), DEFAULT_MAX_ZOOM);
        assert_eq!(c.clamp(2.0), 2.0);
    }

    #[test]
    fn inverted_or_nan_ranges_are_invalid() {
        assert!(!ZoomConstraints::default().with_range(2.0, 1.0).is_valid());
        assert!(!ZoomConstraints::default().with_range(0.0, 1.0).is_valid());
        assert!(!ZoomConstraints::default().with_range(f32::NAN, 1.0).is_valid());
        assert!(ZoomConstraints::fixed(1.0).is_valid());
    }

    #[test]
    fn store_set_and_clear() {
        let guid = ScrollableLayerGuid::new(LayersId(1), 0, 3);
        let mut store = ZoomConstraintsStore::new();
        store.set(guid, Some(ZoomConstraints::fixed(1.0)));
        assert_eq!(store.get(&guid), Some(ZoomConstraints::fixed(1.0)));
        store.set(guid, None);
        assert!(store.get(&guid).is_none());
        assert!(store.is_empty());
    }
}

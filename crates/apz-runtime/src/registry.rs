#![forbid(unsafe_code)]

//! Process-wide operations over every tree manager.
//!
//! A compositor may run one [`ApzTreeManager`] per top-level window. The
//! [`TreeManagerRegistry`] is an explicit object the embedder owns; it keeps
//! weak handles, so registering never extends a manager's lifetime. Dead
//! handles are pruned lazily whenever the registry is walked.
//!
//! # Invariants
//!
//! 1. Broadcasts visit live managers in registration order.
//! 2. The registry lock is released before any manager is called, so the
//!    registry never participates in the engine's lock order.
//! 3. After [`TreeManagerRegistry::shutdown`] registration fails and the
//!    registry holds nothing.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use crate::error::ApzError;
use crate::tree_manager::ApzTreeManager;

#[derive(Debug, Default)]
struct RegistryInner {
    managers: Vec<Weak<ApzTreeManager>>,
    shut_down: bool,
}

#[derive(Debug, Default)]
pub struct TreeManagerRegistry {
    inner: Mutex<RegistryInner>,
}

impl TreeManagerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `manager`. Registering the same manager twice is a no-op.
    pub fn register(&self, manager: &Arc<ApzTreeManager>) -> Result<(), ApzError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.shut_down {
            return Err(ApzError::RegistryShutDown);
        }
        inner.managers.retain(|w| w.strong_count() > 0);
        let weak = Arc::downgrade(manager);
        if !inner.managers.iter().any(|w| w.ptr_eq(&weak)) {
            inner.managers.push(weak);
        }
        Ok(())
    }

    /// Remove `manager`. Returns whether it was registered.
    pub fn unregister(&self, manager: &Arc<ApzTreeManager>) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let weak = Arc::downgrade(manager);
        let found = inner.managers.iter().any(|w| w.ptr_eq(&weak));
        inner.managers.retain(|w| !w.ptr_eq(&weak) && w.strong_count() > 0);
        found
    }

    /// Live managers, pruning the dead.
    #[must_use]
    pub fn managers(&self) -> Vec<Arc<ApzTreeManager>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.managers.retain(|w| w.strong_count() > 0);
        inner.managers.iter().filter_map(Weak::upgrade).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.managers().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver pending repaints of every manager. Returns how many were sent.
    pub fn flush_repaints(&self) -> usize {
        self.managers().iter().map(|m| m.flush_repaints()).sum()
    }

    pub fn cancel_all_animations(&self) {
        for manager in self.managers() {
            manager.cancel_all_animations();
        }
    }

    pub fn clear_test_data(&self) {
        for manager in self.managers() {
            manager.clear_test_data();
        }
    }

    /// Stop every manager's animations, forget all managers and refuse new
    /// ones.
    pub fn shutdown(&self) {
        let managers = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.shut_down = true;
            std::mem::take(&mut inner.managers)
        };
        let live: Vec<_> = managers.iter().filter_map(Weak::upgrade).collect();
        debug!(target: "apz.registry", managers = live.len(), "registry shut down");
        for manager in live {
            manager.cancel_all_animations();
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shut_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApzConfig;
    use crate::controller::RecordingController;
    use crate::frame_metrics::FrameMetrics;
    use crate::scene::{SceneNode, SceneSnapshot, ScrollFrameDescriptor};
    use apz_core::guid::{LayersId, ScrollableLayerGuid};
    use euclid::{point2, rect};
    use web_time::Instant;

    fn manager(layers: u64) -> (Arc<ApzTreeManager>, Arc<RecordingController>) {
        let recorder = Arc::new(RecordingController::new());
        let tm = Arc::new(ApzTreeManager::new(LayersId(layers), recorder.clone(), ApzConfig::default()));
        let guid = ScrollableLayerGuid::new(LayersId(layers), 0, 1);
        tm.update_hit_testing_tree(&SceneSnapshot::new(LayersId(layers), 1).with_node(
            SceneNode::scroll_frame(
                0,
                ScrollFrameDescriptor::new(
                    guid,
                    FrameMetrics::new(rect(0.0, 0.0, 500.0, 2000.0), rect(0.0, 0.0, 500.0, 500.0)),
                ),
            ),
        ));
        (tm, recorder)
    }

    #[test]
    fn registration_is_weak_and_deduplicated() {
        let registry = TreeManagerRegistry::new();
        let (a, _) = manager(1);
        let (b, _) = manager(2);
        registry.register(&a).unwrap();
        registry.register(&a).unwrap();
        registry.register(&b).unwrap();
        assert_eq!(registry.len(), 2);
        drop(b);
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(&a));
        assert!(!registry.unregister(&a));
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcasts_reach_every_manager() {
        let registry = TreeManagerRegistry::new();
        let (a, _) = manager(1);
        let (b, _) = manager(2);
        registry.register(&a).unwrap();
        registry.register(&b).unwrap();
        let now = Instant::now();
        for tm in [&a, &b] {
            let guid = *tm.guids().iter().next().unwrap();
            tm.smooth_scroll_to(guid, point2(0.0, 100.0), now).unwrap();
            assert!(tm.apzc(&guid).unwrap().is_animating());
        }
        registry.cancel_all_animations();
        for tm in [&a, &b] {
            assert!(tm.guids().iter().all(|g| !tm.apzc(g).unwrap().is_animating()));
        }
        assert_eq!(registry.flush_repaints(), 0);
    }

    #[test]
    fn shutdown_refuses_registration() {
        let registry = TreeManagerRegistry::new();
        let (a, _) = manager(1);
        registry.register(&a).unwrap();
        registry.shutdown();
        assert!(registry.is_shut_down());
        assert!(registry.is_empty());
        assert_eq!(registry.register(&a), Err(ApzError::RegistryShutDown));
    }
}

#![forbid(unsafe_code)]

//! Wait-free snapshot store for read-mostly engine state.
//!
//! The engine's configuration is read on every input event and every
//! sampled frame, from the controller thread and the compositor thread, but
//! it changes only when the embedder pushes new preferences. [`ArcSwapStore`]
//! gives readers a consistent snapshot without taking any of the ranked
//! engine locks, so reading configuration can never participate in a lock
//! order inversion.
//!
//! # Constraints
//!
//! - Reads never block and never observe a torn value.
//! - A write allocates one `Arc`; readers holding an older snapshot keep it
//!   alive until they drop it.
//!
//! # Example
//!
//! ```
//! use apz_core::read_optimized::{ArcSwapStore, ReadOptimized};
//!
//! let store = ArcSwapStore::new(400u64);
//! let before = store.snapshot();
//! store.store(200);
//! assert_eq!(*before, 400);
//! assert_eq!(store.load(), 200);
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;

/// A concurrent store optimized for read-heavy access.
pub trait ReadOptimized<T: Clone + Send + Sync>: Send + Sync {
    /// Clone out the current value.
    fn load(&self) -> T;

    /// Atomically replace the value.
    fn store(&self, val: T);
}

/// Wait-free reads via [`arc_swap::ArcSwap`].
pub struct ArcSwapStore<T> {
    inner: ArcSwap<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for ArcSwapStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ArcSwapStore").field(&*self.inner.load()).finish()
    }
}

impl<T: Default> Default for ArcSwapStore<T> {
    fn default() -> Self {
        Self {
            inner: ArcSwap::from_pointee(T::default()),
        }
    }
}

impl<T: Clone + Send + Sync> ArcSwapStore<T> {
    /// Create a store holding `val`.
    pub fn new(val: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(val),
        }
    }

    /// Take an owned handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<T> {
        self.inner.load_full()
    }
}

impl<T: Clone + Send + Sync> ReadOptimized<T> for ArcSwapStore<T> {
    #[inline]
    fn load(&self) -> T {
        T::clone(&self.inner.load())
    }

    #[inline]
    fn store(&self, val: T) {
        self.inner.store(Arc::new(val));
    }
}

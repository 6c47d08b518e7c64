#![forbid(unsafe_code)]

//! Ranked mutexes enforcing the engine's global lock order.
//!
//! Every lock the engine owns has a [`LockRank`]. A thread may only acquire a
//! lock whose rank is strictly greater than every rank it already holds:
//!
//! ```text
//! InputQueue → Tree → Map → Apzc → TestData
//! ```
//!
//! Because the order is strict, a thread can never hold two locks of the same
//! rank; in particular two APZC locks are never held together.
//!
//! # Invariants
//!
//! 1. In debug builds an out-of-order acquisition panics *before* blocking on
//!    the mutex, so a violation is reported even when it would not deadlock
//!    on that run.
//! 2. Dropping a guard releases its rank regardless of drop order.
//! 3. A poisoned mutex is recovered; the data it protects is left as the
//!    panicking thread wrote it.
//!
//! Release builds compile the rank bookkeeping out and behave as plain
//! `std::sync::Mutex`.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Position of a lock in the global order. Lower ranks are taken first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockRank {
    InputQueue = 0,
    Tree = 1,
    Map = 2,
    Apzc = 3,
    TestData = 4,
}

impl fmt::Display for LockRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InputQueue => "input-queue",
            Self::Tree => "tree",
            Self::Map => "map",
            Self::Apzc => "apzc",
            Self::TestData => "test-data",
        };
        f.write_str(name)
    }
}

#[cfg(debug_assertions)]
mod held {
    use std::cell::RefCell;

    use super::LockRank;

    thread_local! {
        static HELD: RefCell<Vec<LockRank>> = const { RefCell::new(Vec::new()) };
    }

    pub(super) fn acquire(rank: LockRank) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(&highest) = held.iter().max() {
                assert!(
                    rank > highest,
                    "lock order violation: acquiring {rank} while holding {highest}"
                );
            }
            held.push(rank);
        });
    }

    pub(super) fn release(rank: LockRank) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|&r| r == rank) {
                held.remove(pos);
            }
        });
    }

    pub(super) fn snapshot() -> Vec<LockRank> {
        HELD.with(|held| held.borrow().clone())
    }
}

/// Ranks the current thread holds, lowest first. Always empty in release
/// builds.
#[must_use]
pub fn held_ranks() -> Vec<LockRank> {
    #[cfg(debug_assertions)]
    {
        let mut ranks = held::snapshot();
        ranks.sort();
        ranks
    }
    #[cfg(not(debug_assertions))]
    {
        Vec::new()
    }
}

/// A `Mutex` tagged with its place in the lock order.
pub struct RankedMutex<T> {
    rank: LockRank,
    inner: Mutex<T>,
}

impl<T> RankedMutex<T> {
    pub const fn new(rank: LockRank, value: T) -> Self {
        Self {
            rank,
            inner: Mutex::new(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn rank(&self) -> LockRank {
        self.rank
    }

    /// Acquire the lock, checking the order in debug builds.
    pub fn lock(&self) -> RankedGuard<'_, T> {
        #[cfg(debug_assertions)]
        held::acquire(self.rank);
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        RankedGuard {
            rank: self.rank,
            guard,
        }
    }

    /// Consume the mutex, returning the data.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for RankedMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankedMutex")
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`RankedMutex::lock`].
pub struct RankedGuard<'a, T> {
    rank: LockRank,
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for RankedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for RankedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for RankedGuard<'_, T> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        held::release(self.rank);
        #[cfg(not(debug_assertions))]
        let _ = self.rank;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ordered_acquisition_succeeds() {
        let tree = RankedMutex::new(LockRank::Tree, 1);
        let map = RankedMutex::new(LockRank::Map, 2);
        let apzc = RankedMutex::new(LockRank::Apzc, 3);
        let t = tree.lock();
        let m = map.lock();
        let a = apzc.lock();
        assert_eq!(*t + *m + *a, 6);
        #[cfg(debug_assertions)]
        assert_eq!(
            held_ranks(),
            vec![LockRank::Tree, LockRank::Map, LockRank::Apzc]
        );
    }

    #[test]
    fn guards_release_in_any_order() {
        let tree = RankedMutex::new(LockRank::Tree, ());
        let map = RankedMutex::new(LockRank::Map, ());
        let t = tree.lock();
        let m = map.lock();
        drop(t);
        drop(m);
        assert!(held_ranks().is_empty());
        let _t = tree.lock();
    }

    #[test]
    fn sequential_same_rank_is_allowed() {
        let a = RankedMutex::new(LockRank::Apzc, 0);
        let b = RankedMutex::new(LockRank::Apzc, 0);
        *a.lock() += 1;
        *b.lock() += 1;
        let first = *a.lock();
        let second = *b.lock();
        assert_eq!(first + second, 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "lock order violation")]
    fn reverse_acquisition_panics() {
        let tree = RankedMutex::new(LockRank::Tree, ());
        let map = RankedMutex::new(LockRank::Map, ());
        let _m = map.lock();
        let _t = tree.lock();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "lock order violation")]
    fn two_apzc_locks_panic() {
        let a = RankedMutex::new(LockRank::Apzc, ());
        let b = RankedMutex::new(LockRank::Apzc, ());
        let _a = a.lock();
        let _b = b.lock();
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let m = Arc::new(RankedMutex::new(LockRank::TestData, 5));
        let m2 = Arc::clone(&m);
        let _ = thread::spawn(move || {
            let _g = m2.lock();
            panic!("poison");
        })
        .join();
        assert_eq!(*m.lock(), 5);
    }

    #[test]
    fn rank_order_matches_documented_order() {
        assert!(LockRank::InputQueue < LockRank::Tree);
        assert!(LockRank::Tree < LockRank::Map);
        assert!(LockRank::Map < LockRank::Apzc);
        assert!(LockRank::Apzc < LockRank::TestData);
        assert_eq!(LockRank::Apzc.to_string(), "apzc");
    }
}

//! Mutex and condition variable.
//!
//! Thin wrappers over `parking_lot` that add the binding rule the rest of
//! the library relies on: a [`CondVar`] belongs to exactly one [`Mutex`]
//! for its whole lifetime, and waiting with a guard from any other mutex is
//! a programming error that panics.
//!
//! Deadlines are absolute [`Time`] values in microseconds. A deadline that
//! has already passed never blocks.
//!
//! ```
//! use spmq_core::sync::{CondVar, Mutex};
//!
//! let mtx = Mutex::new(0u32);
//! let cv = CondVar::new(&mtx);
//!
//! let mut guard = mtx.lock();
//! *guard += 1;
//! cv.wake_all();
//! ```

use crate::clock::{self, Time};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_MUTEX_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusive lock protecting a value of type `T`.
///
/// Not re-entrant: locking twice from the same thread deadlocks.
pub struct Mutex<T> {
    id: u64,
    inner: parking_lot::Mutex<T>,
}

/// RAII guard returned by [`Mutex::lock`]; releases the lock on drop.
pub struct MutexGuard<'a, T> {
    owner: u64,
    inner: parking_lot::MutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Create a new unlocked mutex.
    pub fn new(value: T) -> Self {
        Self {
            id: NEXT_MUTEX_ID.fetch_add(1, Ordering::Relaxed),
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Block until the lock is acquired.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        MutexGuard {
            owner: self.id,
            inner: self.inner.lock(),
        }
    }

    /// Acquire the lock only if it is free.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock().map(|inner| MutexGuard {
            owner: self.id,
            inner,
        })
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// Outcome of a deadline-bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Woken by [`CondVar::wake_all`] / [`CondVar::wake_one`] (or spuriously).
    Woken,
    /// The deadline passed first.
    TimedOut,
}

impl WaitStatus {
    #[must_use]
    pub const fn timed_out(self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Condition variable bound to a single [`Mutex`].
///
/// Spurious wakeups are permitted; callers re-check their predicate in a loop.
pub struct CondVar {
    mutex: u64,
    inner: parking_lot::Condvar,
}

impl CondVar {
    /// Bind a new condition variable to `mutex`.
    pub fn new<T>(mutex: &Mutex<T>) -> Self {
        Self {
            mutex: mutex.id,
            inner: parking_lot::Condvar::new(),
        }
    }

    #[inline]
    fn check_owner<T>(&self, guard: &MutexGuard<'_, T>) {
        assert_eq!(
            guard.owner, self.mutex,
            "condition variable waited on with a guard from a different mutex"
        );
    }

    /// Release the mutex, sleep until woken, reacquire.
    pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
        self.check_owner(guard);
        self.inner.wait(&mut guard.inner);
    }

    /// As [`wait`](Self::wait), but gives up at `deadline`.
    ///
    /// A deadline at or before the current time returns
    /// [`WaitStatus::TimedOut`] without sleeping.
    pub fn wait_until<T>(&self, guard: &mut MutexGuard<'_, T>, deadline: Time) -> WaitStatus {
        self.check_owner(guard);
        let now = clock::now();
        if deadline <= now {
            return WaitStatus::TimedOut;
        }
        let result = self
            .inner
            .wait_for(&mut guard.inner, Duration::from_micros(deadline - now));
        if result.timed_out() {
            WaitStatus::TimedOut
        } else {
            WaitStatus::Woken
        }
    }

    /// Wake every waiter. No ordering guarantee.
    pub fn wake_all(&self) {
        self.inner.notify_all();
    }

    pub fn wake_one(&self) {
        self.inner.notify_one();
    }
}

impl fmt::Debug for CondVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CondVar").field("mutex", &self.mutex).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lock_unlock() {
        let mtx = Mutex::new(Vec::new());
        mtx.lock().push(1);
        mtx.lock().push(2);
        assert_eq!(*mtx.lock(), vec![1, 2]);
        assert_eq!(mtx.into_inner(), vec![1, 2]);
    }

    #[test]
    fn test_try_lock_contended() {
        let mtx = Mutex::new(());
        let _held = mtx.lock();
        assert!(mtx.try_lock().is_none());
    }

    #[test]
    fn test_wait_until_past_deadline() {
        let mtx = Mutex::new(());
        let cv = CondVar::new(&mtx);
        let mut guard = mtx.lock();

        let started = std::time::Instant::now();
        assert_eq!(cv.wait_until(&mut guard, 0), WaitStatus::TimedOut);
        assert_eq!(cv.wait_until(&mut guard, clock::now()), WaitStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_wait_until_expires() {
        let mtx = Mutex::new(());
        let cv = CondVar::new(&mtx);
        let mut guard = mtx.lock();

        let deadline = clock::now() + 20_000;
        // Nobody wakes us, so only spurious wakeups can end a wait early.
        while !cv.wait_until(&mut guard, deadline).timed_out() {}
        assert!(clock::now() >= deadline);
    }

    #[test]
    fn test_wake_all_releases_waiters() {
        let shared = Arc::new((Mutex::new(false), Mutex::new(0usize)));
        let cv = Arc::new(CondVar::new(&shared.0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let shared = Arc::clone(&shared);
            let cv = Arc::clone(&cv);
            handles.push(std::thread::spawn(move || {
                let mut ready = shared.0.lock();
                while !*ready {
                    cv.wait(&mut ready);
                }
                *shared.1.lock() += 1;
            }));
        }

        std::thread::sleep(Duration::from_millis(20));
        *shared.0.lock() = true;
        cv.wake_all();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*shared.1.lock(), 4);
    }

    #[test]
    #[should_panic(expected = "different mutex")]
    fn test_foreign_mutex_panics() {
        let a = Mutex::new(());
        let b = Mutex::new(());
        let cv = CondVar::new(&a);
        let mut guard = b.lock();
        cv.wait(&mut guard);
    }
}

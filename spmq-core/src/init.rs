//! One-time initialization gate.
//!
//! The gate moves `Uninit -> Running -> Done`. Exactly one caller wins the
//! race into `Running` and executes the helper; everyone else sleeps on a
//! condition variable until the winner publishes the outcome. `Done` is
//! permanent for the life of the gate.
//!
//! If the helper fails (or panics) the gate drops back to `Uninit` and the
//! next caller retries.
//!
//! The gate is built from `parking_lot` primitives directly because it sits
//! underneath [`crate::sync`] and must be usable in a `static`.

use crate::error::Result;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

const UNINIT: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

pub struct InitGate {
    state: AtomicU8,
    lock: parking_lot::Mutex<()>,
    published: parking_lot::Condvar,
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            lock: parking_lot::const_mutex(()),
            published: parking_lot::Condvar::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Run `helper` unless it already completed successfully on this gate.
    ///
    /// Returns only after the winning execution finished. Losers of the race
    /// observe the winner's success as `Ok(())`; if the winner failed they
    /// retry the helper themselves.
    pub fn call<F>(&self, helper: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        if self.is_initialized() {
            return Ok(());
        }

        let mut helper = Some(helper);
        loop {
            match self
                .state
                .compare_exchange(UNINIT, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let publish = Publish::new(self);
                    let Some(helper) = helper.take() else {
                        unreachable!("helper is consumed only by the winning branch");
                    };
                    let result = helper();
                    publish.finish(if result.is_ok() { DONE } else { UNINIT });
                    return result;
                }
                Err(DONE) => return Ok(()),
                Err(_) => {
                    let mut guard = self.lock.lock();
                    while self.state.load(Ordering::Acquire) == RUNNING {
                        self.published.wait(&mut guard);
                    }
                }
            }
        }
    }

    fn publish(&self, state: u8) {
        let _guard = self.lock.lock();
        self.state.store(state, Ordering::Release);
        self.published.notify_all();
    }
}

/// Publishes the winner's outcome even if the helper unwinds.
struct Publish<'a> {
    gate: &'a InitGate,
    state: u8,
}

impl<'a> Publish<'a> {
    fn new(gate: &'a InitGate) -> Self {
        Self { gate, state: UNINIT }
    }

    fn finish(mut self, state: u8) {
        self.state = state;
    }
}

impl Drop for Publish<'_> {
    fn drop(&mut self) {
        self.gate.publish(self.state);
    }
}

static PROCESS: InitGate = InitGate::new();

/// Run `helper` exactly once for the whole process.
///
/// All concurrent callers block until that single execution completes.
/// Teardown is not required: the initialized state is permanent.
pub fn process_init<F>(helper: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    PROCESS.call(helper)
}

/// Initialize the platform layer (clock epoch) once per process.
pub(crate) fn platform_init() -> Result<()> {
    process_init(|| {
        let _ = crate::clock::now();
        debug!("spmq platform initialized");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    #[test]
    fn test_runs_once_across_threads() {
        const THREADS: usize = 16;
        let gate = Arc::new(InitGate::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let runs = Arc::clone(&runs);
                let finished = Arc::clone(&finished);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    gate.call(|| {
                        std::thread::sleep(Duration::from_millis(20));
                        runs.fetch_add(1, Ordering::SeqCst);
                        finished.store(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap();
                    // Every caller returns only after the helper completed.
                    assert_eq!(finished.load(Ordering::SeqCst), 1);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(gate.is_initialized());
    }

    #[test]
    fn test_failed_helper_is_retried() {
        let gate = InitGate::new();
        assert_eq!(gate.call(|| Err(Error::NoMemory)), Err(Error::NoMemory));
        assert!(!gate.is_initialized());

        let mut ran = false;
        gate.call(|| {
            ran = true;
            Ok(())
        })
        .unwrap();
        assert!(ran);

        // Done is permanent.
        gate.call(|| panic!("must not run again")).unwrap();
    }

    #[test]
    fn test_panicking_helper_resets_gate() {
        let gate = InitGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            gate.call(|| panic!("helper exploded"))
        }));
        assert!(result.is_err());
        assert!(!gate.is_initialized());
        gate.call(|| Ok(())).unwrap();
        assert!(gate.is_initialized());
    }
}

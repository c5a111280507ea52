//! OS thread wrapper.
//!
//! A [`Thread`] runs one entry function to completion. It is joined exactly
//! once: either explicitly through [`Thread::join`] or implicitly on drop.
//! A failed join is a violated platform contract and is not recoverable.

use crate::error::{Error, Result};
use std::thread::JoinHandle;
use tracing::{debug, error};

#[derive(Debug)]
pub struct Thread {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl Thread {
    /// Spawn a thread running `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMemory`] if the OS refuses to create the thread.
    /// The host rarely says why, so this is a best guess.
    pub fn spawn<F>(entry: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn_named("spmq-worker", entry)
    }

    /// Spawn a thread with an explicit name (visible in debuggers and panics).
    pub fn spawn_named<F>(name: impl Into<String>, entry: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(entry)
            .map_err(|e| {
                error!(thread = %name, error = %e, "thread creation failed");
                Error::NoMemory
            })?;
        debug!(thread = %name, "thread spawned");
        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the entry function has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the entry function returns.
    ///
    /// # Panics
    ///
    /// Re-raises the panic if the entry function panicked.
    pub fn join(mut self) {
        self.reap();
    }

    fn reap(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(payload) = handle.join() {
            error!(thread = %self.name, "waiting for thread failed");
            if !std::thread::panicking() {
                std::panic::resume_unwind(payload);
            }
        }
        debug!(thread = %self.name, "thread joined");
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        self.reap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_spawn_and_join() {
        let hits = Arc::new(AtomicUsize::new(0));
        let arg = Arc::clone(&hits);
        let thr = Thread::spawn(move || {
            arg.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thr.join();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_joins() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let arg = Arc::clone(&hits);
            let _thr = Thread::spawn_named("drop-join", move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                arg.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "entry failed")]
    fn test_join_propagates_panic() {
        let thr = Thread::spawn(|| panic!("entry failed")).unwrap();
        thr.join();
    }
}

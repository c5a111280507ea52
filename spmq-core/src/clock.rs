//! Monotonic clock in microseconds.
//!
//! All deadlines in spmq are absolute [`Time`] values measured from a
//! process-wide epoch captured the first time the clock is read.

use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

/// Absolute monotonic timestamp in microseconds.
pub type Time = u64;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Current monotonic time in microseconds.
#[must_use]
pub fn now() -> Time {
    EPOCH.elapsed().as_micros() as Time
}

/// Absolute deadline `timeout` from now, saturating at `Time::MAX`.
#[must_use]
pub fn deadline_after(timeout: Duration) -> Time {
    let micros = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
    now().saturating_add(micros)
}

/// Time left until `deadline`, or `Duration::ZERO` if it already passed.
#[must_use]
pub fn remaining(deadline: Time) -> Duration {
    Duration::from_micros(deadline.saturating_sub(now()))
}

// clock.rs - Monotonic wall-clock sources
//
// Controllers read ticks through this seam so tests can drive time by hand.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Microseconds per second; tick values are microseconds.
pub const TICKS_PER_SECOND: i64 = 1_000_000;

/// A monotonic tick source.
pub trait WallClock: Send {
    /// Monotonic ticks in microseconds since an arbitrary origin.
    fn ticks(&self) -> i64;
}

/// Real monotonic clock backed by `Instant`.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for MonotonicClock {
    fn ticks(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }
}

/// Hand-driven clock for tests. Clones share the same tick counter, so a
/// test can keep one handle while the controller owns the other.
#[derive(Clone)]
pub struct ManualClock {
    ticks: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            ticks: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn advance_micros(&self, micros: i64) {
        self.ticks.fetch_add(micros, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, seconds: f64) {
        self.advance_micros((seconds * TICKS_PER_SECOND as f64) as i64);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for ManualClock {
    fn ticks(&self) -> i64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_across_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance_secs(1.5);
        assert_eq!(clock.ticks(), 1_500_000);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.ticks();
        let b = clock.ticks();
        assert!(b >= a);
    }
}

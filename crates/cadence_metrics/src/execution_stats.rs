//! Per-module execution statistics
//!
//! The module host records one `ExecutionStats` per registered module.
//! `snapshot()` is a pure copy; counters only change through `record_*`
//! calls or the explicit `reset()`.

use super::ring_buffer::RingBuffer;
use std::time::Duration;

/// Rolling window used for the average runtime.
const RUNTIME_WINDOW: usize = 32;

/// Point-in-time copy of a module's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Completed ticks.
    pub runs: u64,
    /// Ticks that returned an error or panicked.
    pub faults: u64,
    /// Ticks abandoned past their deadline.
    pub timeouts: u64,
    /// Dispatches suppressed by an open circuit breaker.
    pub suppressed: u64,
    pub last_runtime: Duration,
    pub total_runtime: Duration,
    pub average_runtime: Duration,
}

pub struct ExecutionStats {
    runs: u64,
    faults: u64,
    timeouts: u64,
    suppressed: u64,
    last_runtime: Duration,
    total_runtime: Duration,
    window: RingBuffer<Duration>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self {
            runs: 0,
            faults: 0,
            timeouts: 0,
            suppressed: 0,
            last_runtime: Duration::ZERO,
            total_runtime: Duration::ZERO,
            window: RingBuffer::new(RUNTIME_WINDOW),
        }
    }

    pub fn record_run(&mut self, runtime: Duration) {
        self.runs += 1;
        self.last_runtime = runtime;
        self.total_runtime += runtime;
        self.window.push(runtime);
    }

    pub fn record_fault(&mut self) {
        self.faults += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn record_suppressed(&mut self) {
        self.suppressed += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            runs: self.runs,
            faults: self.faults,
            timeouts: self.timeouts,
            suppressed: self.suppressed,
            last_runtime: self.last_runtime,
            total_runtime: self.total_runtime,
            average_runtime: self.window.average(),
        }
    }

    /// Zero every counter. Reading a snapshot never does this.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_does_not_reset() {
        let mut stats = ExecutionStats::new();
        stats.record_run(Duration::from_millis(4));
        stats.record_run(Duration::from_millis(8));
        stats.record_fault();

        let first = stats.snapshot();
        let second = stats.snapshot();
        assert_eq!(first, second);
        assert_eq!(first.runs, 2);
        assert_eq!(first.faults, 1);
        assert_eq!(first.total_runtime, Duration::from_millis(12));
        assert_eq!(first.average_runtime, Duration::from_millis(6));
    }

    #[test]
    fn reset_is_explicit() {
        let mut stats = ExecutionStats::new();
        stats.record_timeout();
        stats.record_suppressed();
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}

//! Cadence Metrics - performance tracking utilities
//!
//! Frame timing, rolling sample windows, and per-module execution
//! statistics for the module host. Instrumentation vanishes in production
//! builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use cadence_metrics::FrameTimer;
//!
//! let mut timer = FrameTimer::new(60); // Track last 60 frames
//! timer.begin();
//! // ... run the frame ...
//! timer.end();
//! println!("FPS: {:.1}", timer.fps());
//! ```

#[cfg(feature = "metrics")]
mod execution_stats;
#[cfg(feature = "metrics")]
mod frame_timer;
#[cfg(feature = "metrics")]
mod ring_buffer;

#[cfg(feature = "metrics")]
pub use execution_stats::{ExecutionStats, StatsSnapshot};
#[cfg(feature = "metrics")]
pub use frame_timer::FrameTimer;
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
pub struct FrameTimer;

#[cfg(not(feature = "metrics"))]
impl FrameTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn fps(&self) -> f64 { 0.0 }
    pub fn frame_time_ms(&self) -> f64 { 0.0 }
    pub fn last_frame_ms(&self) -> f64 { 0.0 }
    pub fn frame_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
}

#[cfg(not(feature = "metrics"))]
pub struct RingBuffer<T>(std::marker::PhantomData<T>);

#[cfg(not(feature = "metrics"))]
impl<T> RingBuffer<T> {
    pub fn new(_capacity: usize) -> Self { Self(std::marker::PhantomData) }
    pub fn push(&mut self, _value: T) {}
    pub fn len(&self) -> usize { 0 }
    pub fn is_empty(&self) -> bool { true }
    pub fn clear(&mut self) {}
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub runs: u64,
    pub faults: u64,
    pub timeouts: u64,
    pub suppressed: u64,
    pub last_runtime: std::time::Duration,
    pub total_runtime: std::time::Duration,
    pub average_runtime: std::time::Duration,
}

#[cfg(not(feature = "metrics"))]
pub struct ExecutionStats;

#[cfg(not(feature = "metrics"))]
impl ExecutionStats {
    pub fn new() -> Self { Self }
    pub fn record_run(&mut self, _runtime: std::time::Duration) {}
    pub fn record_fault(&mut self) {}
    pub fn record_timeout(&mut self) {}
    pub fn record_suppressed(&mut self) {}
    pub fn snapshot(&self) -> StatsSnapshot { StatsSnapshot::default() }
    pub fn reset(&mut self) {}
}

#[cfg(not(feature = "metrics"))]
impl Default for ExecutionStats {
    fn default() -> Self { Self::new() }
}

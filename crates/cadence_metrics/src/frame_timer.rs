//! Frame timing over a rolling window

use super::ring_buffer::RingBuffer;
use std::time::{Duration, Instant};

/// Measures frame durations between `begin` and `end` calls and keeps a
/// rolling window for averages. An `end` without a matching `begin` is
/// ignored.
pub struct FrameTimer {
    frame_start: Option<Instant>,
    frame_times: RingBuffer<Duration>,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frame_start: None,
            frame_times: RingBuffer::new(capacity),
        }
    }

    pub fn begin(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    pub fn end(&mut self) {
        if let Some(start) = self.frame_start.take() {
            self.frame_times.push(start.elapsed());
        }
    }

    pub fn fps(&self) -> f64 {
        let avg = self.frame_times.average().as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    /// Rolling average frame time in milliseconds.
    pub fn frame_time_ms(&self) -> f64 {
        self.frame_times.average().as_secs_f64() * 1000.0
    }

    /// Most recent completed frame, milliseconds.
    pub fn last_frame_ms(&self) -> f64 {
        self.frame_times
            .latest()
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    /// (min, max) over the window, milliseconds.
    pub fn frame_time_range_ms(&self) -> (f64, f64) {
        let (min, max) = self.frame_times.min_max();
        (min.as_secs_f64() * 1000.0, max.as_secs_f64() * 1000.0)
    }
}

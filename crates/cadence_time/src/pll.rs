// pll.rs - Continuous slave clock with a software PLL
//
// The slave keeps a virtual wall clock driven by its local monotonic clock.
// Master pulses produce clock-error samples; a median filter rejects
// transport jitter and a P-controller slews the virtual clock toward the
// master at a bounded rate. Errors past the snap threshold jump the virtual
// clock in one step instead of slewing for minutes.

use crate::bus::{NodeId, SyncBus};
use crate::clock::{WallClock, TICKS_PER_SECOND};
use crate::config::TimeConfig;
use crate::sample::{TimeSample, TimeState};
use std::sync::Arc;

/// Median filter over clock-error samples, in ticks.
struct MedianFilter {
    window: usize,
    samples: Vec<f64>,
    head: usize,
}

impl MedianFilter {
    fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: Vec::new(),
            head: 0,
        }
    }

    fn push(&mut self, sample: f64) {
        if self.samples.len() < self.window {
            self.samples.push(sample);
        } else {
            self.samples[self.head] = sample;
        }
        self.head = (self.head + 1) % self.window;
    }

    fn median(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Some(sorted[sorted.len() / 2])
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.head = 0;
    }
}

pub struct PllSlaveClock {
    clock: Box<dyn WallClock>,
    bus: Arc<SyncBus>,
    node: NodeId,
    gain: f64,
    max_slew: f64,
    snap_threshold_ticks: f64,
    average_latency_ticks: i64,
    filter: MedianFilter,
    last_ticks: i64,
    /// Virtual wall clock, in ticks (fractional to keep slew residue).
    virtual_ticks: f64,
    total_time: f64,
    frame_number: i64,
    time_scale: f64,
    hard_snaps: u64,
}

impl PllSlaveClock {
    pub fn new(
        clock: Box<dyn WallClock>,
        bus: Arc<SyncBus>,
        node: NodeId,
        config: &TimeConfig,
    ) -> Self {
        bus.join(node);
        let last_ticks = clock.ticks();
        Self {
            clock,
            bus,
            node,
            gain: config.pll_gain,
            max_slew: config.max_slew as f64,
            snap_threshold_ticks: config.snap_threshold_ms * 1000.0,
            average_latency_ticks: config.average_latency_ticks,
            filter: MedianFilter::new(config.jitter_window as usize),
            last_ticks,
            virtual_ticks: last_ticks as f64,
            total_time: 0.0,
            frame_number: 0,
            time_scale: 1.0,
            hard_snaps: 0,
        }
    }

    pub fn update(&mut self) -> TimeSample {
        let now = self.clock.ticks();
        let raw_dt_ticks = (now - self.last_ticks) as f64;
        self.last_ticks = now;

        for pulse in self.bus.drain_pulses(self.node) {
            let target = (pulse.master_wall_ticks + self.average_latency_ticks) as f64;
            self.filter.push(target - self.virtual_ticks);
            self.time_scale = pulse.time_scale as f64;
        }

        if let Some(error) = self.filter.median() {
            if error.abs() > self.snap_threshold_ticks {
                // Hard snap: the jump lands in total_time, never in dt.
                self.virtual_ticks += error;
                self.total_time += error / TICKS_PER_SECOND as f64 * self.time_scale;
                self.filter.reset();
                self.hard_snaps += 1;
                tracing::warn!(
                    magnitude_ms = error / 1000.0,
                    "clock error past snap threshold; jumping virtual clock"
                );
            }
        }

        let correction = self
            .filter
            .median()
            .map(|error| {
                (error / TICKS_PER_SECOND as f64 * self.gain).clamp(-self.max_slew, self.max_slew)
            })
            .unwrap_or(0.0);

        let virtual_delta = raw_dt_ticks * (1.0 + correction);
        self.virtual_ticks += virtual_delta;

        let unscaled_dt = virtual_delta / TICKS_PER_SECOND as f64;
        let dt = unscaled_dt * self.time_scale;
        self.total_time += dt;
        self.frame_number += 1;

        TimeSample {
            dt,
            unscaled_dt,
            total_time: self.total_time,
            frame_number: self.frame_number,
            time_scale: self.time_scale,
        }
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale;
    }

    /// Filtered clock error in milliseconds, if any pulses arrived.
    pub fn filtered_error_ms(&self) -> Option<f64> {
        self.filter.median().map(|e| e / 1000.0)
    }

    pub fn hard_snap_count(&self) -> u64 {
        self.hard_snaps
    }

    pub fn state(&self) -> TimeState {
        TimeState {
            total_time: self.total_time,
            frame_number: self.frame_number,
            time_scale: self.time_scale,
        }
    }

    pub fn seed_state(&mut self, state: TimeState) {
        self.total_time = state.total_time;
        self.frame_number = state.frame_number;
        self.time_scale = state.time_scale;
        self.last_ticks = self.clock.ticks();
        self.virtual_ticks = self.last_ticks as f64;
        self.filter.reset();
    }
}

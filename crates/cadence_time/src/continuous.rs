// continuous.rs - Wall-clock time, standalone or master role
//
// Reads the monotonic clock and scales elapsed time. In the master role it
// broadcasts a TimePulse once a second (and immediately on a scale change)
// so PLL slaves can track this node's wall clock.

use crate::bus::{NodeId, SyncBus};
use crate::clock::{WallClock, TICKS_PER_SECOND};
use crate::sample::{TimeSample, TimeState};
use crate::wire::TimePulse;
use std::sync::Arc;

/// Interval between master pulses, in ticks.
const PULSE_INTERVAL_TICKS: i64 = TICKS_PER_SECOND;

struct MasterRole {
    bus: Arc<SyncBus>,
    node: NodeId,
    sequence_id: i64,
    last_pulse_ticks: i64,
}

pub struct ContinuousClock {
    clock: Box<dyn WallClock>,
    last_ticks: i64,
    total_time: f64,
    frame_number: i64,
    time_scale: f64,
    master: Option<MasterRole>,
}

impl ContinuousClock {
    pub fn standalone(clock: Box<dyn WallClock>) -> Self {
        let last_ticks = clock.ticks();
        Self {
            clock,
            last_ticks,
            total_time: 0.0,
            frame_number: 0,
            time_scale: 1.0,
            master: None,
        }
    }

    /// Master flavor: additionally publishes pulses on `bus` as `node`.
    pub fn master(clock: Box<dyn WallClock>, bus: Arc<SyncBus>, node: NodeId) -> Self {
        bus.join(node);
        let last_ticks = clock.ticks();
        Self {
            clock,
            last_ticks,
            total_time: 0.0,
            frame_number: 0,
            time_scale: 1.0,
            master: Some(MasterRole {
                bus,
                node,
                sequence_id: 0,
                // Force a pulse on the first update.
                last_pulse_ticks: last_ticks - PULSE_INTERVAL_TICKS,
            }),
        }
    }

    pub fn update(&mut self) -> TimeSample {
        let now = self.clock.ticks();
        let raw_dt = (now - self.last_ticks) as f64 / TICKS_PER_SECOND as f64;
        self.last_ticks = now;

        let dt = raw_dt * self.time_scale;
        self.total_time += dt;
        self.frame_number += 1;

        if let Some(master) = &mut self.master {
            if now - master.last_pulse_ticks >= PULSE_INTERVAL_TICKS {
                Self::pulse(master, now, self.total_time, self.time_scale);
            }
        }

        TimeSample {
            dt,
            unscaled_dt: raw_dt,
            total_time: self.total_time,
            frame_number: self.frame_number,
            time_scale: self.time_scale,
        }
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale;
        // Slaves must learn a scale change right away, not at the next 1 Hz
        // pulse.
        if let Some(master) = &mut self.master {
            let now = self.clock.ticks();
            Self::pulse(master, now, self.total_time, self.time_scale);
        }
    }

    fn pulse(master: &mut MasterRole, now: i64, total_time: f64, time_scale: f64) {
        master.sequence_id += 1;
        master.bus.broadcast_pulse(
            master.node,
            TimePulse {
                master_wall_ticks: now,
                sim_time_snapshot: total_time,
                time_scale: time_scale as f32,
                sequence_id: master.sequence_id,
            },
        );
        master.last_pulse_ticks = now;
    }

    pub fn state(&self) -> TimeState {
        TimeState {
            total_time: self.total_time,
            frame_number: self.frame_number,
            time_scale: self.time_scale,
        }
    }

    /// Seed from a snapshot and reset the last-tick marker to now, so time
    /// accumulated before the swap is not consumed as a giant first delta.
    pub fn seed_state(&mut self, state: TimeState) {
        self.total_time = state.total_time;
        self.frame_number = state.frame_number;
        self.time_scale = state.time_scale;
        self.last_ticks = self.clock.ticks();
    }
}

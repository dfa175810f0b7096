// controller.rs - The closed controller family and runtime mode switching
//
// Controllers are a closed set of variants; swapping preserves
// (total_time, frame_number) bit-for-bit through a TimeState snapshot.
// The coordinator drives the pause barrier: the master announces a
// SwitchTimeMode with a barrier frame a few frames ahead, and every node
// swaps controllers the moment its local frame first reaches the barrier.

use crate::bus::{NodeId, SyncBus};
use crate::clock::WallClock;
use crate::config::TimeConfig;
use crate::continuous::ContinuousClock;
use crate::error::TimeError;
use crate::lockstep::{LockstepMaster, LockstepSlave};
use crate::pll::PllSlaveClock;
use crate::sample::{TimeSample, TimeState};
use crate::wire::{SwitchTimeMode, WireTimeMode};
use std::sync::Arc;

/// Broad time mode, as carried on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeMode {
    Continuous,
    Deterministic,
}

pub enum TimeController {
    Continuous(ContinuousClock),
    PllSlave(PllSlaveClock),
    SteppedMaster(LockstepMaster),
    SteppedSlave(LockstepSlave),
}

impl TimeController {
    pub fn update(&mut self) -> TimeSample {
        match self {
            Self::Continuous(c) => c.update(),
            Self::PllSlave(c) => c.update(),
            Self::SteppedMaster(c) => c.update(),
            Self::SteppedSlave(c) => c.update(),
        }
    }

    /// Manual lockstep step. Any other mode is a `WrongMode` error.
    pub fn step(&mut self, fixed_delta: f32) -> Result<TimeSample, TimeError> {
        match self {
            Self::SteppedMaster(c) => Ok(c.step(fixed_delta)),
            _ => Err(TimeError::WrongMode { operation: "step" }),
        }
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        match self {
            Self::Continuous(c) => c.set_time_scale(scale),
            Self::PllSlave(c) => c.set_time_scale(scale),
            Self::SteppedMaster(c) => c.set_time_scale(scale),
            Self::SteppedSlave(c) => c.set_time_scale(scale),
        }
    }

    pub fn state(&self) -> TimeState {
        match self {
            Self::Continuous(c) => c.state(),
            Self::PllSlave(c) => c.state(),
            Self::SteppedMaster(c) => c.state(),
            Self::SteppedSlave(c) => c.state(),
        }
    }

    pub fn seed_state(&mut self, state: TimeState) {
        match self {
            Self::Continuous(c) => c.seed_state(state),
            Self::PllSlave(c) => c.seed_state(state),
            Self::SteppedMaster(c) => c.seed_state(state),
            Self::SteppedSlave(c) => c.seed_state(state),
        }
    }

    pub fn mode(&self) -> TimeMode {
        match self {
            Self::Continuous(_) | Self::PllSlave(_) => TimeMode::Continuous,
            Self::SteppedMaster(_) | Self::SteppedSlave(_) => TimeMode::Deterministic,
        }
    }
}

/// This node's role in the time fabric.
enum Role {
    /// Authoritative node; owns the slave roster for stepped mode.
    Master { slaves: Vec<NodeId> },
    /// Follower; obeys switch announcements from the master.
    Slave,
}

/// Owns the active controller, swaps it at mode switches, and carries the
/// pause barrier protocol.
pub struct TimeCoordinator {
    controller: TimeController,
    bus: Arc<SyncBus>,
    node: NodeId,
    config: TimeConfig,
    role: Role,
    clock_factory: Box<dyn Fn() -> Box<dyn WallClock> + Send>,
    pending_barrier: Option<i64>,
}

impl TimeCoordinator {
    /// Master node starting in continuous mode.
    pub fn master(
        bus: Arc<SyncBus>,
        node: NodeId,
        slaves: Vec<NodeId>,
        config: TimeConfig,
        clock_factory: Box<dyn Fn() -> Box<dyn WallClock> + Send>,
    ) -> Self {
        bus.join(node);
        let controller =
            TimeController::Continuous(ContinuousClock::master(clock_factory(), Arc::clone(&bus), node));
        Self {
            controller,
            bus,
            node,
            config,
            role: Role::Master { slaves },
            clock_factory,
            pending_barrier: None,
        }
    }

    /// Slave node starting in continuous (PLL) mode.
    pub fn slave(
        bus: Arc<SyncBus>,
        node: NodeId,
        config: TimeConfig,
        clock_factory: Box<dyn Fn() -> Box<dyn WallClock> + Send>,
    ) -> Self {
        bus.join(node);
        let controller = TimeController::PllSlave(PllSlaveClock::new(
            clock_factory(),
            Arc::clone(&bus),
            node,
            &config,
        ));
        Self {
            controller,
            bus,
            node,
            config,
            role: Role::Slave,
            clock_factory,
            pending_barrier: None,
        }
    }

    /// Drive the active controller one update, handling any mode switches
    /// that are due.
    pub fn update(&mut self) -> TimeSample {
        for msg in self.bus.drain_switches(self.node) {
            if let Err(error) = self.apply_switch(msg) {
                tracing::warn!(%error, "dropping time mode switch");
            }
        }

        if let Some(barrier) = self.pending_barrier {
            if self.controller.state().frame_number >= barrier {
                self.swap_to_stepped();
                self.pending_barrier = None;
            }
        }

        let sample = self.controller.update();

        // The barrier can also be crossed by the update itself.
        if let Some(barrier) = self.pending_barrier {
            if sample.frame_number >= barrier {
                self.swap_to_stepped();
                self.pending_barrier = None;
            }
        }
        sample
    }

    /// Master: announce a coordinated switch to deterministic time. Returns
    /// the barrier frame all nodes will swap at.
    pub fn request_stepped(&mut self) -> Result<i64, TimeError> {
        if !matches!(self.role, Role::Master { .. }) {
            return Err(TimeError::WrongMode {
                operation: "request_stepped",
            });
        }
        let current = self.controller.state().frame_number;
        let barrier = current + self.config.pause_barrier_frames as i64;
        self.bus.broadcast_switch(
            self.node,
            SwitchTimeMode {
                target_mode: WireTimeMode::Deterministic,
                barrier_frame: barrier,
                reference_frame: current,
            },
        );
        self.pending_barrier = Some(barrier);
        Ok(barrier)
    }

    /// Master: announce the immediate switch back to continuous time.
    pub fn request_continuous(&mut self) -> Result<(), TimeError> {
        if !matches!(self.role, Role::Master { .. }) {
            return Err(TimeError::WrongMode {
                operation: "request_continuous",
            });
        }
        let current = self.controller.state().frame_number;
        self.bus.broadcast_switch(
            self.node,
            SwitchTimeMode {
                target_mode: WireTimeMode::Continuous,
                barrier_frame: current,
                reference_frame: current,
            },
        );
        self.swap_to_continuous();
        Ok(())
    }

    fn apply_switch(&mut self, msg: SwitchTimeMode) -> Result<(), TimeError> {
        match msg.target_mode {
            WireTimeMode::Deterministic => {
                let local = self.controller.state().frame_number;
                if self.controller.mode() == TimeMode::Deterministic {
                    // Already stepped; a barrier behind us is a protocol
                    // fault worth surfacing.
                    if msg.barrier_frame < local {
                        return Err(TimeError::BarrierExpired {
                            barrier_frame: msg.barrier_frame,
                            local_frame: local,
                        });
                    }
                    return Ok(());
                }
                if local >= msg.barrier_frame {
                    // Late receipt: swap immediately from local state, no
                    // rewind.
                    self.swap_to_stepped();
                } else {
                    self.pending_barrier = Some(msg.barrier_frame);
                }
                Ok(())
            }
            WireTimeMode::Continuous => {
                self.pending_barrier = None;
                if self.controller.mode() != TimeMode::Continuous {
                    self.swap_to_continuous();
                }
                Ok(())
            }
        }
    }

    fn swap_to_stepped(&mut self) {
        let state = self.controller.state();
        let mut next = match &self.role {
            Role::Master { slaves } => TimeController::SteppedMaster(LockstepMaster::new(
                Arc::clone(&self.bus),
                self.node,
                slaves.iter().copied(),
                self.config.fixed_delta_seconds,
            )),
            Role::Slave => TimeController::SteppedSlave(LockstepSlave::new(
                Arc::clone(&self.bus),
                self.node,
                crate::bus::MASTER_NODE,
            )),
        };
        next.seed_state(state);
        tracing::info!(frame = state.frame_number, "switching to deterministic time");
        self.controller = next;
    }

    fn swap_to_continuous(&mut self) {
        let state = self.controller.state();
        let mut next = match &self.role {
            Role::Master { .. } => TimeController::Continuous(ContinuousClock::master(
                (self.clock_factory)(),
                Arc::clone(&self.bus),
                self.node,
            )),
            Role::Slave => TimeController::PllSlave(PllSlaveClock::new(
                (self.clock_factory)(),
                Arc::clone(&self.bus),
                self.node,
                &self.config,
            )),
        };
        // seed_state reseeds the wall marker, so paused wall-clock slack is
        // not consumed as one giant dt.
        next.seed_state(state);
        tracing::info!(frame = state.frame_number, "switching to continuous time");
        self.controller = next;
    }

    /// Replace the controller with an externally built one, preserving
    /// (total_time, frame_number) exactly.
    pub fn swap_controller(&mut self, mut next: TimeController) -> TimeState {
        let state = self.controller.state();
        next.seed_state(state);
        self.controller = next;
        state
    }

    pub fn controller(&self) -> &TimeController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut TimeController {
        &mut self.controller
    }

    pub fn mode(&self) -> TimeMode {
        self.controller.mode()
    }

    pub fn state(&self) -> TimeState {
        self.controller.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const FRAME: f64 = 1.0 / 60.0;

    fn coordinators(clock: &ManualClock) -> (Arc<SyncBus>, TimeCoordinator, TimeCoordinator) {
        let bus = Arc::new(SyncBus::new());
        let master_clock = clock.clone();
        let master = TimeCoordinator::master(
            Arc::clone(&bus),
            0,
            vec![1],
            TimeConfig::default(),
            Box::new(move || Box::new(master_clock.clone()) as Box<dyn WallClock>),
        );
        let slave_clock = clock.clone();
        let slave = TimeCoordinator::slave(
            Arc::clone(&bus),
            1,
            TimeConfig::default(),
            Box::new(move || Box::new(slave_clock.clone()) as Box<dyn WallClock>),
        );
        (bus, master, slave)
    }

    #[test]
    fn swap_preserves_state_exactly() {
        let clock = ManualClock::new();
        let (_bus, mut master, _slave) = coordinators(&clock);

        for _ in 0..7 {
            clock.advance_secs(FRAME);
            master.update();
        }
        let before = master.state();

        let bus = Arc::new(SyncBus::new());
        let next =
            TimeController::SteppedMaster(LockstepMaster::new(bus, 0, Vec::new(), 1.0 / 60.0));
        master.swap_controller(next);

        let after = master.state();
        assert_eq!(before.total_time.to_bits(), after.total_time.to_bits());
        assert_eq!(before.frame_number, after.frame_number);
    }

    #[test]
    fn barrier_swaps_both_sides_at_the_same_frame() {
        let clock = ManualClock::new();
        let (_bus, mut master, mut slave) = coordinators(&clock);

        // Run both sides a few continuous frames.
        for _ in 0..3 {
            clock.advance_secs(FRAME);
            master.update();
            slave.update();
        }

        let barrier = master.request_stepped().unwrap();
        assert_eq!(barrier, 3 + 5);

        // Advance to the barrier; both must still be continuous before it.
        for _ in 0..5 {
            assert_eq!(master.mode(), TimeMode::Continuous);
            assert_eq!(slave.mode(), TimeMode::Continuous);
            clock.advance_secs(FRAME);
            master.update();
            slave.update();
        }

        // Frame 8 reached: both sides swapped at the same barrier frame.
        assert_eq!(master.mode(), TimeMode::Deterministic);
        assert_eq!(slave.mode(), TimeMode::Deterministic);
        assert_eq!(master.state().frame_number, 8);
        assert_eq!(slave.state().frame_number, 8);

        // Lockstep picks up where the barrier left off.
        master.update(); // publishes the frame-8 order
        slave.update(); // executes it and acks
        master.update(); // collects the ack and advances
        assert_eq!(master.state().frame_number, slave.state().frame_number);
    }

    #[test]
    fn late_switch_receipt_swaps_immediately() {
        let clock = ManualClock::new();
        let (bus, _master, mut slave) = coordinators(&clock);

        // Slave is already past the barrier when the message arrives.
        for _ in 0..10 {
            clock.advance_secs(FRAME);
            slave.update();
        }
        bus.broadcast_switch(
            0,
            SwitchTimeMode {
                target_mode: WireTimeMode::Deterministic,
                barrier_frame: 4,
                reference_frame: 2,
            },
        );
        let frame_before = slave.state().frame_number;
        slave.update();
        assert_eq!(slave.mode(), TimeMode::Deterministic);
        // No rewind: local state carried forward.
        assert!(slave.state().frame_number >= frame_before);
    }

    #[test]
    fn unpause_does_not_consume_paused_slack() {
        let clock = ManualClock::new();
        let (_bus, mut master, mut slave) = coordinators(&clock);

        clock.advance_secs(FRAME);
        master.update();
        slave.update();

        master.request_stepped().unwrap();
        for _ in 0..6 {
            clock.advance_secs(FRAME);
            master.update();
            slave.update();
        }
        assert_eq!(master.mode(), TimeMode::Deterministic);

        // A long pause in stepped mode, then unpause.
        clock.advance_secs(30.0);
        master.request_continuous().unwrap();
        slave.update();
        assert_eq!(master.mode(), TimeMode::Continuous);
        assert_eq!(slave.mode(), TimeMode::Continuous);

        clock.advance_secs(FRAME);
        let sample = master.update();
        assert!(
            sample.dt < 0.1,
            "paused slack leaked into dt: {}",
            sample.dt
        );
    }

    #[test]
    fn step_on_continuous_is_wrong_mode() {
        let clock = ManualClock::new();
        let (_bus, mut master, _slave) = coordinators(&clock);
        assert!(matches!(
            master.controller_mut().step(1.0 / 60.0),
            Err(TimeError::WrongMode { .. })
        ));
    }

    #[test]
    fn expired_barrier_in_stepped_mode_is_reported() {
        let clock = ManualClock::new();
        let (_bus, mut master, _slave) = coordinators(&clock);
        master.request_stepped().unwrap();
        for _ in 0..6 {
            clock.advance_secs(FRAME);
            master.update();
        }
        assert_eq!(master.mode(), TimeMode::Deterministic);

        let err = master
            .apply_switch(SwitchTimeMode {
                target_mode: WireTimeMode::Deterministic,
                barrier_frame: 0,
                reference_frame: 0,
            })
            .unwrap_err();
        assert!(matches!(err, TimeError::BarrierExpired { .. }));
    }
}

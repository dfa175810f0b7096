//! Cadence Time
//!
//! Swappable time controllers for the simulation runtime:
//! - Continuous wall-clock time (standalone or master, with 1 Hz pulses)
//! - Continuous slave time with a software PLL
//! - Deterministic stepped time (lockstep master/slave)
//! - Runtime mode switching with a coordinated pause barrier

mod bus;
mod clock;
mod config;
mod continuous;
mod controller;
mod error;
mod lockstep;
mod pll;
mod sample;
mod wire;

pub use bus::{NodeId, SyncBus, MASTER_NODE};
pub use clock::{ManualClock, MonotonicClock, WallClock, TICKS_PER_SECOND};
pub use config::TimeConfig;
pub use continuous::ContinuousClock;
pub use controller::{TimeController, TimeCoordinator, TimeMode};
pub use error::TimeError;
pub use lockstep::{LockstepMaster, LockstepSlave};
pub use pll::PllSlaveClock;
pub use sample::{TimeSample, TimeState};
pub use wire::{FrameAck, FrameOrder, SwitchTimeMode, TimePulse, WireTimeMode};

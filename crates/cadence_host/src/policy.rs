// policy.rs - Module execution policies
//
// A policy is configuration: how a module's tick is threaded, where its view
// of the world comes from, how often it wants to run, and how the host
// reacts when it misbehaves.

use crate::error::HostError;
use cadence_core::{ComponentTypeId, EventTypeId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Nominal frame rate the periodic throttle is expressed against.
pub const NOMINAL_HZ: f32 = 60.0;

/// Default timeout applied when a policy leaves `max_expected_runtime_ms` at 0.
pub const DEFAULT_RUNTIME_LIMIT_MS: u32 = 1000;

/// Thread model for a module's tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RunMode {
    /// Inline on the orchestrator, inside the frame.
    Synchronous,
    /// On a worker, but the frame waits for completion at a barrier.
    FrameSynced,
    /// On a worker, harvested whenever it finishes.
    Asynchronous,
}

/// Where a module's view of the world comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataStrategy {
    /// The live world itself. Only legal synchronously.
    Direct,
    /// Persistent replica refreshed by dirty-chunk sync each frame.
    Gdb,
    /// On-demand snapshot from a pool, synced at acquisition.
    Sod,
}

/// Wake condition override. `Always` keeps the default chain
/// (watch events, then watch components, then the periodic throttle).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    Always,
    /// Run when at least this much time has accumulated.
    IntervalMs(u32),
    /// Run only when this event type is present in the current buffer.
    OnEvent(EventTypeId),
    /// Run only when this component type changed since the last run.
    OnComponentChange(ComponentTypeId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionPolicy {
    pub run_mode: RunMode,
    pub data_strategy: DataStrategy,
    /// <= 0 or >= 60 means every frame.
    pub target_frequency_hz: f32,
    pub trigger: Trigger,
    /// 0 selects the 1000 ms default.
    pub max_expected_runtime_ms: u32,
    /// Consecutive failures before the circuit breaker opens.
    pub failure_threshold: u32,
    pub circuit_reset_timeout_ms: u32,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Synchronous,
            data_strategy: DataStrategy::Direct,
            target_frequency_hz: NOMINAL_HZ,
            trigger: Trigger::Always,
            max_expected_runtime_ms: 0,
            failure_threshold: 3,
            circuit_reset_timeout_ms: 5000,
        }
    }
}

impl ExecutionPolicy {
    pub fn validate(&self, module: &str) -> Result<(), HostError> {
        if self.data_strategy == DataStrategy::Direct && self.run_mode != RunMode::Synchronous {
            return Err(HostError::PolicyInvalid {
                module: module.to_string(),
                reason: "Direct data strategy requires the Synchronous run mode",
            });
        }
        Ok(())
    }

    /// Frames between runs under the periodic throttle.
    pub fn skip_frames(&self) -> u32 {
        if self.target_frequency_hz <= 0.0 || self.target_frequency_hz >= NOMINAL_HZ {
            1
        } else {
            (NOMINAL_HZ / self.target_frequency_hz).ceil() as u32
        }
    }

    pub fn runtime_limit(&self) -> Duration {
        let ms = if self.max_expected_runtime_ms == 0 {
            DEFAULT_RUNTIME_LIMIT_MS
        } else {
            self.max_expected_runtime_ms
        };
        Duration::from_millis(ms as u64)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_reset_timeout_ms as u64)
    }

    /// Grouping key for provider auto-assignment.
    pub fn group_key(&self) -> (RunMode, DataStrategy, u32) {
        (
            self.run_mode,
            self.data_strategy,
            self.target_frequency_hz.to_bits(),
        )
    }
}
